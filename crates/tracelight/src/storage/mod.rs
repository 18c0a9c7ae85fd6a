//! Persistent document storage.
//!
//! Documents are keyed by filename with last-write-wins semantics: uploading
//! a file again replaces the stored copy. Each document is split into chunks
//! on ingestion, and searches score those chunks by keyword overlap with the
//! query. Ingestion and search record checkpoints that feed the document and
//! search rollups.

pub mod chunking;
pub mod migrations;
pub mod schema;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::trace::{ids, TraceRegistry, Trail};

pub use chunking::chunk_text;

/// Scores at or below this are not search hits.
pub const MIN_RELEVANCE: f64 = 0.1;

const MEMORY_PATH: &str = ":memory:";

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Unique key.
    pub filename: String,
    /// Full text.
    pub content: String,
    /// Search chunks derived from `content`.
    pub chunks: Vec<String>,
    /// BLAKE3 hash of `content`, hex encoded.
    pub content_hash: String,
    /// When this version was stored.
    pub timestamp: DateTime<Utc>,
}

impl Document {
    /// Build a document, chunking `content` at `max_chunk_size`.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<String>,
        max_chunk_size: usize,
    ) -> Self {
        let content = content.into();
        Self {
            filename: filename.into(),
            chunks: chunk_text(&content, max_chunk_size),
            content_hash: content_hash(&content),
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Hash document content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// What an ingestion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestOutcome {
    /// The filename was new.
    Created,
    /// An older version was replaced.
    Replaced,
    /// The stored version already had this content.
    Unchanged,
}

impl std::fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Replaced => write!(f, "replaced"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// One chunk matching a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Document the chunk came from.
    pub filename: String,
    /// The matching chunk.
    pub chunk: String,
    /// Fraction of query words found in the chunk.
    pub score: f64,
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    /// Stored documents.
    pub total_documents: i64,
    /// Chunks across all documents.
    pub total_chunks: usize,
    /// Bytes of content across all documents.
    pub collection_bytes: i64,
    /// Newest document timestamp.
    pub last_updated: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// `SQLite`-backed document store.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    conn: Connection,
    max_chunk_size: usize,
    trail: Trail,
}

impl DocumentStore {
    /// Open or create a store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>, registry: &TraceRegistry) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening document store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Document store opened at {}", path.display());
        Ok(Self::from_connection(path, conn, registry))
    }

    /// Open the store a configuration points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_configured(
        database_path: impl AsRef<Path>,
        storage: &StorageConfig,
        registry: &TraceRegistry,
    ) -> Result<Self> {
        Ok(Self::open(database_path, registry)?.with_max_chunk_size(storage.max_chunk_size))
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(registry: &TraceRegistry) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(MEMORY_PATH),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::from_connection(PathBuf::from(MEMORY_PATH), conn, registry))
    }

    fn from_connection(path: PathBuf, conn: Connection, registry: &TraceRegistry) -> Self {
        Self {
            path,
            conn,
            max_chunk_size: StorageConfig::default().max_chunk_size,
            trail: registry.trail("DocumentStore"),
        }
    }

    /// Set the chunk size used by [`Self::ingest`].
    #[must_use]
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size.max(1);
        self
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk and store `content` under `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ingest(&self, filename: &str, content: &str) -> Result<IngestOutcome> {
        self.traced_ingest(filename, content).map_err(|err| {
            self.trail.fail(ids::DOCUMENT_INGEST_FAILED, &err);
            err
        })
    }

    fn traced_ingest(&self, filename: &str, content: &str) -> Result<IngestOutcome> {
        let hash = content_hash(content);
        if self.stored_hash(filename)?.as_deref() == Some(hash.as_str()) {
            debug!(filename, "document unchanged");
            return Ok(IngestOutcome::Unchanged);
        }

        let document = Document::new(filename, content, self.max_chunk_size);
        let outcome = if self.put(&document)? {
            IngestOutcome::Replaced
        } else {
            IngestOutcome::Created
        };

        self.trail.light(
            ids::DOCUMENT_INGESTED,
            Some(json!({
                "filename": filename,
                "chunks": document.chunks.len(),
                "bytes": content.len(),
            })),
        );
        info!(filename, chunks = document.chunks.len(), %outcome, "document ingested");
        Ok(outcome)
    }

    fn stored_hash(&self, filename: &str) -> Result<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT content_hash FROM documents WHERE filename = ?1",
                [filename],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// Store `document` as is, replacing any document with its filename.
    ///
    /// Returns `true` if a document was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put(&self, document: &Document) -> Result<bool> {
        let replaced = self.stored_hash(&document.filename)?.is_some();
        let chunks = serde_json::to_string(&document.chunks)?;
        self.conn.execute(
            r"
            INSERT INTO documents (filename, content, chunks, content_hash, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(filename) DO UPDATE SET
                content = excluded.content,
                chunks = excluded.chunks,
                content_hash = excluded.content_hash,
                timestamp = excluded.timestamp
            ",
            params![
                document.filename,
                document.content,
                chunks,
                document.content_hash,
                document.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(replaced)
    }

    /// Get a document by filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, filename: &str) -> Result<Option<Document>> {
        let document = self
            .conn
            .query_row(
                r"
                SELECT filename, content, chunks, content_hash, timestamp
                FROM documents WHERE filename = ?1
                ",
                [filename],
                Self::row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    /// All documents, ordered by filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT filename, content, chunks, content_hash, timestamp
            FROM documents ORDER BY filename
            ",
        )?;
        let documents = stmt
            .query_map([], Self::row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    /// Remove a document.
    ///
    /// Returns `true` if a document was removed, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, filename: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM documents WHERE filename = ?1", [filename])?;
        if affected > 0 {
            self.trail
                .light(ids::DOCUMENT_REMOVED, Some(json!({ "filename": filename })));
        }
        Ok(affected > 0)
    }

    /// Remove every document. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM documents", [])?;
        if affected > 0 {
            info!("Removed {} documents", affected);
        }
        Ok(affected)
    }

    /// Count stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Chunks relevant to `query`, best first, at most `limit`.
    ///
    /// A chunk's score is the fraction of the query's words it contains,
    /// case-insensitively. Chunks scoring [`MIN_RELEVANCE`] or less are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        match self.scored_chunks(query) {
            Ok(mut hits) => {
                hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
                hits.truncate(limit);
                self.trail.light(
                    ids::SEARCH_COMPLETED,
                    Some(json!({
                        "results": hits.len(),
                        "top_score": hits.first().map_or(0.0, |hit| hit.score),
                    })),
                );
                debug!(query, results = hits.len(), "search completed");
                Ok(hits)
            }
            Err(err) => {
                self.trail.fail(ids::SEARCH_FAILED, &err);
                Err(err)
            }
        }
    }

    fn scored_chunks(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT filename, chunks FROM documents ORDER BY filename")?;
        let rows = stmt
            .query_map([], |row| {
                let filename: String = row.get(0)?;
                let chunks: String = row.get(1)?;
                Ok((filename, chunks))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut hits = Vec::new();
        for (filename, chunks) in rows {
            let chunks: Vec<String> = serde_json::from_str(&chunks)?;
            for chunk in chunks {
                let score = relevance(&words, &chunk.to_lowercase());
                if score > MIN_RELEVANCE {
                    hits.push(SearchHit {
                        filename: filename.clone(),
                        chunk,
                        score,
                    });
                }
            }
        }
        Ok(hits)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<DocumentStats> {
        let (total_documents, collection_bytes, newest): (i64, i64, Option<String>) =
            self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(content AS BLOB))), 0), MAX(timestamp)
                 FROM documents",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let total_chunks = self
            .list()?
            .iter()
            .map(|document| document.chunks.len())
            .sum();

        let last_updated = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.as_os_str() == MEMORY_PATH {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(DocumentStats {
            total_documents,
            total_chunks,
            collection_bytes,
            last_updated,
            db_size_bytes,
        })
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        let chunks: String = row.get(2)?;
        let chunks = serde_json::from_str(&chunks).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
        })?;
        let timestamp: String = row.get(4)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Ok(Document {
            filename: row.get(0)?,
            content: row.get(1)?,
            chunks,
            content_hash: row.get(3)?,
            timestamp,
        })
    }
}

/// Fraction of `words` found in `text`.
#[allow(clippy::cast_precision_loss)]
fn relevance(words: &[&str], text: &str) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let matched = words.iter().filter(|word| text.contains(*word)).count();
    matched as f64 / words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> (DocumentStore, TraceRegistry) {
        let registry = TraceRegistry::new();
        let store = DocumentStore::open_in_memory(&registry).expect("failed to create test store");
        (store, registry)
    }

    fn long_text(topic: &str) -> String {
        (0..30)
            .map(|i| format!("Paragraph {i} talks about {topic} in some detail for the reader. "))
            .collect()
    }

    #[test]
    fn test_open_in_memory() {
        let (store, _registry) = create_test_store();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.path(), Path::new(MEMORY_PATH));
    }

    #[test]
    fn test_ingest_and_get() {
        let (store, registry) = create_test_store();
        let outcome = store.ingest("notes.txt", "Pricing objections are common.").unwrap();
        assert_eq!(outcome, IngestOutcome::Created);

        let document = store.get("notes.txt").unwrap().unwrap();
        assert_eq!(document.content, "Pricing objections are common.");
        assert_eq!(document.chunks, vec!["Pricing objections are common."]);
        assert_eq!(document.content_hash, content_hash("Pricing objections are common."));

        let stats = registry.document_processing_stats();
        assert_eq!(stats.documents_processed, 1);
        assert_eq!(stats.total_chunks, 1);
    }

    #[test]
    fn test_ingest_last_write_wins() {
        let (store, _registry) = create_test_store();
        store.ingest("a.txt", "first version").unwrap();
        let outcome = store.ingest("a.txt", "second version").unwrap();

        assert_eq!(outcome, IngestOutcome::Replaced);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("a.txt").unwrap().unwrap().content, "second version");
    }

    #[test]
    fn test_ingest_unchanged() {
        let (store, registry) = create_test_store();
        store.ingest("a.txt", "same").unwrap();
        assert_eq!(store.ingest("a.txt", "same").unwrap(), IngestOutcome::Unchanged);
        assert_eq!(registry.document_processing_stats().documents_processed, 1);
    }

    #[test]
    fn test_long_document_is_chunked() {
        let (store, _registry) = create_test_store();
        let store = store.with_max_chunk_size(300);
        store.ingest("long.txt", &long_text("discovery calls")).unwrap();

        let document = store.get("long.txt").unwrap().unwrap();
        assert!(document.chunks.len() > 1);
        assert!(document.chunks.iter().all(|c| c.len() <= 300));
    }

    #[test]
    fn test_get_nonexistent() {
        let (store, _registry) = create_test_store();
        assert!(store.get("missing.txt").unwrap().is_none());
    }

    #[test]
    fn test_list_ordered_by_filename() {
        let (store, _registry) = create_test_store();
        store.ingest("b.txt", "bee").unwrap();
        store.ingest("a.txt", "ay").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|d| d.filename).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_remove() {
        let (store, registry) = create_test_store();
        store.ingest("a.txt", "content").unwrap();

        assert!(store.remove("a.txt").unwrap());
        assert!(!store.remove("a.txt").unwrap());
        assert_eq!(store.count().unwrap(), 0);

        let trail = registry.component("DocumentStore").unwrap();
        assert_eq!(trail.last().unwrap().checkpoint_id, ids::DOCUMENT_REMOVED);
    }

    #[test]
    fn test_clear() {
        let (store, _registry) = create_test_store();
        store.ingest("a.txt", "one").unwrap();
        store.ingest("b.txt", "two").unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_search_scores_and_orders() {
        let (store, registry) = create_test_store();
        store.ingest("pricing.txt", "Handle pricing objections with value.").unwrap();
        store.ingest("intro.txt", "Open with value, not features.").unwrap();
        store.ingest("other.txt", "Unrelated material entirely.").unwrap();

        let hits = store.search("pricing value", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].filename, "pricing.txt");
        assert!((hits[0].score - 1.0).abs() < f64::EPSILON);
        assert!((hits[1].score - 0.5).abs() < f64::EPSILON);

        let stats = registry.search_stats();
        assert_eq!(stats.searches, 1);
        assert!((stats.average_results - 2.0).abs() < f64::EPSILON);
        assert!((stats.average_top_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_search_respects_limit() {
        let (store, _registry) = create_test_store();
        for i in 0..5 {
            store.ingest(&format!("{i}.txt"), "closing techniques").unwrap();
        }
        assert_eq!(store.search("closing", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_search_empty_query() {
        let (store, _registry) = create_test_store();
        store.ingest("a.txt", "anything").unwrap();
        assert!(store.search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let (store, _registry) = create_test_store();
        store.ingest("a.txt", "BUDGET questions").unwrap();
        assert_eq!(store.search("budget", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_stats() {
        let (store, _registry) = create_test_store();
        let empty = store.stats().unwrap();
        assert_eq!(empty.total_documents, 0);
        assert!(empty.last_updated.is_none());

        store.ingest("a.txt", "héllo").unwrap();
        store.ingest("b.txt", "world").unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.collection_bytes, 11);
        assert!(stats.last_updated.is_some());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_file_based() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("documents.db");
        let registry = TraceRegistry::new();

        {
            let store = DocumentStore::open(&db_path, &registry).unwrap();
            store.ingest("a.txt", "persisted").unwrap();
            assert_eq!(store.path(), db_path);
        }

        let reopened = DocumentStore::open(&db_path, &registry).unwrap();
        assert_eq!(reopened.get("a.txt").unwrap().unwrap().content, "persisted");
        assert!(reopened.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_relevance() {
        assert_eq!(relevance(&[], "text"), 0.0);
        assert!((relevance(&["a", "zz"], "abc") - 0.5).abs() < f64::EPSILON);
    }
}
