//! `SQLite` schema definitions for the document store.

/// SQL statement to create the documents table.
///
/// `chunks` holds a JSON array of strings. `timestamp` is RFC 3339.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    filename TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    chunks TEXT NOT NULL DEFAULT '[]',
    content_hash TEXT NOT NULL,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create an index on timestamp for recency queries.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_timestamp ON documents(timestamp DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DOCUMENTS_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_table_keyed_by_filename() {
        assert!(CREATE_DOCUMENTS_TABLE.contains("filename TEXT PRIMARY KEY"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("chunks TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("content_hash TEXT NOT NULL"));
    }

    #[test]
    fn test_statement_order() {
        assert_eq!(SCHEMA_STATEMENTS.first(), Some(&CREATE_DOCUMENTS_TABLE));
        assert!(SCHEMA_STATEMENTS.contains(&CREATE_METADATA_TABLE));
    }
}
