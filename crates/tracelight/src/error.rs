//! Error types for tracelight.
//!
//! This module defines the crate-wide error type together with the two
//! narrower error types that cross component seams: errors raised by a
//! native backend during dispatch and errors raised by a platform speech
//! recognition session.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tracelight operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Dispatch Errors ===
    /// The fallback catalog has no entry for the requested operation.
    #[error("unknown command: {name}")]
    UnknownOperation {
        /// The operation name that was requested.
        name: String,
    },

    // === Recognition Errors ===
    /// A recognition session could not be started or failed.
    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    /// Every automatic restart attempt for a recognition session failed.
    #[error("recognition restart gave up after {attempts} attempts: {message}")]
    RestartsExhausted {
        /// Number of restart attempts made.
        attempts: u32,
        /// The error reported by the last attempt.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Filesystem Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for tracelight operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unknown operation error.
    #[must_use]
    pub fn unknown_operation(name: impl Into<String>) -> Self {
        Self::UnknownOperation { name: name.into() }
    }

    /// Check if this error is an unknown operation.
    #[must_use]
    pub fn is_unknown_operation(&self) -> bool {
        matches!(self, Self::UnknownOperation { .. })
    }
}

/// An error raised by a native backend while serving a dispatched call.
///
/// The dispatcher never surfaces these to its caller; they are recorded
/// and the call is retried through the fallback catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("native call '{operation}' failed: {message}")]
pub struct NativeCallError {
    /// The operation that was being invoked.
    pub operation: String,
    /// Description of the failure.
    pub message: String,
}

impl NativeCallError {
    /// Create a new native call error.
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Classification of platform recognition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionErrorKind {
    /// The session was cancelled.
    Aborted,
    /// Permission to use the microphone was denied.
    NotAllowed,
    /// No speech was detected before the platform timed out.
    NoSpeech,
    /// Audio capture failed.
    AudioCapture,
    /// A network-backed recognizer lost connectivity.
    Network,
    /// The recognition service is unavailable.
    ServiceNotAllowed,
    /// The platform could not create a session at all.
    Unavailable,
    /// Any other platform-reported failure.
    Other,
}

impl RecognitionErrorKind {
    /// Fatal kinds terminate the session without any restart.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Aborted | Self::NotAllowed)
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Aborted => "aborted",
            Self::NotAllowed => "not-allowed",
            Self::NoSpeech => "no-speech",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// An error raised by a platform speech recognition session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("speech recognition error ({kind}): {message}")]
pub struct RecognitionError {
    /// The error classification.
    pub kind: RecognitionErrorKind,
    /// Description of the failure.
    pub message: String,
}

impl RecognitionError {
    /// Create a new recognition error.
    #[must_use]
    pub fn new(kind: RecognitionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
