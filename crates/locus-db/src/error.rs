//! Error types for the data layer.
//!
//! All gateway and pipeline failures are reported via [`DbError`], which
//! wraps the underlying [`sqlx`] and I/O errors with context about which
//! operation failed. Errors raised inside background flush tasks never
//! reach the caller that submitted the write; they are logged and
//! published as pipeline events instead.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// The database file or its directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be turned into a record.
    #[error("invalid row {id}: {reason}")]
    InvalidRow {
        /// Row id of the offending row.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// A stored row names a category this build does not know.
    #[error("row {id} has an unknown category: {source}")]
    UnknownCategory {
        /// Row id of the offending row.
        id: i64,
        /// The rejected category string.
        source: locus_types::CategoryParseError,
    },

    /// The backend is not reachable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No tokio runtime was running to host background tasks.
    #[error("no tokio runtime: {0}")]
    NoRuntime(String),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
