//! Error types for the store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Another event of the same owner overlaps the requested range.
    #[error("event {existing_id} overlaps the requested range")]
    Overlap { existing_id: i64 },

    /// The event would end before it starts.
    #[error("start_time must not be after end_time")]
    InvalidRange,

    /// The event title is empty or whitespace.
    #[error("title must not be empty")]
    EmptyTitle,

    /// A user with this email already exists.
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    /// A job row with this id already exists.
    #[error("job already exists: {0}")]
    DuplicateJob(String),

    /// No job row with this id.
    #[error("job not found: {0}")]
    JobNotFound(String),
}
