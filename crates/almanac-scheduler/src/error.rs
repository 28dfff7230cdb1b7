//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] almanac_store::StoreError),

    /// A pending job with this id already exists.
    #[error("job already exists: {0}")]
    DuplicateJob(String),

    /// No pending job with this id.
    #[error("job not found: {0}")]
    JobNotFound(String),
}
