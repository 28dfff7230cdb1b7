//! Error types for notifications.

use thiserror::Error;

/// Errors that can occur while dispatching a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] almanac_store::StoreError),

    /// Mail transport failure.
    #[error("delivery failed: {0}")]
    Delivery(String),
}
