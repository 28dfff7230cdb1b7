//! Row and input types for the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event row from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    /// Email addresses, stored as a JSON list. Duplicates are preserved at
    /// rest; deduplication happens when the recipient set is built.
    pub participants: Vec<String>,
    /// Free-text timezone label. Not validated, not used for arithmetic.
    pub timezone: String,
    /// Whether the reminder notification has fired.
    pub started: bool,
}

/// Fields for creating a new event. Validation (non-empty title,
/// `start_time <= end_time`) happens in the service layer.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub participants: Vec<String>,
    pub timezone: String,
}

/// Partial update for an event. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub participants: Option<Vec<String>>,
    pub timezone: Option<String>,
}

/// A user row from the database.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
}

/// A pending scheduler job row.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub job_id: String,
    pub event_id: i64,
    pub fire_at: DateTime<Utc>,
}
