//! SQLite persistence for Almanac.
//!
//! One [`Database`] handle owns the `users`, `events`, and `jobs` tables.
//! The event-creation path runs the owner-scoped overlap check and the
//! insert inside a single transaction, so two concurrent creates can never
//! both pass the check and commit conflicting rows.

mod db;
mod error;
mod types;

pub use db::Database;
pub use error::StoreError;
pub use types::{EventPatch, EventRow, JobRow, NewEvent, UserRow};
