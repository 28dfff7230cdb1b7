//! Event orchestration.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use almanac_scheduler::{Scheduler, job_key};
use almanac_store::{Database, EventPatch, EventRow, NewEvent, StoreError};

/// Errors surfaced by event operations.
#[derive(Debug, Error)]
pub enum EventError {
    /// Missing or malformed required field.
    #[error("{0}")]
    Validation(String),

    /// `start_time` is after `end_time`.
    #[error("start_time must not be after end_time")]
    InvalidRange,

    /// Another event of the same owner occupies the requested range.
    #[error("another event is scheduled at the same time")]
    Overlap,

    /// Unknown event, or owned by someone else (indistinguishable on
    /// purpose).
    #[error("event not found")]
    NotFound,

    /// Store failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EventError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Overlap { .. } => EventError::Overlap,
            StoreError::InvalidRange => EventError::InvalidRange,
            StoreError::EmptyTitle => {
                EventError::Validation("title must not be empty".to_string())
            }
            other => EventError::Store(other),
        }
    }
}

/// Orchestrates the event store and the reminder scheduler.
///
/// Event CRUD never fails because of the notification subsystem: scheduler
/// errors are logged and absorbed (reminders are best-effort relative to
/// the event's existence).
pub struct EventService {
    db: Arc<Database>,
    scheduler: Scheduler,
    check_overlap_on_update: bool,
}

impl EventService {
    pub fn new(db: Arc<Database>, scheduler: Scheduler) -> Self {
        Self {
            db,
            scheduler,
            // The original system never re-checked overlap on update; off by
            // default so moving a conflicting event out of the way stays
            // possible.
            check_overlap_on_update: false,
        }
    }

    /// Re-run the overlap check (excluding the event itself) on updates.
    pub fn with_update_overlap_check(mut self, enabled: bool) -> Self {
        self.check_overlap_on_update = enabled;
        self
    }

    /// Validate and create an event, then bind its reminder job.
    pub async fn create(&self, owner_id: i64, event: NewEvent) -> Result<EventRow, EventError> {
        if event.title.trim().is_empty() {
            return Err(EventError::Validation("title must not be empty".to_string()));
        }
        if event.start_time > event.end_time {
            return Err(EventError::InvalidRange);
        }

        // Overlap check + insert are one transaction inside the store
        let created = self.db.create_event(owner_id, &event)?;

        let key = job_key(created.id);
        if let Err(e) = self
            .scheduler
            .schedule(&key, created.start_time, created.id)
            .await
        {
            // The event stays created: reminders are best-effort
            warn!(event_id = created.id, error = %e, "failed to schedule reminder");
        }

        Ok(created)
    }

    /// Apply a partial update; keep any pending reminder in step with the
    /// event's start time.
    ///
    /// The store validates the patched row, so a patch cannot leave the
    /// event with an inverted interval or a blank title.
    pub async fn update(
        &self,
        owner_id: i64,
        event_id: i64,
        patch: EventPatch,
    ) -> Result<EventRow, EventError> {
        let new_start = patch.start_time;
        let updated = self
            .db
            .update_event(event_id, owner_id, &patch, self.check_overlap_on_update)?
            .ok_or(EventError::NotFound)?;

        if let Some(start) = new_start {
            let key = job_key(event_id);
            if self.scheduler.exists(&key).await {
                if let Err(e) = self.scheduler.reschedule(&key, start).await {
                    warn!(event_id, error = %e, "failed to reschedule reminder");
                }
            }
        }

        Ok(updated)
    }

    /// Delete an event and cancel its pending reminder.
    pub async fn delete(&self, owner_id: i64, event_id: i64) -> Result<(), EventError> {
        if !self.db.delete_event(event_id, owner_id)? {
            return Err(EventError::NotFound);
        }

        // Cancel is a no-op if the job already fired or never existed
        if let Err(e) = self.scheduler.cancel(&job_key(event_id)).await {
            warn!(event_id, error = %e, "failed to cancel reminder");
        }

        Ok(())
    }

    /// Get one of the owner's events.
    pub fn get(&self, owner_id: i64, event_id: i64) -> Result<EventRow, EventError> {
        self.db
            .get_event_for_owner(event_id, owner_id)?
            .ok_or(EventError::NotFound)
    }

    /// List the owner's events, ordered by start time.
    pub fn list(&self, owner_id: i64) -> Result<Vec<EventRow>, EventError> {
        Ok(self.db.list_events(owner_id)?)
    }
}
