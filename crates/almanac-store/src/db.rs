//! SQLite database for Almanac.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::error::StoreError;
use crate::types::{EventPatch, EventRow, JobRow, NewEvent, UserRow};

/// SQLite-backed store for users, events, and reminder jobs.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;

        // WAL for concurrent reads; foreign keys are per-connection and
        // off unless the build says otherwise, so pin them on.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        // Create tables
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                description TEXT,
                participants TEXT NOT NULL DEFAULT '[]',
                timezone TEXT NOT NULL DEFAULT '',
                started INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_events_owner_start ON events(user_id, start_time);

            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                event_id INTEGER NOT NULL,
                fire_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;

        info!(path = %path.as_ref().display(), "database initialized");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user. Fails with [`StoreError::DuplicateEmail`] if the email
    /// is already registered.
    pub fn create_user(&self, email: &str, password: &str) -> Result<UserRow, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO users (email, password) VALUES (?1, ?2)",
            params![email, password],
        );

        match result {
            Ok(_) => Ok(UserRow {
                id: conn.last_insert_rowid(),
                email: email.to_string(),
                password: password.to_string(),
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateEmail(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, email, password FROM users WHERE email = ?1",
                params![email],
                map_user,
            )
            .optional()?;
        Ok(row)
    }

    /// Look up a user by id.
    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, email, password FROM users WHERE id = ?1",
                params![id],
                map_user,
            )
            .optional()?;
        Ok(row)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Find any event of `owner_id` whose interval overlaps `[start, end]`.
    ///
    /// Closed-interval semantics: touching endpoints count as overlap.
    /// `exclude` skips one event id (used when re-checking an update in
    /// place).
    pub fn find_overlapping(
        &self,
        owner_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> Result<Option<EventRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::find_overlapping_in(&conn, owner_id, start, end, exclude)
    }

    fn find_overlapping_in(
        conn: &Connection,
        owner_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> Result<Option<EventRow>, StoreError> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE user_id = ?1 AND start_time <= ?2 AND end_time >= ?3
                       AND (?4 IS NULL OR id != ?4)
                     LIMIT 1"
                ),
                params![owner_id, end, start, exclude],
                map_event,
            )
            .optional()?;
        Ok(row)
    }

    fn check_event_invariants(
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if start > end {
            return Err(StoreError::InvalidRange);
        }
        Ok(())
    }

    /// Create an event. The overlap check and the insert run inside one
    /// transaction: a conflicting concurrent create cannot slip between
    /// check and commit.
    pub fn create_event(&self, owner_id: i64, event: &NewEvent) -> Result<EventRow, StoreError> {
        Self::check_event_invariants(&event.title, event.start_time, event.end_time)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        if let Some(existing) = Self::find_overlapping_in(
            &tx,
            owner_id,
            event.start_time,
            event.end_time,
            None,
        )? {
            // Dropping the transaction rolls back; nothing was written yet.
            return Err(StoreError::Overlap {
                existing_id: existing.id,
            });
        }

        tx.execute(
            "INSERT INTO events
             (user_id, title, start_time, end_time, description, participants, timezone, started)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                owner_id,
                event.title,
                event.start_time,
                event.end_time,
                event.description,
                serde_json::to_string(&event.participants).unwrap_or_default(),
                event.timezone,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(EventRow {
            id,
            user_id: owner_id,
            title: event.title.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            description: event.description.clone(),
            participants: event.participants.clone(),
            timezone: event.timezone.clone(),
            started: false,
        })
    }

    /// Get an event scoped to its owner. Cross-owner lookups return `None`.
    pub fn get_event_for_owner(
        &self,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<EventRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1 AND user_id = ?2"),
                params![id, owner_id],
                map_event,
            )
            .optional()?;
        Ok(row)
    }

    /// Get an event by id without owner scoping (dispatcher path).
    pub fn get_event(&self, id: i64) -> Result<Option<EventRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                map_event,
            )
            .optional()?;
        Ok(row)
    }

    /// List an owner's events ordered by start time ascending.
    pub fn list_events(&self, owner_id: i64) -> Result<Vec<EventRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = ?1 ORDER BY start_time ASC"
        ))?;

        let rows = stmt
            .query_map(params![owner_id], map_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Apply a partial update to an event. Returns the updated row, or
    /// `None` if the event is not owned by `owner_id`.
    ///
    /// When `check_overlap` is set, the patched interval is re-checked
    /// against the owner's other events (excluding this one) inside the same
    /// transaction. The original system never re-checked on update, so the
    /// service layer leaves this off by default.
    pub fn update_event(
        &self,
        id: i64,
        owner_id: i64,
        patch: &EventPatch,
        check_overlap: bool,
    ) -> Result<Option<EventRow>, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let Some(mut event) = tx
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1 AND user_id = ?2"),
                params![id, owner_id],
                map_event,
            )
            .optional()?
        else {
            return Ok(None);
        };

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(start) = patch.start_time {
            event.start_time = start;
        }
        if let Some(end) = patch.end_time {
            event.end_time = end;
        }
        if let Some(description) = &patch.description {
            event.description = Some(description.clone());
        }
        if let Some(participants) = &patch.participants {
            event.participants = participants.clone();
        }
        if let Some(timezone) = &patch.timezone {
            event.timezone = timezone.clone();
        }

        // The patched row must satisfy the same invariants as a new one
        Self::check_event_invariants(&event.title, event.start_time, event.end_time)?;

        if check_overlap {
            if let Some(existing) = Self::find_overlapping_in(
                &tx,
                owner_id,
                event.start_time,
                event.end_time,
                Some(id),
            )? {
                return Err(StoreError::Overlap {
                    existing_id: existing.id,
                });
            }
        }

        tx.execute(
            "UPDATE events
             SET title = ?1, start_time = ?2, end_time = ?3, description = ?4,
                 participants = ?5, timezone = ?6
             WHERE id = ?7",
            params![
                event.title,
                event.start_time,
                event.end_time,
                event.description,
                serde_json::to_string(&event.participants).unwrap_or_default(),
                event.timezone,
                id,
            ],
        )?;
        tx.commit()?;

        Ok(Some(event))
    }

    /// Delete an owner's event. Returns whether a row was removed.
    pub fn delete_event(&self, id: i64, owner_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM events WHERE id = ?1 AND user_id = ?2",
            params![id, owner_id],
        )?;
        Ok(changed > 0)
    }

    /// Claim the `started` flag. Returns `true` iff this call flipped it,
    /// i.e. the caller won the right to send the notification.
    pub fn mark_started(&self, event_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE events SET started = 1 WHERE id = ?1 AND started = 0",
            params![event_id],
        )?;
        Ok(changed > 0)
    }

    // =========================================================================
    // Scheduler jobs
    // =========================================================================

    /// Persist a pending job. Fails with [`StoreError::DuplicateJob`] if a
    /// row with this id already exists.
    pub fn insert_job(
        &self,
        job_id: &str,
        event_id: i64,
        fire_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO jobs (job_id, event_id, fire_at, status) VALUES (?1, ?2, ?3, 'pending')",
            params![job_id, event_id, fire_at],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateJob(job_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move a pending job's fire time. Fails with
    /// [`StoreError::JobNotFound`] if no pending row matches.
    pub fn update_job_fire_at(
        &self,
        job_id: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE jobs SET fire_at = ?1 WHERE job_id = ?2 AND status = 'pending'",
            params![fire_at, job_id],
        )?;
        if changed == 0 {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }
        Ok(())
    }

    /// Remove a job row. Not an error if absent.
    pub fn delete_job(&self, job_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM jobs WHERE job_id = ?1", params![job_id])?;
        Ok(())
    }

    /// Record a terminal status for a job (e.g. `failed`). The row stays
    /// for inspection but is out of the pending set.
    pub fn set_job_status(&self, job_id: &str, status: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = ?1 WHERE job_id = ?2",
            params![status, job_id],
        )?;
        Ok(())
    }

    /// Load all pending jobs (startup recovery).
    pub fn load_pending_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT job_id, event_id, fire_at FROM jobs WHERE status = 'pending' ORDER BY fire_at ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(JobRow {
                    job_id: row.get(0)?,
                    event_id: row.get(1)?,
                    fire_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

const EVENT_COLUMNS: &str =
    "id, user_id, title, start_time, end_time, description, participants, timezone, started";

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    let participants: String = row.get(6)?;
    Ok(EventRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        description: row.get(5)?,
        participants: serde_json::from_str(&participants).unwrap_or_default(),
        timezone: row.get(7)?,
        started: row.get(8)?,
    })
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("almanac.db")).unwrap();
        // Owner rows for the event tests; rowids come out as 1 and 2
        db.create_user("owner1@x.com", "secret").unwrap();
        db.create_user("owner2@x.com", "secret").unwrap();
        (db, dir)
    }

    fn ts(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, min, 0).unwrap()
    }

    fn new_event(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            start_time: start,
            end_time: end,
            description: None,
            participants: vec![],
            timezone: "UTC".to_string(),
        }
    }

    #[test]
    fn test_create_user_and_lookup() {
        let (db, _dir) = test_db();
        let user = db.create_user("alice@example.com", "secret").unwrap();
        assert_eq!(user.email, "alice@example.com");

        let found = db.find_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert!(db.find_user_by_email("nobody@example.com").unwrap().is_none());
        assert_eq!(db.get_user(user.id).unwrap().unwrap().email, user.email);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (db, _dir) = test_db();
        db.create_user("alice@example.com", "secret").unwrap();
        let err = db.create_user("alice@example.com", "other").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[test]
    fn test_create_event_rejects_overlap() {
        let (db, _dir) = test_db();
        let a = db
            .create_event(1, &new_event("standup", ts(10, 0), ts(11, 0)))
            .unwrap();

        let err = db
            .create_event(1, &new_event("review", ts(10, 30), ts(11, 30)))
            .unwrap_err();
        match err {
            StoreError::Overlap { existing_id } => assert_eq!(existing_id, a.id),
            other => panic!("expected overlap, got {other:?}"),
        }

        // Failed create must not have written anything
        assert_eq!(db.list_events(1).unwrap().len(), 1);
    }

    #[test]
    fn test_event_owner_must_exist() {
        let (db, _dir) = test_db();
        let err = db
            .create_event(99, &new_event("orphan", ts(10, 0), ts(11, 0)))
            .unwrap_err();
        // Foreign keys are enforced regardless of SQLite build defaults
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_touching_endpoints_count_as_overlap() {
        let (db, _dir) = test_db();
        db.create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        // Closed intervals: [10:00,11:00] and [11:00,12:00] share 11:00
        let err = db
            .create_event(1, &new_event("b", ts(11, 0), ts(12, 0)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Overlap { .. }));
    }

    #[test]
    fn test_adjacent_but_disjoint_intervals_allowed() {
        let (db, _dir) = test_db();
        db.create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();
        db.create_event(1, &new_event("b", ts(11, 1), ts(12, 0)))
            .unwrap();
        assert_eq!(db.list_events(1).unwrap().len(), 2);
    }

    #[test]
    fn test_overlap_is_owner_scoped() {
        let (db, _dir) = test_db();
        db.create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();
        // Same range, different owner: fine
        db.create_event(2, &new_event("b", ts(10, 0), ts(11, 0)))
            .unwrap();
    }

    #[test]
    fn test_find_overlapping_exclude() {
        let (db, _dir) = test_db();
        let a = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        let hit = db.find_overlapping(1, ts(10, 30), ts(11, 30), None).unwrap();
        assert_eq!(hit.unwrap().id, a.id);

        // Excluding the event itself finds nothing
        let hit = db
            .find_overlapping(1, ts(10, 30), ts(11, 30), Some(a.id))
            .unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn test_list_events_ordered_by_start() {
        let (db, _dir) = test_db();
        db.create_event(1, &new_event("late", ts(15, 0), ts(16, 0)))
            .unwrap();
        db.create_event(1, &new_event("early", ts(8, 0), ts(9, 0)))
            .unwrap();
        db.create_event(1, &new_event("mid", ts(11, 30), ts(12, 0)))
            .unwrap();

        let titles: Vec<_> = db
            .list_events(1)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let (db, _dir) = test_db();
        let mut event = new_event("planning", ts(10, 0), ts(11, 0));
        event.description = Some("quarterly planning".to_string());
        let created = db.create_event(1, &event).unwrap();

        let patch = EventPatch {
            title: Some("planning v2".to_string()),
            ..Default::default()
        };
        let updated = db
            .update_event(created.id, 1, &patch, false)
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "planning v2");
        assert_eq!(updated.description.as_deref(), Some("quarterly planning"));
        assert_eq!(updated.start_time, ts(10, 0));
    }

    #[test]
    fn test_update_unknown_or_foreign_event_returns_none() {
        let (db, _dir) = test_db();
        let created = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        let patch = EventPatch::default();
        assert!(db.update_event(999, 1, &patch, false).unwrap().is_none());
        // Wrong owner: existence must not leak
        assert!(db.update_event(created.id, 2, &patch, false).unwrap().is_none());
    }

    #[test]
    fn test_update_rejects_inverted_range() {
        let (db, _dir) = test_db();
        let created = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        // Moving the start past the unchanged end inverts the interval
        let patch = EventPatch {
            start_time: Some(ts(15, 0)),
            ..Default::default()
        };
        let err = db.update_event(created.id, 1, &patch, false).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange));

        let unchanged = db.get_event_for_owner(created.id, 1).unwrap().unwrap();
        assert_eq!(unchanged.start_time, ts(10, 0));
        assert_eq!(unchanged.end_time, ts(11, 0));
    }

    #[test]
    fn test_update_rejects_blank_title() {
        let (db, _dir) = test_db();
        let created = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        let patch = EventPatch {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        let err = db.update_event(created.id, 1, &patch, false).unwrap_err();
        assert!(matches!(err, StoreError::EmptyTitle));
        assert_eq!(
            db.get_event_for_owner(created.id, 1).unwrap().unwrap().title,
            "a"
        );
    }

    #[test]
    fn test_update_overlap_check_excludes_self() {
        let (db, _dir) = test_db();
        let a = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();
        db.create_event(1, &new_event("b", ts(13, 0), ts(14, 0)))
            .unwrap();

        // Shrinking within its own old range is fine even with the check on
        let patch = EventPatch {
            end_time: Some(ts(10, 30)),
            ..Default::default()
        };
        db.update_event(a.id, 1, &patch, true).unwrap().unwrap();

        // Moving onto b's range trips the check
        let patch = EventPatch {
            start_time: Some(ts(13, 30)),
            end_time: Some(ts(14, 30)),
            ..Default::default()
        };
        let err = db.update_event(a.id, 1, &patch, true).unwrap_err();
        assert!(matches!(err, StoreError::Overlap { .. }));

        // And the failed update must not have been applied
        let unchanged = db.get_event_for_owner(a.id, 1).unwrap().unwrap();
        assert_eq!(unchanged.start_time, ts(10, 0));
    }

    #[test]
    fn test_participants_round_trip() {
        let (db, _dir) = test_db();
        let mut event = new_event("sync", ts(10, 0), ts(11, 0));
        event.participants = vec!["a@x.com".to_string(), "b@x.com".to_string()];
        let created = db.create_event(1, &event).unwrap();

        let mut read_back = db
            .get_event_for_owner(created.id, 1)
            .unwrap()
            .unwrap()
            .participants;
        let mut expected = vec!["a@x.com".to_string(), "b@x.com".to_string()];
        read_back.sort();
        expected.sort();
        assert_eq!(read_back, expected);
    }

    #[test]
    fn test_delete_event_owner_scoped() {
        let (db, _dir) = test_db();
        let created = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        assert!(!db.delete_event(created.id, 2).unwrap());
        assert!(db.delete_event(created.id, 1).unwrap());
        assert!(db.get_event_for_owner(created.id, 1).unwrap().is_none());
    }

    #[test]
    fn test_mark_started_claims_once() {
        let (db, _dir) = test_db();
        let created = db
            .create_event(1, &new_event("a", ts(10, 0), ts(11, 0)))
            .unwrap();

        assert!(db.mark_started(created.id).unwrap());
        assert!(!db.mark_started(created.id).unwrap());
        assert!(db.get_event(created.id).unwrap().unwrap().started);
    }

    #[test]
    fn test_job_rows() {
        let (db, _dir) = test_db();
        db.insert_job("event_1", 1, ts(10, 0)).unwrap();

        let err = db.insert_job("event_1", 1, ts(10, 0)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateJob(_)));

        db.update_job_fire_at("event_1", ts(12, 0)).unwrap();
        let pending = db.load_pending_jobs().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, ts(12, 0));

        let err = db.update_job_fire_at("event_2", ts(12, 0)).unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));

        // Failed jobs drop out of the pending set but keep their row
        db.set_job_status("event_1", "failed").unwrap();
        assert!(db.load_pending_jobs().unwrap().is_empty());
        let err = db.update_job_fire_at("event_1", ts(13, 0)).unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));

        // Deleting is a no-op when absent
        db.delete_job("event_1").unwrap();
        db.delete_job("event_1").unwrap();
    }
}
