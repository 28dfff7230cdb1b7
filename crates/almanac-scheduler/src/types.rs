//! Scheduler types.

use chrono::{DateTime, Utc};

/// Deterministic job key for an event's reminder.
pub fn job_key(event_id: i64) -> String {
    format!("event_{event_id}")
}

/// A scheduled one-shot job.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// Unique job id (for reminders: `event_<id>`).
    pub job_id: String,
    /// Callback payload: the event this reminder belongs to.
    pub event_id: i64,
    /// When the job should fire.
    pub fire_at: DateTime<Utc>,
    /// Current status of the job.
    pub status: JobStatus,
}

/// Current status of a job in the in-memory pending set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobStatus {
    /// Job is waiting to fire.
    #[default]
    Pending,
    /// Job is currently executing.
    Running,
}

impl ScheduledJob {
    pub fn new(job_id: String, event_id: i64, fire_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            event_id,
            fire_at,
            status: JobStatus::Pending,
        }
    }

    /// Check if this job is due to fire at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.fire_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_job_key_is_deterministic() {
        assert_eq!(job_key(42), "event_42");
        assert_eq!(job_key(42), job_key(42));
    }

    #[test]
    fn test_job_due_at_and_after_fire_time() {
        let now = Utc::now();
        let job = ScheduledJob::new("event_1".to_string(), 1, now);

        assert!(job.is_due(now));
        assert!(job.is_due(now + Duration::hours(1)));
        assert!(!job.is_due(now - Duration::seconds(1)));
    }

    #[test]
    fn test_running_job_not_due() {
        let now = Utc::now();
        let mut job = ScheduledJob::new("event_1".to_string(), 1, now - Duration::hours(1));
        job.status = JobStatus::Running;
        assert!(!job.is_due(now));
    }

    proptest! {
        // Dueness is exactly "fire time has passed" for pending jobs
        #[test]
        fn dueness_matches_fire_time_ordering(offset_secs in -86_400i64..86_400) {
            let now = Utc::now();
            let job = ScheduledJob::new(
                "event_1".to_string(),
                1,
                now + Duration::seconds(offset_secs),
            );

            prop_assert_eq!(job.is_due(now), offset_secs <= 0);
        }
    }
}
