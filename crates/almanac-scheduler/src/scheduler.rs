//! Job scheduler implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tokio::time::sleep;
use tracing::{error, info, warn};

use almanac_store::{Database, StoreError};
use chrono::{DateTime, Utc};

use crate::SchedulerError;
use crate::time::TimeSource;
use crate::types::{JobStatus, ScheduledJob};

/// Minimum sleep duration between scheduler checks.
const MIN_SLEEP_SECS: u64 = 1;

/// Maximum sleep duration between scheduler checks.
const MAX_SLEEP_SECS: u64 = 60;

/// Type alias for the job executor function.
///
/// Shared rather than boxed so each firing can run on its own task.
pub type JobExecutor = Arc<
    dyn Fn(ScheduledJob) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync,
>;

/// The job scheduler.
///
/// Holds the pending set in memory, mirrored to durable rows in the store.
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Scheduler {
    db: Arc<Database>,
    clock: Arc<dyn TimeSource>,
    jobs: Arc<RwLock<Vec<ScheduledJob>>>,
}

impl Scheduler {
    /// Create a new scheduler with injected store handle and time source.
    pub fn new(db: Arc<Database>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            db,
            clock,
            jobs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Load pending jobs from the store (startup recovery). Jobs whose fire
    /// time passed while the process was down become due immediately.
    pub async fn load_jobs(&self) -> Result<(), SchedulerError> {
        let rows = self.db.load_pending_jobs()?;
        let jobs: Vec<ScheduledJob> = rows
            .into_iter()
            .map(|row| ScheduledJob::new(row.job_id, row.event_id, row.fire_at))
            .collect();

        info!(count = jobs.len(), "loaded pending jobs from store");
        *self.jobs.write().await = jobs;
        Ok(())
    }

    /// Schedule a new one-shot job. Fails with
    /// [`SchedulerError::DuplicateJob`] if a pending job with this id exists.
    pub async fn schedule(
        &self,
        job_id: &str,
        fire_at: DateTime<Utc>,
        event_id: i64,
    ) -> Result<(), SchedulerError> {
        {
            let jobs = self.jobs.read().await;
            if jobs.iter().any(|j| j.job_id == job_id) {
                return Err(SchedulerError::DuplicateJob(job_id.to_string()));
            }
        }

        // The primary key on the job row is authoritative if two schedules race
        match self.db.insert_job(job_id, event_id, fire_at) {
            Ok(()) => {}
            Err(StoreError::DuplicateJob(id)) => return Err(SchedulerError::DuplicateJob(id)),
            Err(e) => return Err(e.into()),
        }

        self.jobs
            .write()
            .await
            .push(ScheduledJob::new(job_id.to_string(), event_id, fire_at));

        info!(job_id, %fire_at, event_id, "scheduled job");
        Ok(())
    }

    /// Move a pending job's fire time. Fails with
    /// [`SchedulerError::JobNotFound`] if absent; the payload is kept.
    pub async fn reschedule(
        &self,
        job_id: &str,
        new_fire_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|j| j.job_id == job_id && j.status == JobStatus::Pending)
        else {
            return Err(SchedulerError::JobNotFound(job_id.to_string()));
        };

        match self.db.update_job_fire_at(job_id, new_fire_at) {
            Ok(()) => {}
            Err(StoreError::JobNotFound(id)) => return Err(SchedulerError::JobNotFound(id)),
            Err(e) => return Err(e.into()),
        }
        job.fire_at = new_fire_at;

        info!(job_id, %new_fire_at, "rescheduled job");
        Ok(())
    }

    /// Cancel a job so it never fires. No-op if absent. Safe to call while
    /// the same job is mid-fire: the row is gone either way, and the firing
    /// side tolerates a missing row.
    pub async fn cancel(&self, job_id: &str) -> Result<(), SchedulerError> {
        let removed = {
            let mut jobs = self.jobs.write().await;
            let before = jobs.len();
            jobs.retain(|j| j.job_id != job_id);
            jobs.len() != before
        };

        self.db.delete_job(job_id)?;

        if removed {
            info!(job_id, "cancelled job");
        }
        Ok(())
    }

    /// Whether a pending job with this id exists.
    pub async fn exists(&self, job_id: &str) -> bool {
        self.jobs
            .read()
            .await
            .iter()
            .any(|j| j.job_id == job_id && j.status == JobStatus::Pending)
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>, executor: JobExecutor) {
        info!("scheduler starting");

        loop {
            if *shutdown_rx.borrow() {
                info!("scheduler shutting down");
                break;
            }

            // Executions run on their own tasks so a slow callback cannot
            // stall other due jobs.
            for job in self.take_due_jobs().await {
                let this = self.clone();
                let executor = Arc::clone(&executor);
                tokio::spawn(async move {
                    this.execute_job(job, &executor).await;
                });
            }

            let sleep_duration = self.calculate_sleep_duration().await;

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                    }
                }
                _ = sleep(sleep_duration) => {}
            }
        }

        info!("scheduler shut down gracefully");
    }

    /// Take all due jobs, marking them running so a pass cannot pick a job
    /// up twice.
    pub async fn take_due_jobs(&self) -> Vec<ScheduledJob> {
        let now = self.clock.now();
        let mut jobs = self.jobs.write().await;

        let mut due = Vec::new();
        for job in jobs.iter_mut() {
            if job.is_due(now) {
                job.status = JobStatus::Running;
                due.push(job.clone());
            }
        }
        due
    }

    /// Calculate how long to sleep until the next job is due.
    pub async fn calculate_sleep_duration(&self) -> std::time::Duration {
        let jobs = self.jobs.read().await;
        let now = self.clock.now();

        let next_due = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.fire_at)
            .min();

        let secs = match next_due {
            Some(next) => {
                let diff = (next - now).num_seconds();
                (diff.max(MIN_SLEEP_SECS as i64) as u64).min(MAX_SLEEP_SECS)
            }
            None => MAX_SLEEP_SECS,
        };

        std::time::Duration::from_secs(secs)
    }

    /// Execute a single job and settle its durable row.
    ///
    /// One-shot semantics: success discards the job; failure is logged, the
    /// row is marked `failed`, and the job is never retried.
    pub async fn execute_job(&self, job: ScheduledJob, executor: &JobExecutor) {
        info!(job_id = %job.job_id, event_id = job.event_id, "executing job");

        let result = executor(job.clone()).await;

        match result {
            Ok(()) => {
                if let Err(e) = self.db.delete_job(&job.job_id) {
                    error!(job_id = %job.job_id, error = %e, "failed to discard completed job");
                }
            }
            Err(err) => {
                warn!(job_id = %job.job_id, error = %err, "job execution failed, not retrying");
                if let Err(e) = self.db.set_job_status(&job.job_id, "failed") {
                    error!(job_id = %job.job_id, error = %e, "failed to record job failure");
                }
            }
        }

        // Out of the pending set either way
        self.jobs.write().await.retain(|j| j.job_id != job.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn test_scheduler(now: DateTime<Utc>) -> (Scheduler, Arc<ManualClock>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(dir.path().join("jobs.db")).unwrap());
        let clock = ManualClock::new(now);
        let scheduler = Scheduler::new(db, clock.clone());
        (scheduler, clock, dir)
    }

    fn counting_executor() -> (JobExecutor, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let executor: JobExecutor = Arc::new(move |_job| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        (executor, fired)
    }

    #[tokio::test]
    async fn test_schedule_and_exists() {
        let (scheduler, _clock, _dir) = test_scheduler(ts(9));

        assert!(!scheduler.exists("event_1").await);
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();
        assert!(scheduler.exists("event_1").await);
    }

    #[tokio::test]
    async fn test_duplicate_schedule_rejected() {
        let (scheduler, _clock, _dir) = test_scheduler(ts(9));
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();

        let err = scheduler.schedule("event_1", ts(11), 1).await.unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJob(_)));
    }

    #[tokio::test]
    async fn test_reschedule_moves_fire_time() {
        let (scheduler, clock, _dir) = test_scheduler(ts(9));
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();

        // Not due at the old time once moved out
        scheduler.reschedule("event_1", ts(12)).await.unwrap();
        clock.set(ts(10));
        assert!(scheduler.take_due_jobs().await.is_empty());

        // Due at the new time, payload intact
        clock.set(ts(12));
        let due = scheduler.take_due_jobs().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event_id, 1);
    }

    #[tokio::test]
    async fn test_reschedule_missing_job() {
        let (scheduler, _clock, _dir) = test_scheduler(ts(9));
        let err = scheduler.reschedule("event_9", ts(10)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancelled_job_never_fires() {
        let (scheduler, clock, _dir) = test_scheduler(ts(9));
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();

        scheduler.cancel("event_1").await.unwrap();
        assert!(!scheduler.exists("event_1").await);

        clock.set(ts(11));
        assert!(scheduler.take_due_jobs().await.is_empty());

        // Cancelling again is a no-op, not an error
        scheduler.cancel("event_1").await.unwrap();
    }

    #[tokio::test]
    async fn test_catch_up_after_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");

        {
            let db = Arc::new(Database::open(&path).unwrap());
            let scheduler = Scheduler::new(db, ManualClock::new(ts(9)));
            scheduler.schedule("event_1", ts(10), 1).await.unwrap();
            // Process "crashes" here with the job still pending
        }

        let db = Arc::new(Database::open(&path).unwrap());
        let scheduler = Scheduler::new(db, ManualClock::new(ts(11)));
        scheduler.load_jobs().await.unwrap();

        // Fire time passed while down: due on the first pass
        let due = scheduler.take_due_jobs().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].job_id, "event_1");
    }

    #[tokio::test]
    async fn test_successful_execution_discards_job() {
        let (scheduler, clock, _dir) = test_scheduler(ts(9));
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();
        clock.set(ts(10));

        let (executor, fired) = counting_executor();
        for job in scheduler.take_due_jobs().await {
            scheduler.execute_job(job, &executor).await;
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.exists("event_1").await);

        // The durable row is gone too: restart finds nothing to fire
        scheduler.load_jobs().await.unwrap();
        assert!(scheduler.take_due_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_execution_is_not_retried() {
        let (scheduler, clock, _dir) = test_scheduler(ts(9));
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();
        clock.set(ts(10));

        let executor: JobExecutor =
            Arc::new(|_job| Box::pin(async { Err("smtp unreachable".to_string()) }));
        for job in scheduler.take_due_jobs().await {
            scheduler.execute_job(job, &executor).await;
        }

        // Out of the pending set, and not resurrected by recovery
        assert!(!scheduler.exists("event_1").await);
        scheduler.load_jobs().await.unwrap();
        assert!(scheduler.take_due_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_take_due_jobs_does_not_double_fire() {
        let (scheduler, clock, _dir) = test_scheduler(ts(9));
        scheduler.schedule("event_1", ts(10), 1).await.unwrap();
        clock.set(ts(10));

        assert_eq!(scheduler.take_due_jobs().await.len(), 1);
        // Marked running: a second pass must not pick it up again
        assert!(scheduler.take_due_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_sleep_duration_bounds() {
        let (scheduler, _clock, _dir) = test_scheduler(ts(9));

        // No jobs: sleep the maximum
        assert_eq!(
            scheduler.calculate_sleep_duration().await.as_secs(),
            MAX_SLEEP_SECS
        );

        // Imminent job: clamp to the minimum
        scheduler.schedule("event_1", ts(9), 1).await.unwrap();
        assert_eq!(
            scheduler.calculate_sleep_duration().await.as_secs(),
            MIN_SLEEP_SECS
        );

        // Distant job: clamp to the maximum
        scheduler
            .reschedule("event_1", ts(9) + Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(
            scheduler.calculate_sleep_duration().await.as_secs(),
            MAX_SLEEP_SECS
        );
    }
}
