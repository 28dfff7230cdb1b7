//! Durable one-shot job scheduler for Almanac.
//!
//! This crate provides a persistent scheduler that:
//! - Stores job state in SQLite, keyed by a unique job id
//! - Survives crashes and restarts (past-due jobs fire on the next pass)
//! - Fires each job at most once, then discards it
//! - Catches and logs callback failures without retrying them

mod error;
mod scheduler;
mod time;
mod types;

pub use error::SchedulerError;
pub use scheduler::{JobExecutor, Scheduler};
pub use time::{SystemClock, TimeSource};
pub use types::{JobStatus, ScheduledJob, job_key};
