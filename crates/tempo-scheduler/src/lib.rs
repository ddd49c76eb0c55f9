//! `tempo-scheduler` — SQLite-backed job scheduler driven by cron patterns.
//!
//! # Overview
//!
//! Jobs are persisted to a SQLite `jobs` table. The
//! [`engine::SchedulerEngine`] polls the table on a fixed cadence and fires
//! any job whose `next_run` has arrived, updating state and recomputing the
//! next occurrence with [`tempo_cron::Cron`]. A [`engine::SchedulerHandle`]
//! lets other tasks add, remove and list jobs over their own connection
//! while the engine loop runs.
//!
//! Every job carries a six-field cron pattern (minute, hour, day-of-month,
//! month, day-of-week, year). Patterns are validated when the job is
//! inserted; a pattern with no future occurrence is rejected up front.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod types;

pub use config::TempoConfig;
pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::{Job, JobStatus};
