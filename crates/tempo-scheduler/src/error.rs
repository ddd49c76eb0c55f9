use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The cron pattern does not parse.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] tempo_cron::CronError),

    /// The pattern parses but has no occurrence in the future.
    #[error("Pattern {pattern:?} has no future occurrence")]
    Unschedulable { pattern: String },

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
