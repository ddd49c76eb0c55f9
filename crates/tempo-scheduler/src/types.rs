use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Storage format for timestamps: naive UTC, second precision. The format
/// sorts lexicographically, which the polling query relies on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format a UTC instant for storage.
pub fn format_timestamp(dt: NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back into a UTC instant.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next_run time.
    Pending,
    /// The pattern is exhausted (or max_runs was reached); the job will
    /// not fire again.
    Completed,
    /// The scheduled window was skipped (e.g. the engine was offline).
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Six-field cron pattern, validated at insert time.
    pub pattern: String,
    /// Opaque payload forwarded on the delivery channel when the job fires.
    pub action: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Timestamp of the most recent firing, if any.
    pub last_run: Option<String>,
    /// Timestamp of the next planned firing, if any.
    pub next_run: Option<String>,
    /// Total number of firings so far.
    pub run_count: u32,
    /// If set, the job is marked Completed after this many firings.
    pub max_runs: Option<u32>,
    /// Timestamp of job creation.
    pub created_at: String,
    /// Timestamp of the last metadata update.
    pub updated_at: String,
}
