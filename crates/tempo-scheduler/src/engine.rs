use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;
use tempo_cron::Cron;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    types::{format_timestamp, Job, JobStatus},
};

/// Validate `pattern` and insert a new pending job, computing its first
/// firing from the current instant.
fn insert_job(
    conn: &Connection,
    name: &str,
    pattern: &str,
    action: &str,
    max_runs: Option<u32>,
) -> Result<Job> {
    let cron = Cron::parse(pattern)?;
    let now = Utc::now().naive_utc();
    let next = cron
        .next(now)
        .map(format_timestamp)
        .ok_or_else(|| SchedulerError::Unschedulable {
            pattern: pattern.to_string(),
        })?;
    let now_str = format_timestamp(now);
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO jobs
         (id, name, pattern, action, status, last_run, next_run,
          run_count, max_runs, created_at, updated_at)
         VALUES (?1,?2,?3,?4,'pending',NULL,?5,0,?6,?7,?7)",
        rusqlite::params![id, name, cron.pattern(), action, next, max_runs, now_str],
    )?;

    Ok(Job {
        id,
        name: name.to_string(),
        pattern: cron.pattern().to_string(),
        action: action.to_string(),
        status: JobStatus::Pending,
        last_run: None,
        next_run: Some(next),
        run_count: 0,
        max_runs,
        created_at: now_str.clone(),
        updated_at: now_str,
    })
}

fn delete_job(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
    if n == 0 {
        return Err(SchedulerError::JobNotFound { id: id.to_string() });
    }
    Ok(())
}

fn select_jobs(conn: &Connection) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, pattern, action, status, last_run, next_run,
                run_count, max_runs, created_at, updated_at
         FROM jobs ORDER BY created_at",
    )?;
    let jobs = stmt
        .query_map([], job_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(jobs)
}

/// Map a full jobs row (columns in table order) into a [`Job`].
fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let status_str: String = row.get(4)?;
    let status = status_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        pattern: row.get(2)?,
        action: row.get(3)?,
        status,
        last_run: row.get(5)?,
        next_run: row.get(6)?,
        run_count: row.get(7)?,
        max_runs: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Shared handle for job management (add/remove/list) while the engine
/// loop runs.
///
/// Uses its own `Connection` so callers can manage jobs without
/// conflicting with the engine's polling queries.
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Add a new job. The pattern must parse and have a future occurrence.
    /// Returns the fully populated [`Job`] record.
    pub fn add_job(
        &self,
        name: &str,
        pattern: &str,
        action: &str,
        max_runs: Option<u32>,
    ) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        let job = insert_job(&conn, name, pattern, action, max_runs)?;
        info!(job_id = %job.id, %name, pattern = %job.pattern, "job added via handle");
        Ok(job)
    }

    /// Remove a job by ID. Returns `JobNotFound` if no row is deleted.
    pub fn remove_job(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        delete_job(&conn, id)?;
        info!(job_id = %id, "job removed via handle");
        Ok(())
    }

    /// Return all known jobs ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        select_jobs(&conn)
    }
}

/// Core scheduler: persists jobs to SQLite and fires each one when its
/// pattern's next occurrence arrives.
pub struct SchedulerEngine {
    conn: Connection,
    /// Polling cadence of the run loop.
    tick_interval: Duration,
    /// If set, fired jobs are sent here for delivery routing.
    fired_tx: Option<mpsc::Sender<Job>>,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    ///
    /// Pass `Some(tx)` to receive a copy of every fired [`Job`] via mpsc.
    /// The sender is non-blocking (`try_send`) so the tick loop is never
    /// stalled.
    pub fn new(
        conn: Connection,
        tick_interval: Duration,
        fired_tx: Option<mpsc::Sender<Job>>,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            tick_interval,
            fired_tx,
        })
    }

    /// Add a new job. The pattern must parse and have a future occurrence.
    pub fn add_job(
        &self,
        name: &str,
        pattern: &str,
        action: &str,
        max_runs: Option<u32>,
    ) -> Result<Job> {
        let job = insert_job(&self.conn, name, pattern, action, max_runs)?;
        info!(job_id = %job.id, %name, pattern = %job.pattern, "job added");
        Ok(job)
    }

    /// Remove a job by ID. Returns `JobNotFound` if no row is deleted.
    pub fn remove_job(&self, id: &str) -> Result<()> {
        delete_job(&self.conn, id)?;
        info!(job_id = %id, "job removed");
        Ok(())
    }

    /// Return all known jobs ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        select_jobs(&self.conn)
    }

    /// Main event loop. Polls until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        self.mark_missed_on_startup();

        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    // --- private helpers ---------------------------------------------------

    /// On startup, mark any pending job whose next_run is in the past as
    /// Missed.
    fn mark_missed_on_startup(&mut self) {
        let now = format_timestamp(Utc::now().naive_utc());
        match self.conn.execute(
            "UPDATE jobs SET status = 'missed', updated_at = ?1
             WHERE status = 'pending' AND next_run IS NOT NULL AND next_run < ?1",
            [&now],
        ) {
            Ok(n) if n > 0 => warn!(count = n, "jobs marked missed on startup"),
            Err(e) => error!("missed-on-startup query failed: {e}"),
            _ => {}
        }
    }

    /// Process all jobs whose next_run has arrived.
    fn tick(&mut self) -> Result<()> {
        let now = Utc::now().naive_utc();
        let now_str = format_timestamp(now);

        // Collect eagerly inside the block so `stmt` is dropped before we
        // borrow `self.conn` again for the UPDATE below.
        // Columns: id, name, pattern, action, run_count, max_runs, created_at
        let due: Vec<(String, String, String, String, u32, Option<u32>, String)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, name, pattern, action, run_count, max_runs, created_at
                 FROM jobs
                 WHERE status = 'pending' AND next_run IS NOT NULL AND next_run <= ?1",
            )?;
            let rows: Vec<_> = stmt
                .query_map([&now_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, Option<u32>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        for (id, name, pattern, action, run_count, max_runs, created_at) in due {
            let new_count = run_count + 1;
            // next is None when the pattern is exhausted or max_runs is
            // reached; either way the job will not fire again.
            let next = if max_runs.is_some_and(|m| new_count >= m) {
                None
            } else {
                match Cron::parse(&pattern) {
                    Ok(cron) => cron.next(now).map(format_timestamp),
                    Err(e) => {
                        error!(job_id = %id, "bad pattern in store: {e}");
                        continue;
                    }
                }
            };
            let new_status = if next.is_none() {
                JobStatus::Completed
            } else {
                JobStatus::Pending
            };

            info!(job_id = %id, %name, run = new_count, next_status = %new_status, "firing job");

            self.conn.execute(
                "UPDATE jobs SET status=?1, last_run=?2, next_run=?3,
                  run_count=?4, updated_at=?2
                 WHERE id=?5",
                rusqlite::params![new_status.to_string(), now_str, next, new_count, id],
            )?;

            // Forward the fired job to the delivery router (non-blocking).
            if let Some(ref tx) = self.fired_tx {
                let job = Job {
                    id: id.clone(),
                    name,
                    pattern,
                    action,
                    status: new_status,
                    last_run: Some(now_str.clone()),
                    next_run: next,
                    run_count: new_count,
                    max_runs,
                    created_at,
                    updated_at: now_str.clone(),
                };
                // try_send never blocks the tick loop; log a warning if
                // the channel is full.
                if tx.try_send(job).is_err() {
                    warn!(job_id = %id, "delivery channel full or closed — job dropped");
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;

    fn engine(fired_tx: Option<mpsc::Sender<Job>>) -> SchedulerEngine {
        SchedulerEngine::new(
            Connection::open_in_memory().unwrap(),
            Duration::from_secs(1),
            fired_tx,
        )
        .unwrap()
    }

    fn backdate(engine: &SchedulerEngine, id: &str) {
        engine
            .conn
            .execute(
                "UPDATE jobs SET next_run = '2000-01-01T00:00:00' WHERE id = ?1",
                [id],
            )
            .unwrap();
    }

    #[test]
    fn add_job_validates_and_schedules() {
        let engine = engine(None);
        let job = engine
            .add_job("backup", "*/5 * * * * *", "{}", None)
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.pattern, "*/5 * * * * *");
        assert_eq!(job.run_count, 0);
        let next = job.next_run.expect("a future occurrence");
        assert!(parse_timestamp(&next).is_some());
    }

    #[test]
    fn add_job_rejects_bad_patterns() {
        let engine = engine(None);
        assert!(matches!(
            engine.add_job("broken", "61 * * * * *", "{}", None),
            Err(SchedulerError::InvalidPattern(_))
        ));
        // February 31st parses but can never fire.
        assert!(matches!(
            engine.add_job("never", "0 0 31 2 * *", "{}", None),
            Err(SchedulerError::Unschedulable { .. })
        ));
    }

    #[test]
    fn add_job_canonicalizes_pattern() {
        let engine = engine(None);
        let job = engine
            .add_job("spaced", "  0  12 * * *   * ", "{}", None)
            .unwrap();
        assert_eq!(job.pattern, "0 12 * * * *");
    }

    #[test]
    fn list_and_remove_round_trip() {
        let engine = engine(None);
        let a = engine.add_job("a", "* * * * * *", "{}", None).unwrap();
        engine.add_job("b", "0 0 * * * *", "{}", None).unwrap();
        assert_eq!(engine.list_jobs().unwrap().len(), 2);

        engine.remove_job(&a.id).unwrap();
        let left = engine.list_jobs().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "b");

        assert!(matches!(
            engine.remove_job(&a.id),
            Err(SchedulerError::JobNotFound { .. })
        ));
    }

    #[test]
    fn tick_fires_due_jobs_and_reschedules() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut engine = engine(Some(tx));
        let job = engine
            .add_job("every-minute", "* * * * * *", "{\"kind\":\"noop\"}", None)
            .unwrap();

        // Nothing due yet: the first occurrence is in the future.
        engine.tick().unwrap();
        assert!(rx.try_recv().is_err());

        backdate(&engine, &job.id);
        engine.tick().unwrap();

        let fired = rx.try_recv().expect("job should have fired");
        assert_eq!(fired.id, job.id);
        assert_eq!(fired.run_count, 1);
        assert_eq!(fired.status, JobStatus::Pending);
        assert_eq!(fired.action, "{\"kind\":\"noop\"}");

        let stored = &engine.list_jobs().unwrap()[0];
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.run_count, 1);
        // Rescheduled into the future.
        assert!(stored.next_run.as_deref().unwrap() > stored.last_run.as_deref().unwrap());
    }

    #[test]
    fn max_runs_completes_the_job() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut engine = engine(Some(tx));
        let job = engine
            .add_job("once", "* * * * * *", "{}", Some(1))
            .unwrap();

        backdate(&engine, &job.id);
        engine.tick().unwrap();

        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.status, JobStatus::Completed);
        assert_eq!(fired.next_run, None);

        let stored = &engine.list_jobs().unwrap()[0];
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.next_run, None);

        // Completed jobs stay quiet.
        engine.tick().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stale_pending_jobs_are_missed_on_startup() {
        let mut engine = engine(None);
        let job = engine.add_job("stale", "* * * * * *", "{}", None).unwrap();
        backdate(&engine, &job.id);

        engine.mark_missed_on_startup();
        let stored = &engine.list_jobs().unwrap()[0];
        assert_eq!(stored.status, JobStatus::Missed);

        // A missed job is no longer picked up by the tick loop.
        engine.tick().unwrap();
        assert_eq!(engine.list_jobs().unwrap()[0].run_count, 0);
    }

    #[test]
    fn handle_add_list_remove() {
        let handle = SchedulerHandle::new(Connection::open_in_memory().unwrap()).unwrap();
        let job = handle.add_job("h", "0 0 * * 0 *", "{}", None).unwrap();
        assert_eq!(handle.list_jobs().unwrap().len(), 1);
        handle.remove_job(&job.id).unwrap();
        assert!(handle.list_jobs().unwrap().is_empty());
    }
}
