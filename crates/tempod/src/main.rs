use std::time::Duration;

use tracing::{error, info};

use tempo_scheduler::{SchedulerEngine, SchedulerHandle, TempoConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempod=info,tempo_scheduler=info".into()),
        )
        .init();

    // load config: explicit path via TEMPO_CONFIG > ~/.tempo/tempo.toml
    let config_path = std::env::var("TEMPO_CONFIG").ok();
    let config = TempoConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        TempoConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // Fired-job channel: SchedulerEngine → delivery logging task
    let (fired_tx, mut fired_rx) = tokio::sync::mpsc::channel::<tempo_scheduler::Job>(256);

    // management handle on its own connection, engine for the tick loop
    let handle = SchedulerHandle::new(rusqlite::Connection::open(db_path)?)?;
    let engine = SchedulerEngine::new(
        db,
        Duration::from_secs(config.scheduler.tick),
        Some(fired_tx),
    )?;

    for job in handle.list_jobs()? {
        info!(
            job_id = %job.id,
            name = %job.name,
            pattern = %job.pattern,
            next_run = %job.next_run.as_deref().unwrap_or("-"),
            "loaded job"
        );
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    // Fired jobs are logged; a real deployment hangs its delivery off this
    // receiver instead.
    let delivery_task = tokio::spawn(async move {
        while let Some(job) = fired_rx.recv().await {
            info!(job_id = %job.id, name = %job.name, action = %job.action, "job fired");
        }
    });

    info!("tempod running, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    shutdown_tx.send(true)?;
    engine_task.await?;
    delivery_task.abort();

    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("failed to create {}: {e}", parent.display());
            }
        }
    }
}
