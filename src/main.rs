use anyhow::Context;
use blog_media_lib::modules::jobs::{spawn_event_logger, BackgroundWorker, JobEventBus};
use blog_media_lib::shared::{init_logger, AppConfig};
use blog_media_lib::{log_error, log_info, AppServices};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound between two maintenance passes (stall check and retention purge)
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = AppServices::build(&config)
        .await
        .context("failed to initialize services")?;

    let events = JobEventBus::new();
    let event_logger = spawn_event_logger(&events);

    let worker = Arc::new(
        BackgroundWorker::new(
            Arc::clone(&services.jobs),
            &services.registry,
            &config.media_queue,
            events,
            config.worker.clone(),
        )
        .context("failed to start the media worker")?,
    );
    let worker_handle = tokio::spawn(Arc::clone(&worker).run());

    let retention = chrono::Duration::days(config.job_retention_days);
    let maintenance_interval = config.worker.stall_timeout.min(MAINTENANCE_INTERVAL);
    let maintainer = Arc::clone(&worker);
    let maintenance_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(maintenance_interval);
        loop {
            ticker.tick().await;
            if !maintainer.is_running() {
                break;
            }
            if let Err(e) = maintainer.recover_stalled().await {
                log_error!("Failed to reclaim stalled jobs: {}", e);
            }
            if let Err(e) = maintainer.purge_finished(retention).await {
                log_error!("Failed to purge finished jobs: {}", e);
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log_info!("Shutdown requested, waiting for in-flight jobs");

    worker.stop();
    maintenance_handle.abort();
    if let Err(e) = worker_handle.await {
        log_error!("Worker task ended abnormally: {}", e);
    }
    event_logger.abort();
    services.cache.close().await?;

    log_info!("Worker stopped");
    Ok(())
}
