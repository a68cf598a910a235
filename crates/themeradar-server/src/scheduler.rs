//! Background job scheduler.
//!
//! Three recurring jobs keep the stored signal fresh without manual
//! triggers: a nightly full batch rescore, an hourly light pass that only
//! reacts to large market-size moves, and a realtime sync sweep every
//! five minutes.

use std::sync::Arc;

use sqlx::PgPool;
use themeradar_analysis::{run_batch_update, BatchMode};
use themeradar_broadcast::{run_realtime_sync, BroadcastHub};
use themeradar_core::AppConfig;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

const NIGHTLY_FULL_BATCH: &str = "0 0 2 * * *";
const HOURLY_LIGHT_BATCH: &str = "0 0 * * * *";
const REALTIME_SYNC: &str = "0 */5 * * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all scheduled
/// jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised or
/// started.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    hub: Arc<BroadcastHub>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job_pool = pool.clone();
    let job_config = Arc::clone(&config);
    scheduler
        .add(Job::new_async(NIGHTLY_FULL_BATCH, move |_id, _sched| {
            let pool = job_pool.clone();
            let config = Arc::clone(&job_config);
            Box::pin(async move {
                match run_batch_update(&pool, &config, BatchMode::Full).await {
                    Ok(report) => tracing::info!(
                        themes_examined = report.themes_examined,
                        themes_updated = report.themes_updated,
                        observations_deleted = report.observations_deleted,
                        "nightly full batch finished"
                    ),
                    Err(error) => tracing::error!(error = %error, "nightly full batch failed"),
                }
            })
        })?)
        .await?;

    let job_pool = pool.clone();
    let job_config = Arc::clone(&config);
    scheduler
        .add(Job::new_async(HOURLY_LIGHT_BATCH, move |_id, _sched| {
            let pool = job_pool.clone();
            let config = Arc::clone(&job_config);
            Box::pin(async move {
                match run_batch_update(&pool, &config, BatchMode::Light).await {
                    Ok(report) => tracing::info!(
                        themes_examined = report.themes_examined,
                        themes_updated = report.themes_updated,
                        "hourly light batch finished"
                    ),
                    Err(error) => tracing::error!(error = %error, "hourly light batch failed"),
                }
            })
        })?)
        .await?;

    scheduler
        .add(Job::new_async(REALTIME_SYNC, move |_id, _sched| {
            let pool = pool.clone();
            let config = Arc::clone(&config);
            let hub = Arc::clone(&hub);
            Box::pin(async move {
                match run_realtime_sync(&pool, &config, &hub).await {
                    Ok(report) => tracing::debug!(
                        changes_detected = report.changes_detected,
                        notifications_written = report.notifications_written,
                        alerts_fired = report.alerts_fired,
                        "realtime sync sweep finished"
                    ),
                    Err(error) => tracing::error!(error = %error, "realtime sync sweep failed"),
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    Ok(scheduler)
}
