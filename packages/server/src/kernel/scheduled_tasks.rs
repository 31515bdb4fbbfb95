//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Two loops keep the waiting pool moving:
//! - the sweep pass runs proposal cycles for the longest-waiting users
//! - the garbage collector evicts pool entries whose records went stale

use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::matching::service::MatchService;

/// Start all scheduled tasks
pub async fn start_scheduler(service: Arc<MatchService>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_interval = service.tuning().sweep_interval;
    let sweep_service = Arc::clone(&service);
    let sweep_job = Job::new_repeated_async(sweep_interval, move |_uuid, _lock| {
        let service = Arc::clone(&sweep_service);
        Box::pin(async move {
            service.run_sweep().await;
        })
    })?;
    scheduler.add(sweep_job).await?;

    let gc_interval = service.tuning().gc_interval;
    let gc_service = Arc::clone(&service);
    let gc_job = Job::new_repeated_async(gc_interval, move |_uuid, _lock| {
        let service = Arc::clone(&gc_service);
        Box::pin(async move {
            service.run_gc().await;
        })
    })?;
    scheduler.add(gc_job).await?;

    scheduler.start().await?;

    tracing::info!(
        sweep_secs = sweep_interval.as_secs(),
        gc_secs = gc_interval.as_secs(),
        "scheduled tasks started"
    );
    Ok(scheduler)
}
