//! Background job scheduling

pub mod availability_sync;

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::sync::AvailabilitySync;

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    sync: Arc<AvailabilitySync>,
    cron: &str,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sync_job = Job::new_async(cron, move |_uuid, _l| {
        let sync = sync.clone();
        Box::pin(async move {
            info!(job = "availability_sync", "Running availability sync");
            if let Err(e) = availability_sync::run_availability_sync(sync).await {
                tracing::error!(job = "availability_sync", "Availability sync error: {:#}", e);
            }
        })
    })?;
    scheduler.add(sync_job).await?;

    scheduler.start().await?;
    info!(cron = %cron, "Job scheduler started");

    Ok(scheduler)
}
