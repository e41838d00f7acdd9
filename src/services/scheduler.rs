use crate::services::dispatch::{Job, JobDispatcher};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info};

fn digest_job(cron: &str, dispatcher: Arc<dyn JobDispatcher>) -> Result<CronJob> {
    CronJob::new_async(cron, move |_uuid, _lock| {
        let dispatcher = dispatcher.clone();
        Box::pin(async move {
            info!("Scheduled digest run triggered");
            if let Err(e) = dispatcher.dispatch(Job::NotifyDue).await {
                error!(error = %e, "Scheduled digest run failed");
            }
        })
    })
    .with_context(|| format!("creating digest job for cron `{}`", cron))
}

/// Starts a scheduler that dispatches the digest job on `cron`.
pub async fn start_digest_scheduler(
    cron: &str,
    dispatcher: Arc<dyn JobDispatcher>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await.context("creating scheduler")?;
    scheduler
        .add(digest_job(cron, dispatcher)?)
        .await
        .context("adding digest job")?;
    scheduler.start().await.context("starting scheduler")?;
    info!(%cron, "Digest scheduler started");
    Ok(scheduler)
}
