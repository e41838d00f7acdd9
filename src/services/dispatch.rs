//! Where notification work runs: on the caller's task or on a background worker.

use crate::config::Config;
use crate::error::Result;
use crate::services::notification_service::NotificationService;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    SendConfirmation(Uuid),
    NotifyListing(i64),
    NotifyDue,
}

#[async_trait::async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: Job) -> Result<()>;
}

/// Runs each job on the calling task and returns its result.
#[derive(Clone)]
pub struct InlineDispatcher {
    notifications: NotificationService,
}

impl InlineDispatcher {
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }
}

#[async_trait::async_trait]
impl JobDispatcher for InlineDispatcher {
    async fn dispatch(&self, job: Job) -> Result<()> {
        self.notifications.run(job).await
    }
}

/// Hands jobs to a worker over a bounded channel. A full or closed queue runs the job inline.
pub struct QueuedDispatcher {
    sender: mpsc::Sender<Job>,
    fallback: InlineDispatcher,
}

impl QueuedDispatcher {
    /// Starts the worker task. Must be called inside a tokio runtime.
    pub fn spawn(notifications: NotificationService, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));
        let worker = notifications.clone();
        tokio::spawn(async move {
            info!("Notification worker started");
            while let Some(job) = receiver.recv().await {
                if let Err(e) = worker.run(job).await {
                    error!(?job, error = %e, "Notification job failed");
                }
            }
            info!("Notification worker stopped");
        });

        Self {
            sender,
            fallback: InlineDispatcher::new(notifications),
        }
    }
}

#[async_trait::async_trait]
impl JobDispatcher for QueuedDispatcher {
    async fn dispatch(&self, job: Job) -> Result<()> {
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!(?job, "Notification queue is full; running job inline");
                self.fallback.dispatch(job).await
            }
            Err(TrySendError::Closed(job)) => {
                warn!(?job, "Notification queue is closed; running job inline");
                self.fallback.dispatch(job).await
            }
        }
    }
}

pub fn from_config(config: &Config, notifications: NotificationService) -> Arc<dyn JobDispatcher> {
    if config.send_emails_async {
        Arc::new(QueuedDispatcher::spawn(
            notifications,
            config.notification_queue_capacity,
        ))
    } else {
        Arc::new(InlineDispatcher::new(notifications))
    }
}
