//! Notification dispatch background job.
//!
//! Pending notifications are picked up oldest first, handed to a
//! [`NotificationSender`] and marked as sent. A notification whose delivery
//! fails stays pending and is retried on the next run.

use super::run_blocking;
use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::config::BackgroundJobsSettings;
use crate::store::{ForumStore, Notification};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delivery channel for user notifications (email, push, ...).
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Sender that only writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            "Notification {} for user {}: {}",
            notification.id, notification.user_id, notification.message
        );
        Ok(())
    }
}

pub struct NotificationDispatchJob {
    store: Arc<dyn ForumStore>,
    sender: Arc<dyn NotificationSender>,
    period: Duration,
    batch_size: usize,
}

impl NotificationDispatchJob {
    pub fn new(
        store: Arc<dyn ForumStore>,
        sender: Arc<dyn NotificationSender>,
        period: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            sender,
            period,
            batch_size,
        }
    }

    pub fn from_settings(
        store: Arc<dyn ForumStore>,
        sender: Arc<dyn NotificationSender>,
        settings: &BackgroundJobsSettings,
    ) -> Self {
        Self::new(
            store,
            sender,
            Duration::from_secs(settings.notification_dispatch_interval_secs),
            settings.notification_batch_size,
        )
    }
}

#[async_trait]
impl BackgroundJob for NotificationDispatchJob {
    fn id(&self) -> &'static str {
        "notification_dispatch"
    }

    fn description(&self) -> &'static str {
        "Deliver pending user notifications"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn run_first_immediately(&self) -> bool {
        true
    }

    // Runs every few seconds, per-run logging would drown everything else.
    fn quiet(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let store = self.store.clone();
        let limit = self.batch_size;
        let pending = run_blocking(move || store.get_pending_notifications(limit)).await?;

        let mut sent = 0usize;
        for notification in pending {
            if ctx.is_cancelled() {
                debug!("Notification dispatch cancelled after {} deliveries", sent);
                return Err(JobError::Cancelled);
            }

            if let Err(e) = self.sender.send(&notification).await {
                warn!("Failed to deliver notification {}: {}", notification.id, e);
                continue;
            }

            let store = self.store.clone();
            let id = notification.id;
            let now = chrono::Utc::now().timestamp();
            run_blocking(move || store.mark_notification_sent(id, now)).await?;
            sent += 1;
        }

        if sent > 0 {
            debug!("Delivered {} notifications", sent);
        }
        Ok(())
    }
}
