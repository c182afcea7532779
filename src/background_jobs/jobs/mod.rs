//! Maintenance jobs shipped with the forum server.
//!
//! Each job implements [`BackgroundJob`](super::BackgroundJob) and is turned
//! into a scheduler task by [`register_default_jobs`].

pub mod expired_sessions;
pub mod notification_dispatch;
pub mod purge_temp_posts;
pub mod site_settings_refresh;

pub use expired_sessions::ExpiredSessionsCleanupJob;
pub use notification_dispatch::{
    LogNotificationSender, NotificationDispatchJob, NotificationSender,
};
pub use purge_temp_posts::PurgeTempPostsJob;
pub use site_settings_refresh::SiteSettingsRefreshJob;

use super::{JobError, JobScheduler, SchedulerError};
use crate::config::BackgroundJobsSettings;
use crate::site_settings::SiteSettingsCache;
use crate::store::ForumStore;
use std::sync::Arc;

/// Register the standard set of maintenance jobs on `scheduler`.
pub fn register_default_jobs(
    scheduler: &mut JobScheduler,
    settings: &BackgroundJobsSettings,
    store: Arc<dyn ForumStore>,
    settings_cache: Arc<SiteSettingsCache>,
    sender: Arc<dyn NotificationSender>,
) -> Result<(), SchedulerError> {
    scheduler.register_job(Arc::new(PurgeTempPostsJob::from_settings(
        store.clone(),
        settings,
    )))?;
    scheduler.register_job(Arc::new(ExpiredSessionsCleanupJob::from_settings(
        store.clone(),
        settings,
    )))?;
    scheduler.register_job(Arc::new(NotificationDispatchJob::from_settings(
        store.clone(),
        sender,
        settings,
    )))?;
    scheduler.register_job(Arc::new(SiteSettingsRefreshJob::from_settings(
        store,
        settings_cache,
        settings,
    )))?;
    Ok(())
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, JobError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| JobError::ExecutionFailed(format!("Store task failed: {}", e)))?;
    Ok(result?)
}
