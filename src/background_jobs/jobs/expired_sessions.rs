//! Expired session cleanup background job.

use super::run_blocking;
use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::config::BackgroundJobsSettings;
use crate::store::ForumStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Deletes login sessions past their expiry.
///
/// Sessions are checked at request time anyway, so there is no rush to run
/// this at start-up: the first run waits one full period.
pub struct ExpiredSessionsCleanupJob {
    store: Arc<dyn ForumStore>,
    period: Duration,
}

impl ExpiredSessionsCleanupJob {
    pub fn new(store: Arc<dyn ForumStore>, period: Duration) -> Self {
        Self { store, period }
    }

    pub fn from_settings(store: Arc<dyn ForumStore>, settings: &BackgroundJobsSettings) -> Self {
        Self::new(
            store,
            Duration::from_secs(settings.expired_sessions_interval_secs),
        )
    }
}

#[async_trait]
impl BackgroundJob for ExpiredSessionsCleanupJob {
    fn id(&self) -> &'static str {
        "expired_sessions_cleanup"
    }

    fn description(&self) -> &'static str {
        "Delete expired login sessions"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let now = chrono::Utc::now().timestamp();
        let store = self.store.clone();
        let deleted = run_blocking(move || store.purge_expired_sessions(now)).await?;

        if deleted > 0 {
            info!("Deleted {} expired sessions", deleted);
        }
        Ok(())
    }
}
