//! Temporary post purge background job.
//!
//! Drafts and previews are stored as temporary posts; this job deletes the
//! ones older than the configured maximum age.

use super::run_blocking;
use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::config::BackgroundJobsSettings;
use crate::store::ForumStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct PurgeTempPostsJob {
    store: Arc<dyn ForumStore>,
    period: Duration,
    max_age: Duration,
}

impl PurgeTempPostsJob {
    pub fn new(store: Arc<dyn ForumStore>, period: Duration, max_age: Duration) -> Self {
        Self {
            store,
            period,
            max_age,
        }
    }

    pub fn from_settings(store: Arc<dyn ForumStore>, settings: &BackgroundJobsSettings) -> Self {
        Self::new(
            store,
            Duration::from_secs(settings.purge_temp_posts_interval_secs),
            Duration::from_secs(settings.temp_post_max_age_secs),
        )
    }

    fn cutoff(&self, now: i64) -> i64 {
        now - self.max_age.as_secs() as i64
    }
}

#[async_trait]
impl BackgroundJob for PurgeTempPostsJob {
    fn id(&self) -> &'static str {
        "purge_temp_posts"
    }

    fn description(&self) -> &'static str {
        "Delete temporary posts older than the retention period"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn run_first_immediately(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let cutoff = self.cutoff(chrono::Utc::now().timestamp());
        debug!("Purging temporary posts created before {}", cutoff);

        let store = self.store.clone();
        let deleted = run_blocking(move || store.purge_temp_posts_older_than(cutoff)).await?;

        if deleted > 0 {
            info!("Purged {} temporary posts", deleted);
        }
        Ok(())
    }
}
