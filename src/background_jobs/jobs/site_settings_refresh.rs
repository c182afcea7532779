//! Reloads site settings from the store into the shared cache.

use super::run_blocking;
use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::config::BackgroundJobsSettings;
use crate::site_settings::SiteSettingsCache;
use crate::store::ForumStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SiteSettingsRefreshJob {
    store: Arc<dyn ForumStore>,
    cache: Arc<SiteSettingsCache>,
    period: Duration,
}

impl SiteSettingsRefreshJob {
    pub fn new(
        store: Arc<dyn ForumStore>,
        cache: Arc<SiteSettingsCache>,
        period: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            period,
        }
    }

    pub fn from_settings(
        store: Arc<dyn ForumStore>,
        cache: Arc<SiteSettingsCache>,
        settings: &BackgroundJobsSettings,
    ) -> Self {
        Self::new(
            store,
            cache,
            Duration::from_secs(settings.site_settings_refresh_interval_secs),
        )
    }
}

#[async_trait]
impl BackgroundJob for SiteSettingsRefreshJob {
    fn id(&self) -> &'static str {
        "site_settings_refresh"
    }

    fn description(&self) -> &'static str {
        "Reload site settings into the in-memory cache"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn run_first_immediately(&self) -> bool {
        true
    }

    fn quiet(&self) -> bool {
        true
    }

    async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
        let store = self.store.clone();
        let settings = run_blocking(move || store.load_site_settings())
            .await?
            .unwrap_or_default();

        debug!("Refreshed site settings: {}", settings.site_name);
        self.cache.store(settings).await;
        Ok(())
    }
}
