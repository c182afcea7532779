//! Site-wide settings and their in-memory cache.
//!
//! The cache is an explicit component: whoever needs it gets an
//! `Arc<SiteSettingsCache>` handed over at construction time.

use crate::store::ForumStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: String,
    pub registration_open: bool,
    pub max_post_length: usize,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Forum".to_string(),
            site_description: String::new(),
            registration_open: true,
            max_post_length: 10_000,
        }
    }
}

/// Read-mostly cache of the current [`SiteSettings`].
#[derive(Debug, Default)]
pub struct SiteSettingsCache {
    current: RwLock<Option<SiteSettings>>,
}

impl SiteSettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached settings, if any.
    pub async fn get(&self) -> Option<SiteSettings> {
        self.current.read().await.clone()
    }

    pub async fn store(&self, settings: SiteSettings) {
        *self.current.write().await = Some(settings);
    }

    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    /// Cached settings, loading them from `store` on a miss.
    ///
    /// A store without saved settings yields the defaults, which are cached too.
    pub async fn get_or_load(&self, store: &dyn ForumStore) -> Result<SiteSettings> {
        if let Some(settings) = self.get().await {
            return Ok(settings);
        }

        let mut current = self.current.write().await;
        // Another writer may have filled the cache while we waited for the lock
        if let Some(settings) = current.as_ref() {
            return Ok(settings.clone());
        }

        debug!("Site settings cache miss, loading from store");
        let settings = store.load_site_settings()?.unwrap_or_default();
        *current = Some(settings.clone());
        Ok(settings)
    }
}
