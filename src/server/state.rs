use axum::extract::FromRef;

use crate::site_settings::SiteSettingsCache;
use crate::store::ForumStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedForumStore = Arc<dyn ForumStore>;
pub type GuardedSiteSettingsCache = Arc<SiteSettingsCache>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedForumStore,
    pub settings_cache: GuardedSiteSettingsCache,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        store: GuardedForumStore,
        settings_cache: GuardedSiteSettingsCache,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            store,
            settings_cache,
        }
    }
}

impl FromRef<ServerState> for GuardedForumStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedSiteSettingsCache {
    fn from_ref(input: &ServerState) -> Self {
        input.settings_cache.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
