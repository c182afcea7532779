use super::Program;
use crate::background_jobs::jobs::{register_default_jobs, LogNotificationSender};
use crate::background_jobs::JobScheduler;
use crate::config::AppConfig;
use crate::server::{make_app, HttpServer, ServerConfig};
use crate::site_settings::SiteSettingsCache;
use crate::store::{ForumStore, SqliteForumStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Open the store and wire every component of the server process.
///
/// `shutdown` is the parent of the scheduler's root token: cancelling it
/// cancels the invocation context of every scheduled task, including loops
/// left behind by a forced stop.
pub fn build_program(
    config: &AppConfig,
    shutdown: &CancellationToken,
) -> Result<Program<HttpServer>> {
    let dsn = config.database_dsn();
    info!("Opening forum database {}", dsn);
    let store: Arc<dyn ForumStore> = Arc::new(
        SqliteForumStore::open(&dsn)
            .with_context(|| format!("Failed to open database {:?}", config.db_path))?,
    );

    let settings_cache = Arc::new(SiteSettingsCache::new());

    let mut scheduler = JobScheduler::new(shutdown);
    register_default_jobs(
        &mut scheduler,
        &config.background_jobs,
        store.clone(),
        settings_cache.clone(),
        Arc::new(LogNotificationSender),
    )?;

    let server_config = ServerConfig::from_app_config(config);
    let app = make_app(server_config.clone(), store.clone(), settings_cache);
    let server = HttpServer::new(server_config, app);

    Program::with_components(server, scheduler, store, dsn, config.lifecycle.clone())
}
