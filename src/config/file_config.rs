use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    // Feature configs
    pub ssl: Option<SslConfig>,
    pub shutdown: Option<ShutdownConfig>,
    pub background_jobs: Option<BackgroundJobsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SslConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ShutdownConfig {
    pub listener_timeout_secs: Option<u64>,
    pub scheduler_timeout_secs: Option<u64>,
    pub scheduler_start_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub purge_temp_posts_interval_secs: Option<u64>,
    pub temp_post_max_age_secs: Option<u64>,
    pub expired_sessions_interval_secs: Option<u64>,
    pub notification_dispatch_interval_secs: Option<u64>,
    pub notification_batch_size: Option<usize>,
    pub site_settings_refresh_interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
