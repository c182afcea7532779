mod file_config;

pub use file_config::{BackgroundJobsConfig, FileConfig, ShutdownConfig, SslConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,

    // Feature configs (with defaults)
    pub lifecycle: LifecycleSettings,
    pub background_jobs: BackgroundJobsSettings,

    // SSL/TLS configuration
    pub ssl: Option<SslSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        // The database file is created on open, its directory must already exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }
        if db_path.is_dir() {
            bail!("db_path is a directory, expected a file: {:?}", db_path);
        }

        let bind_address = file
            .bind_address
            .or_else(|| cli.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let shutdown_file = file.shutdown.unwrap_or_default();
        let defaults = LifecycleSettings::default();
        let lifecycle = LifecycleSettings {
            listener_timeout: shutdown_file
                .listener_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.listener_timeout),
            scheduler_timeout: shutdown_file
                .scheduler_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.scheduler_timeout),
            scheduler_start_delay: shutdown_file
                .scheduler_start_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.scheduler_start_delay),
        };

        let jobs_file = file.background_jobs.unwrap_or_default();
        let defaults = BackgroundJobsSettings::default();
        let background_jobs = BackgroundJobsSettings {
            purge_temp_posts_interval_secs: jobs_file
                .purge_temp_posts_interval_secs
                .unwrap_or(defaults.purge_temp_posts_interval_secs),
            temp_post_max_age_secs: jobs_file
                .temp_post_max_age_secs
                .unwrap_or(defaults.temp_post_max_age_secs),
            expired_sessions_interval_secs: jobs_file
                .expired_sessions_interval_secs
                .unwrap_or(defaults.expired_sessions_interval_secs),
            notification_dispatch_interval_secs: jobs_file
                .notification_dispatch_interval_secs
                .unwrap_or(defaults.notification_dispatch_interval_secs),
            notification_batch_size: jobs_file
                .notification_batch_size
                .unwrap_or(defaults.notification_batch_size),
            site_settings_refresh_interval_secs: jobs_file
                .site_settings_refresh_interval_secs
                .unwrap_or(defaults.site_settings_refresh_interval_secs),
        };
        background_jobs.validate()?;

        // SSL settings - TOML [ssl] section takes precedence over CLI args
        let ssl = if let Some(ssl_file) = file.ssl {
            let cert_path = PathBuf::from(&ssl_file.cert_path);
            let key_path = PathBuf::from(&ssl_file.key_path);
            if !cert_path.exists() {
                bail!("SSL certificate file not found: {:?}", cert_path);
            }
            if !key_path.exists() {
                bail!("SSL key file not found: {:?}", key_path);
            }
            Some(SslSettings {
                cert_path,
                key_path,
            })
        } else if let (Some(cert), Some(key)) = (&cli.ssl_cert, &cli.ssl_key) {
            if !cert.exists() {
                bail!("SSL certificate file not found: {:?}", cert);
            }
            if !key.exists() {
                bail!("SSL key file not found: {:?}", key);
            }
            Some(SslSettings {
                cert_path: cert.clone(),
                key_path: key.clone(),
            })
        } else if cli.ssl_cert.is_some() || cli.ssl_key.is_some() {
            bail!("Both --ssl-cert and --ssl-key must be provided together");
        } else {
            None
        };

        Ok(Self {
            db_path,
            bind_address,
            port,
            logging_level,
            lifecycle,
            background_jobs,
            ssl,
        })
    }

    /// SQLite URI the store is opened with.
    pub fn database_dsn(&self) -> String {
        format!("file:{}?mode=rwc", self.db_path.display())
    }
}

/// Start-up and shutdown timing of the process lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Upper bound for draining the HTTP listeners.
    pub listener_timeout: Duration,
    /// Upper bound for the scheduled tasks to finish after the listeners.
    pub scheduler_timeout: Duration,
    /// Pause between the listeners coming up and the scheduler starting.
    pub scheduler_start_delay: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            listener_timeout: Duration::from_secs(10),
            scheduler_timeout: Duration::from_secs(10),
            scheduler_start_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJobsSettings {
    pub purge_temp_posts_interval_secs: u64,
    pub temp_post_max_age_secs: u64,
    pub expired_sessions_interval_secs: u64,
    pub notification_dispatch_interval_secs: u64,
    pub notification_batch_size: usize,
    pub site_settings_refresh_interval_secs: u64,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            purge_temp_posts_interval_secs: 60 * 60,
            temp_post_max_age_secs: 24 * 60 * 60,
            expired_sessions_interval_secs: 30 * 60,
            notification_dispatch_interval_secs: 10,
            notification_batch_size: 50,
            site_settings_refresh_interval_secs: 5 * 60,
        }
    }
}

impl BackgroundJobsSettings {
    /// A zero period would make a task loop spin without pause.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            (
                "purge_temp_posts_interval_secs",
                self.purge_temp_posts_interval_secs,
            ),
            (
                "expired_sessions_interval_secs",
                self.expired_sessions_interval_secs,
            ),
            (
                "notification_dispatch_interval_secs",
                self.notification_dispatch_interval_secs,
            ),
            (
                "site_settings_refresh_interval_secs",
                self.site_settings_refresh_interval_secs,
            ),
        ];
        for (name, value) in intervals {
            if value == 0 {
                bail!("background_jobs.{} must be greater than 0", name);
            }
        }
        if self.notification_batch_size == 0 {
            bail!("background_jobs.notification_batch_size must be greater than 0");
        }
        Ok(())
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli_with_db(temp_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_path: Some(temp_dir.path().join("forum.db")),
            port: 3001,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("HEADERS"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().join("forum.db")),
            bind_address: Some("0.0.0.0".to_string()),
            port: 8080,
            logging_level: RequestsLoggingLevel::Headers,
            ssl_cert: None,
            ssl_key: None,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("forum.db"));
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.lifecycle, LifecycleSettings::default());
        assert_eq!(config.background_jobs, BackgroundJobsSettings::default());
        assert!(config.ssl.is_none());
    }

    #[test]
    fn test_resolve_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_db(&temp_dir), None).unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.port, 3001);
        assert_eq!(config.lifecycle.listener_timeout, Duration::from_secs(10));
        assert_eq!(config.lifecycle.scheduler_timeout, Duration::from_secs(10));
        assert_eq!(
            config.lifecycle.scheduler_start_delay,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/should/be/overridden.db")),
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            ..Default::default()
        };

        let file_config = FileConfig {
            db_path: Some(
                temp_dir
                    .path()
                    .join("toml.db")
                    .to_string_lossy()
                    .to_string(),
            ),
            port: Some(4000),
            logging_level: Some("none".to_string()),
            shutdown: Some(ShutdownConfig {
                scheduler_timeout_secs: Some(3),
                ..Default::default()
            }),
            background_jobs: Some(BackgroundJobsConfig {
                notification_batch_size: Some(7),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("toml.db"));
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::None);
        assert_eq!(config.lifecycle.scheduler_timeout, Duration::from_secs(3));
        // Values the TOML doesn't specify keep their defaults
        assert_eq!(config.lifecycle.listener_timeout, Duration::from_secs(10));
        assert_eq!(config.background_jobs.notification_batch_size, 7);
        assert_eq!(config.background_jobs.temp_post_max_age_secs, 24 * 60 * 60);
    }

    #[test]
    fn test_resolve_missing_db_path_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_path must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_directory_error() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/nonexistent/path/forum.db")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_path_is_directory_error() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("is a directory"));
    }

    #[test]
    fn test_resolve_ssl_requires_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let cert = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            ssl_cert: Some(cert.path().to_path_buf()),
            ..cli_with_db(&temp_dir)
        };

        let result = AppConfig::resolve(&cli, None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be provided together"));
    }

    #[test]
    fn test_resolve_ssl_missing_file_error() {
        let temp_dir = TempDir::new().unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            ssl_cert: Some(PathBuf::from("/nonexistent/cert.pem")),
            ssl_key: Some(key.path().to_path_buf()),
            ..cli_with_db(&temp_dir)
        };

        let result = AppConfig::resolve(&cli, None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("SSL certificate file not found"));
    }

    #[test]
    fn test_resolve_ssl_from_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cert = tempfile::NamedTempFile::new().unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            port: 443,
            ssl_cert: Some(cert.path().to_path_buf()),
            ssl_key: Some(key.path().to_path_buf()),
            ..cli_with_db(&temp_dir)
        };

        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(
            config.ssl,
            Some(SslSettings {
                cert_path: cert.path().to_path_buf(),
                key_path: key.path().to_path_buf(),
            })
        );
        assert_eq!(config.port, 443);
    }

    #[test]
    fn test_database_dsn() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_db(&temp_dir), None).unwrap();

        let db_path = temp_dir.path().join("forum.db");
        assert_eq!(
            config.database_dsn(),
            format!("file:{}?mode=rwc", db_path.display())
        );
    }

    #[test]
    fn test_resolve_rejects_zero_job_interval() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            background_jobs: Some(BackgroundJobsConfig {
                expired_sessions_interval_secs: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = AppConfig::resolve(&cli_with_db(&temp_dir), Some(file_config)).unwrap_err();
        assert!(err
            .to_string()
            .contains("expired_sessions_interval_secs must be greater than 0"));
    }

    #[test]
    fn test_resolve_rejects_zero_notification_batch() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            background_jobs: Some(BackgroundJobsConfig {
                notification_batch_size: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = AppConfig::resolve(&cli_with_db(&temp_dir), Some(file_config)).unwrap_err();
        assert!(err
            .to_string()
            .contains("notification_batch_size must be greater than 0"));
    }

    #[test]
    fn test_default_job_settings_are_valid() {
        assert!(BackgroundJobsSettings::default().validate().is_ok());
    }
}
