use anyhow::{Context, Result};
use clap::Parser;
use forum_server::config::{AppConfig, CliConfig, FileConfig};
use forum_server::lifecycle::{build_program, os_signals, ShutdownOutcome};
use forum_server::server::{metrics, RequestsLoggingLevel};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite forum database file, created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The address to listen on.
    #[clap(long)]
    pub bind_address: Option<String>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// TLS certificate (PEM). Requires --ssl-key.
    #[clap(long, value_parser = parse_path)]
    pub ssl_cert: Option<PathBuf>,

    /// TLS private key (PEM). Requires --ssl-cert.
    #[clap(long, value_parser = parse_path)]
    pub ssl_key: Option<PathBuf>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_path: args.db_path.clone(),
            bind_address: args.bind_address.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            ssl_cert: args.ssl_cert.clone(),
            ssl_key: args.ssl_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let shutdown = CancellationToken::new();
    let mut program = build_program(&config, &shutdown)?;

    let (events_tx, events_rx) = mpsc::channel(8);
    let _signals = os_signals::spawn_signal_forwarder(events_tx)
        .context("Failed to install signal handlers")?;

    let outcome = program.serve(events_rx).await;
    // Reaches task invocations still running after a forced or failed run
    shutdown.cancel();

    match outcome? {
        ShutdownOutcome::Graceful => info!("Bye"),
        ShutdownOutcome::Forced => info!("Bye (forced)"),
    }
    Ok(())
}
