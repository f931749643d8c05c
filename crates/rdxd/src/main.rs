//! rdxd: rdx redaction daemon
//!
//! Usage:
//!   rdxd [--config /etc/rdx/config.toml] [--log info] [--log-format json|text]

mod api;
mod daemon;
mod metrics;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use rdx_core::config::RdxConfig;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rdxd", version, about = "rdx redaction daemon")]
struct Cli {
    /// Path to the rdx configuration file
    #[arg(
        long,
        short = 'c',
        env = "RDX_CONFIG",
        default_value = "/etc/rdx/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "RDX_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "RDX_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is not up yet, so a config problem is reported after init.
    let (config, config_note) = load_config(&cli.config).await;

    let level = cli.log.as_deref().unwrap_or(&config.daemon.log_level);
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.daemon.log_format == "text" {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    });
    init_logging(level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "rdxd starting"
    );
    let config = match config_note {
        ConfigNote::Loaded => config,
        ConfigNote::Missing => {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                cli.config.display()
            );
            config
        }
        ConfigNote::Invalid(e) => return Err(e),
    };

    daemon::run(config).await
}

enum ConfigNote {
    Loaded,
    Missing,
    Invalid(anyhow::Error),
}

async fn load_config(path: &Path) -> (RdxConfig, ConfigNote) {
    if !path.exists() {
        return (RdxConfig::default(), ConfigNote::Missing);
    }
    let parsed = match tokio::fs::read_to_string(path).await {
        Ok(content) => toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display())),
        Err(e) => Err(anyhow::anyhow!("reading config {}: {e}", path.display())),
    };
    match parsed {
        Ok(config) => (config, ConfigNote::Loaded),
        Err(e) => (RdxConfig::default(), ConfigNote::Invalid(e)),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
