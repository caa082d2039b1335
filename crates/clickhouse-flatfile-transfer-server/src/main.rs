//! HTTP API server for ClickHouse <-> flat file transfers.

mod config;
mod error;
mod handlers;
mod models;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

use config::ServerConfig;
use handlers::{router, AppState};

#[derive(Parser)]
#[command(name = "clickhouse-flatfile-transfer-server")]
#[command(about = "HTTP API for ClickHouse <-> flat file transfers")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, e.g. 0.0.0.0:5000
    #[arg(long)]
    bind: Option<String>,

    /// Directory flat-file sources are resolved against
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory ingestion output files are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = ServerConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    let bind = config.bind.clone();
    let app = router(AppState {
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Server listening on {bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
