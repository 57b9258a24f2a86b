//! commons-http demo server.
//!
//! Serves the cached client's state and cached upstream GETs through the
//! negotiated serializer.
//!
//! ```text
//! commons-http [--config commons.toml]
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use commons_http::config::{load_config, CommonsConfig};
use commons_http::http::HttpServer;
use commons_http::lifecycle::{wait_for_signal, Shutdown};
use commons_http::observability::{logging, metrics};

/// Environment variable consulted when `--config` is not given.
const CONFIG_ENV: &str = "COMMONS_HTTP_CONFIG";

#[derive(Parser)]
#[command(name = "commons-http", version, about = "Negotiating, caching HTTP commons demo server")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => CommonsConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "commons-http starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        bind_address = %config.server.bind_address,
        base_url = %config.client.base_url,
        cache_ttl_secs = config.cache.ttl_secs,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
