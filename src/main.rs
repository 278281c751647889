//! Sendfile proxy
//!
//! Sits in front of an application server and takes over responses the
//! application marks with a signal header.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ sendfile middleware ──▶ upstream application
//!                                        │
//!                          200 + X-Sendfile / send-data?
//!                                        │
//!                      ┌─────────────────┼──────────────────┐
//!                      ▼                 ▼                  ▼
//!                pass through     delivery::file      delivery::blob
//!                (unchanged)      (local disk)        (blob service)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use sendfile_proxy::config::validation::validate_config;
use sendfile_proxy::config::{load_config, ConfigError, ProxyConfig};
use sendfile_proxy::observability::{logging, metrics};
use sendfile_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "sendfile-proxy")]
#[command(about = "Reverse proxy serving X-Sendfile responses on behalf of an application", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn load(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    match &cli.config {
        Some(path) => load_config(path),
        None => {
            let config = ProxyConfig::default();
            validate_config(&config)?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sendfile-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        send_data_header = %config.sendfile.send_data_header,
        blob_backends = config.sendfile.blobs.len(),
        "Configuration loaded"
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
