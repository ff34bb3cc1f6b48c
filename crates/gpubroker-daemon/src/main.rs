//! gpubroker daemon
//!
//! Owns the GPU pool, serves the HTTP API and runs the lease sweeper.

use anyhow::Context;
use clap::Parser;
use gpubroker_api::{create_router, serve};
use gpubroker_core::{BrokerConfig, LoggingConfig};
use gpubroker_pool::{spawn_sweeper, ResourcePool, SWEEP_INTERVAL};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// gpubrokerd - GPU lease broker for remote streaming sessions
#[derive(Parser, Debug)]
#[command(name = "gpubrokerd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the API server
    #[arg(long)]
    port: Option<u16>,

    /// Number of GPUs in the pool
    #[arg(long)]
    gpu_count: Option<u32>,

    /// Streaming port of the first GPU
    #[arg(long)]
    base_port: Option<u16>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (text or json)
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    fn apply(self, config: &mut BrokerConfig) {
        if let Some(address) = self.address {
            config.api.address = address;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(gpu_count) = self.gpu_count {
            config.pool.gpu_count = gpu_count;
        }
        if let Some(base_port) = self.base_port {
            config.pool.base_port = base_port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BrokerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.logging)?;

    info!("Starting gpubroker daemon v{}", env!("CARGO_PKG_VERSION"));

    let pool = Arc::new(ResourcePool::from_config(&config.pool));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(Arc::clone(&pool), SWEEP_INTERVAL, shutdown_rx);

    let router = create_router(pool, &config.api);

    let addr = resolve_listen_addr(&config.api.address, config.api.port).await?;

    info!(
        gpus = config.pool.gpu_count,
        base_port = config.pool.base_port,
        "Serving GPU pool"
    );

    let served = serve(addr, router, shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        error!(error = %e, "Sweeper task failed");
    }

    served.context("API server failed")?;
    info!("gpubroker daemon stopped");
    Ok(())
}

/// Accepts IPv4 and IPv6 literals (`0.0.0.0`, `::`) and host names
async fn resolve_listen_addr(address: &str, port: u16) -> anyhow::Result<SocketAddr> {
    if let Ok(ip) = address.trim_matches(&['[', ']'][..]).parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    tokio::net::lookup_host((address, port))
        .await
        .with_context(|| format!("Invalid listen address {}", address))?
        .next()
        .with_context(|| format!("Listen address {} did not resolve", address))
}

/// `RUST_LOG` wins over the configured level when set
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level {:?}", config.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
