//! filedock -- browser-facing file manager over an S3-compatible store.
//!
//! Startup validates configuration (fatal on error), provisions the bucket
//! (never fatal), then serves until SIGTERM/SIGINT.  Shutdown stops accepting
//! connections and waits up to `server.shutdown_timeout` seconds for
//! in-flight requests.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use filedock::config::{Config, LoggingConfig};
use filedock::gateway::{Gateway, GatewaySettings};
use filedock::storage::backend::ObjectStore;
use filedock::storage::memory::MemoryStore;
use filedock::storage::s3::S3Store;

/// Command-line arguments for the filedock server.
#[derive(Parser, Debug)]
#[command(
    name = "filedock",
    version,
    about = "File manager gateway for S3-compatible object stores"
)]
struct Cli {
    /// Path to the YAML configuration file. Without one, defaults plus
    /// `MINIO_*` environment variables are used.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => filedock::config::load_config(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides(|name| std::env::var(name).ok())?;

    init_tracing(&config.logging);
    if let Some(path) = cli.config.as_deref() {
        info!("Configuration loaded from {path}");
    }

    config.validate()?;

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        filedock::metrics::init_metrics();
        filedock::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let store: Arc<dyn ObjectStore> = match config.store.backend.as_str() {
        "memory" => {
            warn!("Using the in-memory store; objects are lost on restart");
            Arc::new(MemoryStore::new(
                &config.store.public_base_url(),
                &config.store.secret_key,
            ))
        }
        _ => {
            let endpoint_url = config.store.endpoint_url();
            let store = S3Store::new(
                &endpoint_url,
                &config.store.region,
                &config.store.access_key,
                &config.store.secret_key,
            );
            info!(
                "S3 store client initialized: endpoint={endpoint_url} bucket={}",
                config.store.bucket
            );
            Arc::new(store)
        }
    };

    let gateway = Gateway::new(
        store,
        GatewaySettings::from_config(&config.store, &config.uploads),
    );

    // Provisioning failures are logged, never fatal.
    let report = gateway.ensure_bucket().await;
    if !report.is_ready() {
        warn!("Bucket {} is not fully provisioned: {report:?}", gateway.bucket());
    }

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(filedock::AppState { config, gateway });
    let app = filedock::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("filedock listening on {bind_addr}");

    // On SIGTERM/SIGINT stop accepting connections, then give in-flight
    // requests `shutdown_timeout` to finish.
    let stopping = Arc::new(tokio::sync::Notify::new());
    let signal_stopping = stopping.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_stopping.notify_one();
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!("Shutdown timed out after {shutdown_timeout:?}; dropping in-flight requests");
        }
    }

    info!("filedock shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
