//! LogHarbor log processor.
//!
//! Loads configuration, connects to the queue and index store, serves
//! viewers and health checks, and shuts down cleanly on SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use logharbor::adapters::{ElasticsearchIndexClient, RedisStreamsQueue};
use logharbor::application::{Pipeline, StartupError};
use logharbor::config::AppConfig;
use logharbor::logging::init_logging;

#[tokio::main]
async fn main() {
    let config = match AppConfig::load_validated() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    init_logging(&config.server.log_level, config.server.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Startup failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting log processor"
    );

    let queue = RedisStreamsQueue::connect(&config.queue.url)
        .await?
        .with_consumer(&config.queue.consumer_name);
    let index = Arc::new(ElasticsearchIndexClient::connect(&config.index).await?);

    let ws_listener = bind(config.server.ws_addr()?).await?;
    let health_listener = bind(config.server.health_addr()?).await?;

    let mut pipeline = Pipeline::start(&config, &queue, index).await?;
    pipeline.serve_viewers(ws_listener);
    pipeline.serve_health(health_listener);

    wait_for_shutdown().await;
    tracing::info!("Shutdown signal received");

    let report = pipeline.shutdown().await;
    tracing::info!(
        sessions_closed = report.sessions_closed,
        index_writes_abandoned = report.index_writes_abandoned,
        broadcasts = report.broadcasts,
        "Log processor stopped"
    );
    Ok(())
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
