//! Process wiring: configuration, manager, key listener and HTTP server.
//!
//! ```text
//!   stdin ──> KeyListener ──┐
//!                           ├──> events ──> EndpointManager ──> SubscriberRegistry ──> websockets
//!                           │
//!   HTTP /endpoints, /websocketRegistration/{id}, /metrics, /health
//! ```
//!
//! Shutdown (Ctrl-C or the quit key) stops the HTTP server, then drops the
//! inbound event sender so the router and every processor drain and exit.

use crate::app::{self, AppState};
use crate::config::{AppConfig, ConfigError};
use crate::keyboard::KeyListener;
use crate::metrics;
use crate::websocket::SubscriberRegistry;
use clap::Parser;
use endpoint_core::{EndpointManager, ManagerConfig, StartupBarrier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "endpoint-visualiser")]
#[command(about = "Simulated network endpoints driven from the keyboard, streamed over websockets")]
pub struct Cli {
    /// Path to the JSON configuration
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3031")]
    pub port: u16,

    /// Maximum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Do not read key presses from stdin
    #[arg(long)]
    pub no_keyboard: bool,
}

#[derive(Debug)]
pub enum ServerError {
    Config(ConfigError),
    Io(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "Server I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub async fn run(cli: Cli) -> Result<(), ServerError> {
    let config = AppConfig::load(&cli.config)?;
    info!(
        path = %cli.config.display(),
        endpoints = config.endpoints.len(),
        profiles = config.key_profiles.len(),
        "Configuration loaded"
    );
    metrics::init();

    let manager_config = ManagerConfig::default();
    let (events, inbound) = manager_config.event_channel();
    let subscribers = SubscriberRegistry::new();
    let shutdown = CancellationToken::new();
    let barrier = StartupBarrier::new();

    let manager = EndpointManager::new(
        config.endpoints.clone(),
        Arc::new(subscribers.clone()),
        manager_config,
    );
    let manager_handle = manager.start(inbound, &barrier);

    let key_listener = if cli.no_keyboard {
        info!("Key listener disabled");
        None
    } else {
        let listener = KeyListener::new(config.key_map(), events.clone());
        Some(listener.start(tokio::io::stdin(), shutdown.clone(), &barrier))
    };

    barrier.wait().await;

    let state = AppState::new(config.endpoints, subscribers, manager_handle.stats());
    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "Endpoint visualiser listening");
    info!("  GET /endpoints                  - Endpoint discovery");
    info!("  GET /websocketRegistration/{{id}} - Subscribe to an endpoint");
    info!("  GET /metrics                    - Prometheus metrics");
    info!("  GET /health                     - Health check");

    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    info!("Shutting down, draining endpoint processors");
    shutdown.cancel();
    if let Some(handle) = key_listener {
        match handle.await {
            Ok(exit) => info!(exit = ?exit, "Key listener stopped"),
            Err(e) => warn!(error = %e, "Key listener task failed"),
        }
    }
    drop(events);
    manager_handle.join().await;

    info!("All endpoints stopped. Goodbye.");
    Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Received Ctrl-C");
            shutdown.cancel();
        }
    }
}
