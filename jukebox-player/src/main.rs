//! Jukebox player - Main entry point
//!
//! Runs the multi-session playback scheduler behind its HTTP control surface,
//! with the library-folder resolver and the simulated audio sink.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_common::config::{load_config, resolve_library_root};
use jukebox_common::events::EventBus;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jukebox_player::api;
use jukebox_player::audio::SimulatedConnector;
use jukebox_player::config::PlayerConfig;
use jukebox_player::playback::SessionServices;
use jukebox_player::registry::SessionRegistry;
use jukebox_player::resolver::LibraryResolver;

/// Command-line arguments for jukebox-player
#[derive(Parser, Debug)]
#[command(name = "jukebox-player")]
#[command(about = "Multi-session jukebox playback scheduler")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "JUKEBOX_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long, env = "JUKEBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Folder searched for songs
    #[arg(short, long)]
    library_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "jukebox_player={level},jukebox_common={level},tower_http=info",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = PlayerConfig::from(&toml_config);
    if let Some(port) = args.port {
        config.port = port;
    }
    let library_root = resolve_library_root(args.library_root.as_deref(), &toml_config);

    info!(
        "Starting jukebox player v{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );
    info!("Library root: {}", library_root.display());
    if !library_root.is_dir() {
        info!("Library root does not exist yet; only URL requests will resolve");
    }

    let services = SessionServices {
        resolver: Arc::new(LibraryResolver::new(library_root)),
        connector: Arc::new(SimulatedConnector::new(config.sink)),
        events: Arc::new(EventBus::new(config.event_capacity)),
    };
    let registry = Arc::new(SessionRegistry::new(services, config.controller));

    let app = api::create_router(api::AppState {
        registry: Arc::clone(&registry),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    registry.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
