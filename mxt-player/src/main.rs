//! MixTube Player (mxt-player) - Main entry point
//!
//! Runs the playback host: queue, orchestrator, queue sharing and the HTTP/SSE
//! control surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mxt_player::api::{self, AppContext};
use mxt_player::config::PlayerConfig;
use mxt_player::media::{ClockedBackend, MediaBackend};
use mxt_player::provider::{CatalogProvider, VideoProvider, YoutubeClient};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the configuration file
const CONFIG_ENV_VAR: &str = "MXT_CONFIG";

/// Command-line arguments for mxt-player
#[derive(Parser, Debug)]
#[command(name = "mxt-player")]
#[command(about = "Collaborative video queue player host")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MXT_PORT")]
    port: Option<u16>,

    /// YouTube Data API key (overrides the config file)
    #[arg(long, env = "MXT_YOUTUBE_API_KEY")]
    youtube_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mxt_player=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = mxt_common::config::resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config = PlayerConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(key) = args.youtube_api_key {
        config.provider.youtube_api_key = Some(key);
    }

    info!("Starting MixTube player on port {}", config.port);

    let provider: Arc<dyn VideoProvider> = match &config.provider.youtube_api_key {
        Some(key) => {
            info!("Using the YouTube Data API");
            Arc::new(YoutubeClient::new(key.clone()).context("Failed to create YouTube client")?)
        }
        None => {
            info!(
                "No YouTube API key, serving {} catalogue videos",
                config.provider.catalog.len()
            );
            Arc::new(CatalogProvider::new(config.provider.catalog.clone()))
        }
    };

    let backend: Arc<dyn MediaBackend> = Arc::new(
        ClockedBackend::new(Duration::from_millis(config.media.load_latency_ms))
            .with_failing_ids(config.media.failing_ids.iter().cloned()),
    );

    let shutdown = CancellationToken::new();
    let ctx = AppContext::build(&config, provider, backend, shutdown.clone());
    let orchestrator = ctx.orchestrator.clone();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        server_shutdown.cancel();
    });

    let result = api::run(config.port, ctx, async move { shutdown.cancelled().await }).await;

    orchestrator.shutdown().await;
    result.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
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
