//! Podwave Narration Player (podwave-player) - Main entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use podwave_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podwave_player::api::{self, AppContext};
use podwave_player::audio::{AudioResource, DeviceResource, ResourceError, ResourceFactory};
use podwave_player::config::Args;
use podwave_player::source::{HttpNarrationSource, NarrationSource};
use podwave_player::PlaybackSession;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podwave_player=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.resolve().context("Failed to resolve configuration")?;

    info!(
        "Starting Podwave Player v{} ({}) on port {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.port
    );

    let source: Arc<dyn NarrationSource> = Arc::new(
        HttpNarrationSource::from_config(&config).context("Failed to create narration client")?,
    );

    // The output device is opened on the first play request
    let device_config = config.clone();
    let factory: ResourceFactory =
        Box::new(move || -> std::result::Result<Arc<dyn AudioResource>, ResourceError> {
            let resource = DeviceResource::open(&device_config)?;
            Ok(Arc::new(resource) as Arc<dyn AudioResource>)
        });

    let events = Arc::new(EventBus::new(config.event_capacity));
    let session = PlaybackSession::new(
        Arc::clone(&source),
        factory,
        events,
        config.default_playback_rate,
    );

    let background = CancellationToken::new();
    let ctx = AppContext {
        session: session.clone(),
        source,
        background: background.clone(),
    };

    let served = api::run(config.port, ctx, shutdown_signal()).await;

    background.cancel();
    session.shutdown().await;
    served.context("HTTP server failed")?;

    info!("Podwave Player stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
