// Vigil - still-frame object detection service
// Loads the detector if it can, otherwise serves the edge-density fallback

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil_eye::{initialize_detector, FrameAnalyzer, ObjectDetector};
use vigil_server::cli::Cli;
use vigil_server::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_logging(&config, cli.log_level.is_some());

    info!("🚀 Starting Vigil v{}...", env!("CARGO_PKG_VERSION"));

    let detector = if config.enable_detector {
        info!("🧠 Loading pretrained detector...");
        match initialize_detector(&config.vision).await {
            Ok(detector) => {
                info!("✅ Detector ready: {}", detector.name());
                Some(detector)
            }
            Err(e) => {
                warn!("⚠️  Pretrained detector unavailable: {}. Using edge-density fallback.", e);
                None
            }
        }
    } else {
        info!("ℹ️  Pretrained detector disabled, using edge-density fallback");
        None
    };

    let analyzer = Arc::new(FrameAnalyzer::new(detector, config.vision.clone()));
    let addr = config.bind_addr();
    let origin = config.cors_origin.clone();
    let app = create_router(AppState::new(analyzer, config))?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("✅ HTTP server listening on http://{} (CORS origin {})", listener.local_addr()?, origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("HTTP server failed")?;

    info!("👋 Vigil stopped. Goodbye!");
    Ok(())
}

/// `--log-level` wins over `RUST_LOG`, which wins over the config file
fn init_logging(config: &ServerConfig, level_from_cli: bool) {
    let from_env = if level_from_cli {
        None
    } else {
        EnvFilter::try_from_default_env().ok()
    };
    let filter = from_env
        .or_else(|| EnvFilter::try_new(&config.log_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for shutdown signal
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("🛑 Shutdown signal received");
}
