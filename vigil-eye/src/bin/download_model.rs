//! Fetch detector weights ahead of time so the server starts without a download

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vigil_eye::config::VisionConfig;
use vigil_eye::models::{ModelManager, ObjectDetector, YoloDetector, YoloOptions};

#[derive(Parser)]
#[command(name = "download_model")]
#[command(about = "Download the pretrained detector weights", version)]
struct Args {
    /// Directory to store the weights in
    #[arg(long, env = "VIGIL_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// File name inside the model directory
    #[arg(long)]
    model_file: Option<String>,

    /// HTTPS URL of the ONNX weights
    #[arg(long)]
    url: Option<String>,

    /// Expected SHA-256 (hex)
    #[arg(long)]
    checksum: Option<String>,

    /// Open an inference session on the downloaded file
    #[arg(long)]
    verify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let mut config = VisionConfig::default();
    if let Some(path) = args.model_path {
        config.model_path = path;
    }
    if let Some(file) = args.model_file {
        config.model_file = file;
    }
    if let Some(url) = args.url {
        config.model_url = url;
    }
    if let Some(checksum) = args.checksum {
        config.model_checksum = checksum;
    }
    config.auto_download = true;
    config.validate().map_err(anyhow::Error::msg).context("invalid model settings")?;

    let manager = ModelManager::new(Arc::new(config.clone()));
    let path = manager
        .resolve_detector_model()
        .await
        .with_context(|| format!("failed to fetch {}", config.model_url))?;
    println!("Model available at: {}", path.display());

    if args.verify {
        let detector = YoloDetector::new(&path, YoloOptions::from(&config))
            .with_context(|| format!("failed to load {}", path.display()))?;
        println!(
            "Loaded {} ({} classes, accelerated: {})",
            detector.name(),
            detector.class_labels().len(),
            detector.accelerated()
        );
    }

    Ok(())
}
