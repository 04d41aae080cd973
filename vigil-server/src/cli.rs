//! Command-line interface for the server binary

use crate::config::ServerConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vigil-server")]
#[command(about = "Still-frame object detection over HTTP", version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "VIGIL_HOST")]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long, env = "VIGIL_PORT")]
    pub port: Option<u16>,

    /// Directory holding detector weights
    #[arg(long, env = "VIGIL_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Browser origin allowed by CORS
    #[arg(long, env = "VIGIL_CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Keep a copy of every `/detect/` upload here
    #[arg(long, env = "VIGIL_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Skip loading the pretrained detector
    #[arg(long, env = "VIGIL_NO_DETECTOR")]
    pub no_detector: bool,

    /// Log filter, e.g. `info` or `vigil_eye=debug`
    #[arg(long, env = "VIGIL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "VIGIL_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    /// Overlay explicitly given flags on a loaded configuration
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = &self.model_path {
            config.vision.model_path = path.clone();
        }
        if let Some(origin) = &self.cors_origin {
            config.cors_origin = origin.clone();
        }
        if let Some(dir) = &self.upload_dir {
            config.upload_dir = Some(dir.clone());
        }
        if self.no_detector {
            config.enable_detector = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.log_json {
            config.log_json = true;
        }
    }
}
