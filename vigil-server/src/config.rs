//! Server configuration: TOML file with CLI/env overrides on top

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use vigil_eye::VisionConfig;

pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Extra room on top of the decoded payload cap for base64 and JSON framing
const BODY_LIMIT_HEADROOM: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The single browser origin allowed to call the API
    pub cors_origin: String,
    /// Where `/detect/` uploads are kept. Unset disables persistence.
    pub upload_dir: Option<PathBuf>,
    /// Try to load the pretrained detector at startup
    pub enable_detector: bool,
    pub log_level: String,
    pub log_json: bool,
    pub vision: VisionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            upload_dir: None,
            enable_detector: true,
            log_level: "info".to_string(),
            log_json: false,
            vision: VisionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("Host must not be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::Validation("Port must be non-zero".to_string()));
        }

        if !(self.cors_origin.starts_with("http://") || self.cors_origin.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "CORS origin must be an http(s) origin, got {:?}",
                self.cors_origin
            )));
        }
        if HeaderValue::from_str(&self.cors_origin).is_err() {
            return Err(ConfigError::Validation(format!(
                "CORS origin {:?} is not a valid header value",
                self.cors_origin
            )));
        }

        self.vision.validate().map_err(ConfigError::Validation)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Largest accepted request body, sized for a base64 frame at the payload cap
    pub fn body_limit(&self) -> usize {
        self.vision
            .max_payload_bytes
            .saturating_add(2)
            .saturating_div(3)
            .saturating_mul(4)
            .saturating_add(BODY_LIMIT_HEADROOM)
    }
}
