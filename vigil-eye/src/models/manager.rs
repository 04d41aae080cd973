//! Model manager with auto-download functionality

use crate::config::VisionConfig;
use crate::error::VisionError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Largest model file accepted from a download
const MAX_MODEL_SIZE: usize = 2_000_000_000;

/// Anything smaller is treated as a truncated or error-page download
const MIN_MODEL_SIZE: usize = 1024;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Model manager for locating and downloading detector weights
pub struct ModelManager {
    config: Arc<VisionConfig>,
}

impl ModelManager {
    /// Create a new model manager
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self { config }
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_path = &self.config.model_path;
        if !model_path.exists() {
            fs::create_dir_all(model_path)?;
            info!("Created model directory: {:?}", model_path);
        }
        Ok(model_path.clone())
    }

    /// Locate the configured detector weights, downloading them when missing
    /// and `auto_download` is set.
    pub async fn resolve_detector_model(&self) -> Result<PathBuf, VisionError> {
        let path = self.config.model_file_path();
        if path.exists() {
            return Ok(path);
        }

        if !self.config.auto_download {
            return Err(VisionError::Model(format!(
                "Model file {:?} not found and auto-download is disabled",
                path
            )));
        }

        self.ensure_model(
            &self.config.model_file,
            &self.config.model_url,
            &self.config.model_checksum,
        )
        .await
    }

    /// Download model if not present
    pub async fn ensure_model(&self, model_name: &str, url: &str, checksum: &str) -> Result<PathBuf, VisionError> {
        if model_name.is_empty() || model_name.len() > 255 {
            return Err(VisionError::Model("Invalid model name".to_string()));
        }

        if model_name.contains("..") || model_name.contains('/') || model_name.contains('\\') {
            return Err(VisionError::Model("Model name contains invalid characters".to_string()));
        }

        if url.is_empty() || url.len() > 2048 {
            return Err(VisionError::Model("Invalid URL".to_string()));
        }

        if !url.starts_with("https://") {
            return Err(VisionError::Model("Only HTTPS URLs are allowed for model downloads".to_string()));
        }

        self.ensure_model_dir()?;

        let model_path = self.config.model_path.join(model_name);
        if !model_path.starts_with(&self.config.model_path) {
            return Err(VisionError::Model("Path traversal detected".to_string()));
        }

        if model_path.exists() {
            info!("Model {} already exists at {:?}", model_name, model_path);
            return Ok(model_path);
        }

        info!("Downloading model {} from {}", model_name, url);

        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VisionError::Model(format!("Failed to download model: HTTP {}", response.status())));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_MODEL_SIZE as u64 {
                return Err(VisionError::Model(format!(
                    "Model too large: {} bytes (max {} bytes)",
                    content_length, MAX_MODEL_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        verify_model_bytes(model_name, &bytes, checksum)?;

        // Temp file + rename: the final path only ever holds complete weights
        let temp_path = model_path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &model_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(VisionError::Io(e));
        }

        info!("Model {} saved to {:?}", model_name, model_path);
        Ok(model_path)
    }
}

/// Size and checksum checks on downloaded weights
fn verify_model_bytes(model_name: &str, bytes: &[u8], checksum: &str) -> Result<(), VisionError> {
    if bytes.len() > MAX_MODEL_SIZE {
        return Err(VisionError::Model(format!(
            "Downloaded model too large: {} bytes (max {} bytes)",
            bytes.len(),
            MAX_MODEL_SIZE
        )));
    }

    if bytes.len() < MIN_MODEL_SIZE {
        return Err(VisionError::Model("Downloaded file too small, likely corrupted".to_string()));
    }

    if checksum.is_empty() {
        info!("Downloaded {} bytes for model {} (checksum verification skipped)", bytes.len(), model_name);
        return Ok(());
    }

    let computed = hex::encode(Sha256::digest(bytes));
    if !computed.eq_ignore_ascii_case(checksum) {
        return Err(VisionError::Model(format!(
            "Checksum mismatch for model {}: expected {}, got {}",
            model_name, checksum, computed
        )));
    }

    info!("Verified checksum for model {}", model_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ModelManager {
        let config = VisionConfig {
            model_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        ModelManager::new(Arc::new(config))
    }

    #[tokio::test]
    async fn test_model_manager_ensure_model_dir() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("models");
        let config = VisionConfig {
            model_path: nested.clone(),
            ..Default::default()
        };
        let manager = ModelManager::new(Arc::new(config));

        assert_eq!(manager.ensure_model_dir().unwrap(), nested);
        assert!(nested.exists());
        // Idempotent
        assert!(manager.ensure_model_dir().is_ok());
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        assert!(manager.ensure_model("", "https://example.com/model.onnx", "").await.is_err());
        assert!(manager.ensure_model("../evil", "https://example.com/model.onnx", "").await.is_err());
        assert!(manager.ensure_model("model/name", "https://example.com/model.onnx", "").await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        assert!(manager.ensure_model("model.onnx", "", "").await.is_err());
        assert!(manager.ensure_model("model.onnx", "http://example.com/model.onnx", "").await.is_err());
        assert!(manager.ensure_model("model.onnx", "ftp://example.com/model.onnx", "").await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_model_existing_file_skips_download() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let existing = temp_dir.path().join("present.onnx");
        fs::write(&existing, b"weights").unwrap();

        // Unreachable host: would fail if a download were attempted
        let path = manager
            .ensure_model("present.onnx", "https://invalid.invalid/model.onnx", "")
            .await
            .unwrap();
        assert_eq!(path, existing);
    }

    #[tokio::test]
    async fn test_resolve_without_auto_download() {
        let temp_dir = TempDir::new().unwrap();
        let config = VisionConfig {
            model_path: temp_dir.path().to_path_buf(),
            auto_download: false,
            ..Default::default()
        };
        let manager = ModelManager::new(Arc::new(config));

        match manager.resolve_detector_model().await {
            Err(VisionError::Model(msg)) => assert!(msg.contains("auto-download is disabled")),
            other => panic!("Expected Model error, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_model_bytes() {
        let bytes = vec![7u8; 2048];
        assert!(verify_model_bytes("m", &bytes, "").is_ok());
        assert!(verify_model_bytes("m", &bytes[..10], "").is_err());

        let checksum = hex::encode(Sha256::digest(&bytes));
        assert!(verify_model_bytes("m", &bytes, &checksum).is_ok());
        assert!(verify_model_bytes("m", &bytes, &checksum.to_uppercase()).is_ok());
        assert!(verify_model_bytes("m", &bytes, "deadbeef").is_err());
    }
}
