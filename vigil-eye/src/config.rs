//! Configuration for vigil-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the pretrained detector weights
pub const DEFAULT_MODEL_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.2.0/yolov8n.onnx";

/// Default file name under `model_path`
pub const DEFAULT_MODEL_FILE: &str = "yolov8n.onnx";

/// Vision system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Directory holding model weights
    pub model_path: PathBuf,
    /// File name of the detector weights inside `model_path`
    pub model_file: String,
    /// Where to fetch the weights from when they are missing
    pub model_url: String,
    /// Expected SHA-256 of the weights (hex). Empty skips verification.
    pub model_checksum: String,
    /// Download weights on startup if they are not on disk
    pub auto_download: bool,
    /// Detections must score strictly above this to be reported
    pub confidence_threshold: f32,
    /// Candidates below this score are dropped before NMS
    pub candidate_threshold: f32,
    /// IoU above which overlapping boxes of the same class are suppressed
    pub iou_threshold: f32,
    /// Upper bound on a single inference call, including the wait for a slot
    pub inference_timeout_ms: u64,
    /// Primary inferences allowed on blocking threads at once
    pub max_concurrent_inferences: usize,
    /// ONNX Runtime intra-op threads (0 = runtime default)
    pub intra_threads: usize,
    /// Register the CUDA execution provider when available
    pub use_cuda: bool,
    /// Largest accepted encoded image, in bytes
    pub max_payload_bytes: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".vigil");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models"));

        Self {
            model_path,
            model_file: DEFAULT_MODEL_FILE.to_string(),
            model_url: DEFAULT_MODEL_URL.to_string(),
            model_checksum: String::new(),
            auto_download: true,
            confidence_threshold: 0.5,
            candidate_threshold: 0.25,
            iou_threshold: 0.45,
            inference_timeout_ms: 30_000,
            max_concurrent_inferences: 1,
            intra_threads: 0,
            use_cuda: false,
            max_payload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl VisionConfig {
    /// Full path of the detector weights
    pub fn model_file_path(&self) -> PathBuf {
        self.model_path.join(&self.model_file)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold < 1.0) {
            return Err("Confidence threshold must be between 0 and 1 (exclusive)".to_string());
        }

        if !(self.candidate_threshold >= 0.0 && self.candidate_threshold <= self.confidence_threshold) {
            return Err("Candidate threshold must be between 0 and the confidence threshold".to_string());
        }

        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err("IoU threshold must be in (0, 1]".to_string());
        }

        if self.inference_timeout_ms == 0 {
            return Err("Inference timeout must be non-zero".to_string());
        }

        if self.max_concurrent_inferences == 0 || self.max_concurrent_inferences > 64 {
            return Err("Concurrent inference limit must be between 1 and 64".to_string());
        }

        if self.max_payload_bytes == 0 {
            return Err("Maximum payload size must be non-zero".to_string());
        }

        if self.model_file.is_empty()
            || self.model_file.contains("..")
            || self.model_file.contains('/')
            || self.model_file.contains('\\')
        {
            return Err("Model file must be a plain file name".to_string());
        }

        if self.intra_threads > 256 {
            return Err("Intra-op thread count too large (max 256)".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.model_file, "yolov8n.onnx");
        assert!(config.auto_download);
        assert!(!config.use_cuda);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_file_path() {
        let config = VisionConfig {
            model_path: PathBuf::from("/tmp/models"),
            ..Default::default()
        };
        assert_eq!(config.model_file_path(), PathBuf::from("/tmp/models/yolov8n.onnx"));
    }

    #[test]
    fn test_config_validation_threshold_bounds() {
        let mut config = VisionConfig::default();
        config.confidence_threshold = 0.0;
        assert!(config.validate().is_err());

        config.confidence_threshold = 1.0;
        assert!(config.validate().is_err());

        config.confidence_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_candidate_above_confidence() {
        let mut config = VisionConfig::default();
        config.candidate_threshold = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = VisionConfig::default();
        config.inference_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_inference_slots() {
        let mut config = VisionConfig::default();
        assert_eq!(config.max_concurrent_inferences, 1);

        config.max_concurrent_inferences = 0;
        assert!(config.validate().is_err());

        config.max_concurrent_inferences = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_model_file_traversal() {
        let mut config = VisionConfig::default();
        config.model_file = "../evil.onnx".to_string();
        assert!(config.validate().is_err());

        config.model_file = "nested/model.onnx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: VisionConfig = serde_json::from_str(r#"{"confidence_threshold": 0.7}"#).unwrap();
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.iou_threshold, 0.45);
    }
}
