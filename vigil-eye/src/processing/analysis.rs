//! Frame analysis pipeline: decode, detect (with fallback), shape result

use crate::config::VisionConfig;
use crate::error::{Result, VisionError};
use crate::frame::{decode_frame, FrameInput};
use crate::models::ObjectDetector;
use crate::processing::detection::{detect_primary, Detection};
use crate::processing::edges::{detect_fallback, SCENE_LABELS};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    Error,
}

/// Which detector produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Primary,
    Fallback,
    Error,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Primary => "primary",
            DetectionMethod::Fallback => "fallback",
            DetectionMethod::Error => "error",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of analyzing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    pub detections: Vec<Detection>,
    pub count: usize,
    pub method: DetectionMethod,
    pub message: String,
    pub image_dimensions: Option<(u32, u32)>,
}

impl AnalysisResult {
    pub fn success(detections: Vec<Detection>, method: DetectionMethod, dimensions: (u32, u32)) -> Self {
        let count = detections.len();
        let mut message = format!("Found {} objects", count);
        if method == DetectionMethod::Fallback {
            message.push_str(" (fallback mode)");
        }

        Self {
            status: AnalysisStatus::Success,
            detections,
            count,
            method,
            message,
            image_dimensions: Some(dimensions),
        }
    }

    pub fn failed(err: impl fmt::Display) -> Self {
        Self {
            status: AnalysisStatus::Error,
            detections: Vec::new(),
            count: 0,
            method: DetectionMethod::Error,
            message: format!("Analysis failed: {}", err),
            image_dimensions: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }

    /// Display labels in detection order
    pub fn labels(&self) -> Vec<String> {
        self.detections.iter().map(Detection::display_label).collect()
    }

    /// `WxH` of the analyzed image
    pub fn image_size(&self) -> Option<String> {
        self.image_dimensions.map(|(w, h)| format!("{}x{}", w, h))
    }
}

/// How many class labels are echoed as `examples`
const CAPABILITY_EXAMPLES: usize = 10;

/// What the running analyzer can recognize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub detection_method: DetectionMethod,
    pub total_classes: usize,
    pub objects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Request-scoped analysis over an optional pretrained detector.
///
/// Built once at startup and shared read-only between requests. When the
/// detector is absent every request goes through the edge-density fallback.
///
/// At most `max_concurrent_inferences` primary inferences occupy blocking
/// threads at once. A permit is released only when the inference itself
/// returns, so a hung model cannot pile up parked threads.
pub struct FrameAnalyzer {
    detector: Option<Arc<dyn ObjectDetector>>,
    config: Arc<VisionConfig>,
    inference_slots: Arc<Semaphore>,
}

impl FrameAnalyzer {
    pub fn new(detector: Option<Arc<dyn ObjectDetector>>, config: VisionConfig) -> Self {
        let slots = config.max_concurrent_inferences.max(1);
        Self {
            detector,
            config: Arc::new(config),
            inference_slots: Arc::new(Semaphore::new(slots)),
        }
    }

    /// Analyzer that never attempts the pretrained path
    pub fn fallback_only(config: VisionConfig) -> Self {
        Self::new(None, config)
    }

    pub fn detector(&self) -> Option<&Arc<dyn ObjectDetector>> {
        self.detector.as_ref()
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Method requests are expected to use, barring runtime failures
    pub fn mode(&self) -> DetectionMethod {
        if self.has_detector() {
            DetectionMethod::Primary
        } else {
            DetectionMethod::Fallback
        }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        match &self.detector {
            Some(detector) => {
                let objects = detector.class_labels().to_vec();
                let examples = objects.iter().take(CAPABILITY_EXAMPLES).cloned().collect();
                Capabilities {
                    detection_method: DetectionMethod::Primary,
                    total_classes: objects.len(),
                    objects,
                    examples: Some(examples),
                    note: None,
                }
            }
            None => {
                let objects: Vec<String> = SCENE_LABELS.iter().map(|s| s.to_string()).collect();
                Capabilities {
                    detection_method: DetectionMethod::Fallback,
                    total_classes: objects.len(),
                    objects,
                    examples: None,
                    note: Some("Pretrained detector unavailable; scenes are classified by edge density".to_string()),
                }
            }
        }
    }

    /// Decode and analyze one frame. Never fails: terminal problems are
    /// reported as an error result.
    pub async fn analyze(&self, input: FrameInput) -> AnalysisResult {
        let max_payload = self.config.max_payload_bytes;
        let decoded = tokio::task::spawn_blocking(move || decode_frame(&input, max_payload))
            .await
            .map_err(|e| VisionError::Decode(format!("decoder panicked: {}", e)))
            .and_then(|r| r);

        let image = match decoded {
            Ok(image) => Arc::new(image),
            Err(e) => {
                debug!(error = %e, "Frame decode failed");
                return AnalysisResult::failed(&e);
            }
        };

        let dimensions = (image.width(), image.height());
        match self.run_detection(image).await {
            Ok((detections, method)) => AnalysisResult::success(detections, method, dimensions),
            Err(e) => {
                warn!(error = %e, "Frame analysis failed");
                AnalysisResult::failed(&e)
            }
        }
    }

    /// Primary detector when present, degrading to the fallback on any
    /// error, panic or timeout.
    async fn run_detection(&self, image: Arc<DynamicImage>) -> Result<(Vec<Detection>, DetectionMethod)> {
        if let Some(detector) = &self.detector {
            let detector = detector.clone();
            let frame = image.clone();
            let threshold = self.config.confidence_threshold;
            let limit = self.config.inference_timeout();
            let slots = self.inference_slots.clone();

            // Waiting for a slot counts against the same deadline
            let attempt = async move {
                let permit = slots
                    .acquire_owned()
                    .await
                    .map_err(|e| VisionError::Inference(format!("inference slots closed: {}", e)))?;
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    detect_primary(&frame, detector.as_ref(), threshold)
                })
                .await
                .map_err(|e| VisionError::Inference(format!("detector panicked: {}", e)))?
            };

            let failure = match tokio::time::timeout(limit, attempt).await {
                Ok(Ok(detections)) => return Ok((detections, DetectionMethod::Primary)),
                Ok(Err(e)) => e,
                Err(_) => VisionError::Timeout(limit),
            };

            warn!(error = %failure, "Primary detector failed, using edge-density fallback");
        }

        let detections = tokio::task::spawn_blocking(move || detect_fallback(&image))
            .await
            .map_err(|e| VisionError::Processing(format!("fallback detector panicked: {}", e)))?;

        Ok((detections, DetectionMethod::Fallback))
    }
}
