//! Vision model management and inference

pub mod manager;
pub mod yolo;

pub use manager::ModelManager;
pub use yolo::{YoloDetector, YoloOptions, COCO_CLASSES};

use crate::error::Result;
use image::DynamicImage;

/// One scored class hit reported by a detector. Box geometry is not kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(class_id: usize, confidence: f32) -> Self {
        Self { class_id, confidence }
    }
}

/// A loaded object detector.
///
/// Implementations are shared across requests behind an `Arc` and must be
/// safe to call from several blocking threads at once.
pub trait ObjectDetector: Send + Sync {
    /// Short identifier reported by the status endpoints
    fn name(&self) -> &str;

    /// Class-id to label table
    fn class_labels(&self) -> &[String];

    /// Run forward inference over a decoded image
    fn infer(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;

    /// Whether inference runs on an accelerator
    fn accelerated(&self) -> bool {
        false
    }

    /// Label for a class id, if the id is known
    fn label_for(&self, class_id: usize) -> Option<&str> {
        self.class_labels().get(class_id).map(String::as_str)
    }
}

/// Resolve (or download) the configured weights and open the pretrained
/// detector. Called once at startup; callers treat failure as fallback mode.
pub async fn initialize_detector(
    config: &crate::config::VisionConfig,
) -> Result<std::sync::Arc<dyn ObjectDetector>> {
    let manager = ModelManager::new(std::sync::Arc::new(config.clone()));
    let path = manager.resolve_detector_model().await?;
    let options = YoloOptions::from(config);

    // Session construction parses the whole graph
    let detector = tokio::task::spawn_blocking(move || YoloDetector::new(&path, options))
        .await
        .map_err(|e| crate::error::VisionError::Model(format!("detector initialization panicked: {}", e)))??;

    tracing::info!(
        detector = detector.name(),
        classes = detector.class_labels().len(),
        accelerated = detector.accelerated(),
        "Pretrained detector ready"
    );
    Ok(std::sync::Arc::new(detector))
}
