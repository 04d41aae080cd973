//! Pretrained detector path: threshold filtering and labeling

use crate::error::Result;
use crate::models::ObjectDetector;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label reported when nothing clears the confidence threshold
pub const NO_OBJECTS_LABEL: &str = "No objects detected";

/// A labeled detection as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// Set when the label came from the detector's class table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<usize>,
}

impl Detection {
    /// Detection of a known model class
    pub fn object(class_id: usize, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            class_id: Some(class_id),
        }
    }

    /// Whole-scene label with no model class behind it
    pub fn scene(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            confidence: 1.0,
            class_id: None,
        }
    }

    /// Sentinel standing in for an empty result
    pub fn nothing_detected() -> Self {
        Self::scene(NO_OBJECTS_LABEL)
    }

    /// Human-readable label, e.g. `person (87.3%)`
    pub fn display_label(&self) -> String {
        match self.class_id {
            Some(_) => format!("{} ({:.1}%)", self.label, self.confidence * 100.0),
            None => self.label.clone(),
        }
    }
}

/// Run the pretrained detector and keep detections scoring strictly above
/// `threshold`. Never returns an empty vector on success.
pub fn detect_primary(
    image: &DynamicImage,
    detector: &dyn ObjectDetector,
    threshold: f32,
) -> Result<Vec<Detection>> {
    let raw = detector.infer(image)?;
    let total = raw.len();

    let mut detections: Vec<Detection> = raw
        .into_iter()
        .filter(|d| d.confidence.is_finite() && d.confidence > threshold)
        .map(|d| {
            let label = detector
                .label_for(d.class_id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("class_{}", d.class_id));
            Detection::object(d.class_id, label, d.confidence.min(1.0))
        })
        .collect();

    debug!(
        detector = detector.name(),
        raw = total,
        kept = detections.len(),
        threshold,
        "Filtered primary detections"
    );

    if detections.is_empty() {
        detections.push(Detection::nothing_detected());
    }

    Ok(detections)
}
