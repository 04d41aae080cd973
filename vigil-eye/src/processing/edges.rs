//! Edge-density fallback detector

use crate::processing::detection::Detection;
use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use tracing::debug;

pub const COMPLEX_SCENE: &str = "Complex Scene";
pub const OBJECTS_DETECTED: &str = "Objects Detected";
pub const SIMPLE_SCENE: &str = "Simple Scene";

/// Every label the fallback detector can produce, least to most busy
pub const SCENE_LABELS: &[&str] = &[SIMPLE_SCENE, OBJECTS_DETECTED, COMPLEX_SCENE];

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

const COMPLEX_EDGE_PIXELS: usize = 10_000;
const OBJECTS_EDGE_PIXELS: usize = 5_000;

/// Number of pixels Canny marks as edges
pub fn count_edge_pixels(gray: &GrayImage) -> usize {
    canny(gray, CANNY_LOW, CANNY_HIGH)
        .pixels()
        .filter(|p| p[0] > 0)
        .count()
}

/// Map an edge-pixel count to a scene label
pub fn classify_edge_density(edge_pixels: usize) -> &'static str {
    if edge_pixels > COMPLEX_EDGE_PIXELS {
        COMPLEX_SCENE
    } else if edge_pixels > OBJECTS_EDGE_PIXELS {
        OBJECTS_DETECTED
    } else {
        SIMPLE_SCENE
    }
}

/// Heuristic detection used when no pretrained model is available.
/// Always yields exactly one scene label.
pub fn detect_fallback(image: &DynamicImage) -> Vec<Detection> {
    let gray = image.to_luma8();
    let edge_pixels = count_edge_pixels(&gray);
    let label = classify_edge_density(edge_pixels);

    debug!(edge_pixels, label, "Edge-density fallback classification");
    vec![Detection::scene(label)]
}
