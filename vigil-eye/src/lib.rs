//! vigil-eye: still-frame object detection
//!
//! Decodes camera frames, runs them through a pretrained ONNX detector and
//! degrades to an edge-density scene heuristic when the detector cannot be
//! loaded or fails at runtime.

pub mod config;
pub mod error;
pub mod frame;
pub mod models;
pub mod processing;

pub use config::VisionConfig;
pub use error::VisionError;
pub use frame::{decode_frame, strip_data_url_prefix, FrameInput};
pub use models::{initialize_detector, ObjectDetector, RawDetection};
pub use processing::{AnalysisResult, AnalysisStatus, Capabilities, Detection, DetectionMethod, FrameAnalyzer};
