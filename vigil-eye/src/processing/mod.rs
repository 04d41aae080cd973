//! Detection and frame analysis pipelines

pub mod analysis;
pub mod detection;
pub mod edges;

pub use analysis::{AnalysisResult, AnalysisStatus, Capabilities, DetectionMethod, FrameAnalyzer};
pub use detection::{detect_primary, Detection, NO_OBJECTS_LABEL};
pub use edges::{classify_edge_density, detect_fallback, SCENE_LABELS};
