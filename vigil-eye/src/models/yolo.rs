//! YOLO object detection model

use crate::error::{Result, VisionError};
use crate::models::{ObjectDetector, RawDetection};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info, warn};

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Letterbox padding value (114/255), the value YOLO models are trained with
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Maximum candidates entering NMS
const MAX_NMS_INPUTS: usize = 300;

/// Maximum anchors accepted from a model output
const MAX_ANCHORS: usize = 50_000;

/// Runtime options for the YOLO detector
#[derive(Debug, Clone)]
pub struct YoloOptions {
    /// Model input (width, height)
    pub input_size: (u32, u32),
    pub candidate_threshold: f32,
    pub iou_threshold: f32,
    pub intra_threads: usize,
    pub use_cuda: bool,
}

impl Default for YoloOptions {
    fn default() -> Self {
        Self {
            input_size: (640, 640),
            candidate_threshold: 0.25,
            iou_threshold: 0.45,
            intra_threads: 0,
            use_cuda: false,
        }
    }
}

impl From<&crate::config::VisionConfig> for YoloOptions {
    fn from(config: &crate::config::VisionConfig) -> Self {
        Self {
            candidate_threshold: config.candidate_threshold,
            iou_threshold: config.iou_threshold,
            intra_threads: config.intra_threads,
            use_cuda: config.use_cuda,
            ..Default::default()
        }
    }
}

/// Scored box in model input coordinates (x1, y1, x2, y2)
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    bbox: [f32; 4],
}

/// YOLO model for object detection
pub struct YoloDetector {
    session: Mutex<Session>,
    labels: Vec<String>,
    options: YoloOptions,
    accelerated: bool,
}

impl YoloDetector {
    /// Load a YOLO model from an ONNX file
    pub fn new(model_path: &Path, options: YoloOptions) -> Result<Self> {
        let mut builder = Session::builder()
            .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::Ort(format!("Failed to set optimization level: {}", e)))?;

        if options.intra_threads > 0 {
            builder = builder
                .with_intra_threads(options.intra_threads)
                .map_err(|e| VisionError::Ort(format!("Failed to set intra-op threads: {}", e)))?;
        }

        let mut accelerated = false;
        if options.use_cuda {
            let cuda = CUDAExecutionProvider::default();
            if cuda.is_available().unwrap_or(false) {
                builder = builder
                    .with_execution_providers([cuda.build()])
                    .map_err(|e| VisionError::Ort(format!("Failed to register CUDA provider: {}", e)))?;
                accelerated = true;
            } else {
                warn!("CUDA requested but not available, running YOLO on CPU");
            }
        }

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| VisionError::Ort(format!("Failed to load YOLO model: {}", e)))?;

        let declared = session.outputs.first().and_then(|output| match &output.output_type {
            ValueType::Tensor { shape, .. } => class_count_from_shape(shape),
            _ => None,
        });
        let class_count = declared.unwrap_or_else(|| {
            debug!("YOLO output shape is dynamic, assuming {} classes", COCO_CLASSES.len());
            COCO_CLASSES.len()
        });

        info!("YOLO model loaded from {:?} ({} classes)", model_path, class_count);

        Ok(Self {
            session: Mutex::new(session),
            labels: class_labels_for(class_count),
            options,
            accelerated,
        })
    }

    /// Preprocess image into a [1, 3, H, W] tensor with letterbox padding
    fn preprocess(&self, image: &DynamicImage) -> Result<Array4<f32>> {
        let (input_w, input_h) = self.options.input_size;
        let (orig_w, orig_h) = (image.width(), image.height());
        if orig_w == 0 || orig_h == 0 {
            return Err(VisionError::Processing(format!(
                "Invalid image dimensions: {}x{}",
                orig_w, orig_h
            )));
        }

        let scale = (input_w as f32 / orig_w as f32).min(input_h as f32 / orig_h as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, input_w);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, input_h);

        let rgb = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();
        let offset_x = ((input_w - new_w) / 2) as usize;
        let offset_y = ((input_h - new_h) / 2) as usize;

        let mut tensor =
            Array4::<f32>::from_elem((1, 3, input_h as usize, input_w as usize), PAD_VALUE);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (tx, ty) = (offset_x + x as usize, offset_y + y as usize);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Run the session and return (anchors, features, data) in anchor-major order
    fn run_inference(&self, input: Array4<f32>) -> Result<(usize, usize, Vec<f32>)> {
        let input = Tensor::from_array(input)
            .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::Inference(format!("YOLO inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;

        debug!("YOLO output shape: {:?}", shape);

        // [1, 4 + C, N] or [1, N, 4 + C]
        if shape.len() != 3 || shape.iter().any(|&d| d <= 0) {
            return Err(VisionError::Inference(format!(
                "Unexpected YOLO output shape: {:?}",
                shape
            )));
        }

        let (dim1, dim2) = (shape[1] as usize, shape[2] as usize);
        let features_first = dim1 < dim2;
        let (anchors, features) = if features_first { (dim2, dim1) } else { (dim1, dim2) };

        if features < 5 || anchors > MAX_ANCHORS {
            return Err(VisionError::Inference(format!(
                "Unsupported YOLO output: {} anchors x {} features",
                anchors, features
            )));
        }

        let data = if features_first {
            let mut transposed = vec![0.0f32; anchors * features];
            for f in 0..features {
                for a in 0..anchors {
                    transposed[a * features + f] = data[f * anchors + a];
                }
            }
            transposed
        } else {
            data.to_vec()
        };

        Ok((anchors, features, data))
    }

    /// Turn raw rows into scored candidates, then suppress overlaps
    fn postprocess(&self, anchors: usize, features: usize, data: &[f32]) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for row in data.chunks_exact(features).take(anchors) {
            let (class_id, confidence) = row[4..]
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, score)| score.is_finite())
                .fold((0usize, f32::MIN), |best, (id, score)| {
                    if score > best.1 { (id, score) } else { best }
                });

            if confidence <= self.options.candidate_threshold {
                continue;
            }

            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
                continue;
            }

            candidates.push(Candidate {
                class_id,
                confidence: confidence.clamp(0.0, 1.0),
                bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            });
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(MAX_NMS_INPUTS);

        apply_nms(candidates, self.options.iou_threshold)
    }
}

impl ObjectDetector for YoloDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn accelerated(&self) -> bool {
        self.accelerated
    }

    fn infer(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        debug!("Running YOLO detection on {}x{} image", image.width(), image.height());

        let input = self.preprocess(image)?;
        let (anchors, features, data) = self.run_inference(input)?;
        let kept = self.postprocess(anchors, features, &data);

        debug!("YOLO detected {} objects", kept.len());
        Ok(kept
            .into_iter()
            .map(|c| RawDetection::new(c.class_id, c.confidence))
            .collect())
    }
}

/// Greedy per-class Non-Maximum Suppression. Input must be sorted by
/// descending confidence.
fn apply_nms(candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    let mut keep: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let overlaps = keep.iter().any(|k| {
            k.class_id == candidate.class_id && compute_iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }

    keep
}

/// IoU between two (x1, y1, x2, y2) boxes
fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;

    if union <= 0.0 || !union.is_finite() {
        return 0.0;
    }
    (inter / union).clamp(0.0, 1.0)
}

/// Class count declared by a `[1, 4 + C, N]` or `[1, N, 4 + C]` output.
/// `None` when the shape is dynamic or not a detection head.
fn class_count_from_shape(shape: &[i64]) -> Option<usize> {
    if shape.len() != 3 || shape[1] <= 0 || shape[2] <= 0 {
        return None;
    }
    let features = shape[1].min(shape[2]) as usize;
    (features > 4).then(|| features - 4)
}

/// COCO names for the first 80 ids, `class_<id>` beyond
fn class_labels_for(count: usize) -> Vec<String> {
    (0..count)
        .map(|id| match COCO_CLASSES.get(id) {
            Some(name) => name.to_string(),
            None => format!("class_{}", id),
        })
        .collect()
}
