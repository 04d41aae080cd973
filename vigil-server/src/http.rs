// HTTP server with the frame analysis API routes

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::upload::persist_upload;
use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::HeaderValue,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use vigil_eye::processing::{AnalysisResult, AnalysisStatus, DetectionMethod, FrameAnalyzer};
use vigil_eye::{FrameInput, ObjectDetector};

const SERVICE_NAME: &str = "vigil";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multipart field carrying the image on `/detect/`
const UPLOAD_FIELD: &str = "file";

// API state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<FrameAnalyzer>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(analyzer: Arc<FrameAnalyzer>, config: ServerConfig) -> Self {
        Self {
            analyzer,
            config: Arc::new(config),
        }
    }
}

// Request/response types

#[derive(Debug, Deserialize)]
pub struct AnalyzeFrameRequest {
    /// Base64 image, optionally with a `data:<mime>;base64,` header
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeFrameResponse {
    pub status: AnalysisStatus,
    pub objects: Vec<String>,
    pub object_count: usize,
    pub detection_method: DetectionMethod,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

impl From<AnalysisResult> for AnalyzeFrameResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            objects: result.labels(),
            image_size: result.image_size(),
            status: result.status,
            object_count: result.count,
            detection_method: result.method,
            message: result.message,
        }
    }
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
    status: &'static str,
    detection_mode: DetectionMethod,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    detector: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    service: &'static str,
    version: &'static str,
    inference_backend: &'static str,
    image_backend: &'static str,
    cuda_available: bool,
    yolo_available: bool,
    detection_classes: usize,
    message: String,
}

#[derive(Debug, Serialize)]
struct TestResponse {
    response: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct NotImplementedResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectEntry {
    pub class: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub filename: String,
    pub detections: Vec<DetectEntry>,
    pub detection_method: DetectionMethod,
}

/// Create HTTP router with all API routes
pub fn create_router(state: AppState) -> Result<Router, ServerError> {
    let cors = cors_layer(&state.config.cors_origin)?;
    let body_limit = state.config.body_limit();

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ai/status", get(status_handler))
        .route("/ai/test", get(test_handler))
        .route("/ai/capabilities", get(capabilities_handler))
        .route("/ai/analyze-frame", post(analyze_frame_handler))
        .route("/ai/analyze-stream", post(analyze_stream_handler))
        .route("/detect/", post(detect_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(router)
}

/// Single-origin CORS with credentials; methods and headers echo the preflight
fn cors_layer(origin: &str) -> Result<CorsLayer, ServerError> {
    let origin = HeaderValue::from_str(origin).map_err(|e| ServerError::Cors(format!("{:?}: {}", origin, e)))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(RootResponse {
        message: "AI Assistant Backend Online",
        status: "ready",
        detection_mode: state.analyzer.mode(),
    })
}

/// Health check endpoint
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let detector = match state.analyzer.detector() {
        Some(detector) => detector.name().to_string(),
        None => "edge-density".to_string(),
    };

    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        detector,
    })
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let analyzer = &state.analyzer;
    let detector = analyzer.detector();
    let message = if detector.is_some() {
        "AI systems operational".to_string()
    } else {
        "AI systems operational (fallback mode)".to_string()
    };

    Json(StatusResponse {
        service: SERVICE_NAME,
        version: VERSION,
        inference_backend: if detector.is_some() { "onnxruntime" } else { "none" },
        image_backend: "image+imageproc",
        cuda_available: detector.map(|d| d.accelerated()).unwrap_or(false),
        yolo_available: detector.is_some(),
        detection_classes: analyzer.capabilities().total_classes,
        message,
    })
}

async fn test_handler() -> impl IntoResponse {
    Json(TestResponse {
        response: "AI brain is working!",
        status: "success",
    })
}

async fn capabilities_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.analyzer.capabilities())
}

/// Analyze one base64 frame. Always answers 200; failures are reported in
/// the body with `status: "error"`.
async fn analyze_frame_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeFrameRequest>, JsonRejection>,
) -> Json<AnalyzeFrameResponse> {
    let result = match payload {
        Ok(Json(request)) => state.analyzer.analyze(FrameInput::Base64(request.image)).await,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected analyze-frame body");
            AnalysisResult::failed(format!("invalid request body: {}", rejection.body_text()))
        }
    };

    info!(
        status = ?result.status,
        method = %result.method,
        count = result.count,
        "Analyzed frame"
    );
    Json(result.into())
}

async fn analyze_stream_handler() -> impl IntoResponse {
    Json(NotImplementedResponse {
        status: "not_implemented",
        message: "Stream analysis is not supported; send individual frames to /ai/analyze-frame",
    })
}

/// Multipart upload variant of frame analysis
async fn detect_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ServerError> {
    let mut multipart = multipart.map_err(|e| ServerError::Multipart(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::Multipart(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| ServerError::Multipart(e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or(ServerError::MissingField(UPLOAD_FIELD))?;

    if let Some(dir) = &state.config.upload_dir {
        if let Err(e) = persist_upload(dir, &bytes).await {
            warn!(error = %e, dir = %dir.display(), "Failed to store upload");
        }
    }

    let result = state.analyzer.analyze(FrameInput::Bytes(bytes.to_vec())).await;
    if !result.is_success() {
        return Err(ServerError::Analysis(result.message));
    }

    info!(filename = %filename, method = %result.method, count = result.count, "Analyzed upload");

    Ok(Json(DetectResponse {
        filename,
        detection_method: result.method,
        detections: result
            .detections
            .into_iter()
            .map(|d| DetectEntry {
                class: d.label,
                confidence: d.confidence,
            })
            .collect(),
    }))
}
