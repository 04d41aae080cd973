//! Integration tests for the HTTP API

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use vigil_eye::error::Result as VisionResult;
use vigil_eye::{FrameAnalyzer, ObjectDetector, RawDetection, VisionConfig};
use vigil_server::{create_router, AppState, ServerConfig};

const BOUNDARY: &str = "vigil-test-boundary";

struct StubDetector {
    labels: Vec<String>,
    hits: Vec<RawDetection>,
}

impl ObjectDetector for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn infer(&self, _image: &DynamicImage) -> VisionResult<Vec<RawDetection>> {
        Ok(self.hits.clone())
    }
}

fn fallback_app(upload_dir: Option<PathBuf>) -> Router {
    let config = ServerConfig {
        upload_dir,
        ..Default::default()
    };
    let analyzer = Arc::new(FrameAnalyzer::fallback_only(config.vision.clone()));
    create_router(AppState::new(analyzer, config)).unwrap()
}

fn primary_app() -> Router {
    let labels: Vec<String> = (0..12).map(|i| format!("label{}", i)).collect();
    let detector: Arc<dyn ObjectDetector> = Arc::new(StubDetector {
        labels,
        hits: vec![RawDetection::new(0, 0.6), RawDetection::new(1, 0.3)],
    });
    let config = ServerConfig::default();
    let analyzer = Arc::new(FrameAnalyzer::new(Some(detector), VisionConfig::default()));
    create_router(AppState::new(analyzer, config)).unwrap()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/detect/")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_root_reports_ready() {
    let (status, body) = send(fallback_app(None), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "AI Assistant Backend Online");
    assert_eq!(body["status"], "ready");
    assert_eq!(body["detection_mode"], "fallback");
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(primary_app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["detector"], "stub");
}

#[tokio::test]
async fn test_ai_test_endpoint() {
    let (_, body) = send(fallback_app(None), get("/ai/test")).await;
    assert_eq!(body, json!({"response": "AI brain is working!", "status": "success"}));
}

#[tokio::test]
async fn test_status_in_fallback_mode() {
    let (status, body) = send(fallback_app(None), get("/ai/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["yolo_available"], false);
    assert_eq!(body["cuda_available"], false);
    assert_eq!(body["detection_classes"], 3);
    assert!(body["message"].as_str().unwrap().contains("fallback"));
}

#[tokio::test]
async fn test_capabilities_primary() {
    let (_, body) = send(primary_app(), get("/ai/capabilities")).await;
    let objects = body["objects"].as_array().unwrap();
    assert_eq!(body["detection_method"], "primary");
    assert_eq!(body["total_classes"].as_u64().unwrap() as usize, objects.len());
    assert_eq!(body["examples"].as_array().unwrap().len(), 10);
    assert!(body.get("note").is_none());
}

#[tokio::test]
async fn test_capabilities_fallback() {
    let (_, body) = send(fallback_app(None), get("/ai/capabilities")).await;
    assert_eq!(body["detection_method"], "fallback");
    assert_eq!(body["total_classes"], 3);
    assert_eq!(body["objects"], json!(["Simple Scene", "Objects Detected", "Complex Scene"]));
    assert!(body["note"].is_string());
}

#[tokio::test]
async fn test_analyze_frame_fallback() {
    let image = STANDARD.encode(png_bytes(120, 80));
    let (status, body) = send(fallback_app(None), post_json("/ai/analyze-frame", json!({ "image": image }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["objects"], json!(["Simple Scene"]));
    assert_eq!(body["object_count"], 1);
    assert_eq!(body["detection_method"], "fallback");
    assert_eq!(body["message"], "Found 1 objects (fallback mode)");
    assert_eq!(body["image_size"], "120x80");
}

#[tokio::test]
async fn test_analyze_frame_primary_filters_threshold() {
    let image = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(32, 32)));
    let (_, body) = send(primary_app(), post_json("/ai/analyze-frame", json!({ "image": image }))).await;

    assert_eq!(body["status"], "success");
    assert_eq!(body["detection_method"], "primary");
    assert_eq!(body["objects"], json!(["label0 (60.0%)"]));
    assert_eq!(body["object_count"], 1);
}

#[tokio::test]
async fn test_analyze_frame_invalid_base64_is_error_body() {
    let (status, body) = send(
        fallback_app(None),
        post_json("/ai/analyze-frame", json!({ "image": "@@not base64@@" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["objects"], json!([]));
    assert_eq!(body["object_count"], 0);
    assert_eq!(body["detection_method"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("Analysis failed: "));
    assert!(body.get("image_size").is_none());
}

#[tokio::test]
async fn test_analyze_frame_missing_field_is_error_body() {
    let (status, body) = send(fallback_app(None), post_json("/ai/analyze-frame", json!({ "frame": "abc" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("Analysis failed: "));
}

#[tokio::test]
async fn test_analyze_frame_non_json_is_error_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/ai/analyze-frame")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let (status, body) = send(fallback_app(None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_analyze_stream_not_implemented() {
    let (status, body) = send(fallback_app(None), post_json("/ai/analyze-stream", json!({ "anything": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_implemented");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_detect_upload_fallback() {
    let (status, body) = send(fallback_app(None), multipart("file", "frame.png", &png_bytes(40, 40))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "frame.png");
    assert_eq!(body["detection_method"], "fallback");
    let detections = body["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["class"], "Simple Scene");
    assert_eq!(detections[0]["confidence"], 1.0);
}

#[tokio::test]
async fn test_detect_persists_upload() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let dir = temp_dir.path().join("uploads");
    let bytes = png_bytes(16, 16);

    let (status, _) = send(fallback_app(Some(dir.clone())), multipart("file", "a.png", &bytes)).await;
    assert_eq!(status, StatusCode::OK);

    let stored: Vec<_> = std::fs::read_dir(&dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].extension().and_then(|e| e.to_str()), Some("png"));
    assert_eq!(std::fs::read(&stored[0]).unwrap(), bytes);
}

#[tokio::test]
async fn test_detect_missing_file_field() {
    let (status, body) = send(fallback_app(None), multipart("other", "a.png", &png_bytes(4, 4))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FILE");
}

#[tokio::test]
async fn test_detect_not_multipart() {
    let (status, body) = send(fallback_app(None), post_json("/detect/", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_MULTIPART");
}

#[tokio::test]
async fn test_detect_undecodable_image() {
    let (status, body) = send(fallback_app(None), multipart("file", "notes.txt", b"just some text")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "ANALYSIS_FAILED");
    assert!(body["error"].as_str().unwrap().starts_with("Analysis failed: "));
}

#[tokio::test]
async fn test_cors_allows_configured_origin_only() {
    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/ai/analyze-frame")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };

    let response = fallback_app(None).oneshot(preflight("http://localhost:3000")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let response = fallback_app(None).oneshot(preflight("http://evil.example")).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = fallback_app(None).oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
