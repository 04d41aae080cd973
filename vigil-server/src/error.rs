//! HTTP-facing errors for the upload endpoint

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid multipart request: {0}")]
    Multipart(String),

    #[error("Missing multipart field '{0}'")]
    MissingField(&'static str),

    #[error("{0}")]
    Analysis(String),

    #[error("Invalid CORS origin: {0}")]
    Cors(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Multipart(_) | ServerError::MissingField(_) => StatusCode::BAD_REQUEST,
            ServerError::Analysis(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Cors(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Multipart(_) => "INVALID_MULTIPART",
            ServerError::MissingField(_) => "MISSING_FILE",
            ServerError::Analysis(_) => "ANALYSIS_FAILED",
            ServerError::Cors(_) => "INVALID_CONFIGURATION",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });
        (status, body).into_response()
    }
}
