//! vigil-server: HTTP surface for still-frame object detection

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod upload;

pub use config::{ConfigError, ServerConfig};
pub use error::{ErrorResponse, ServerError};
pub use http::{create_router, AppState};
