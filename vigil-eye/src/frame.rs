//! Frame input decoding

use crate::error::{Result, VisionError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;
use std::io::Cursor;

/// Marker separating a data-URL header from its payload
const DATA_URL_MARKER: &str = "base64,";

/// Images above this many pixels are refused before full decode
const MAX_PIXELS: u64 = 100_000_000;

/// Raw input for one analysis request
#[derive(Debug, Clone)]
pub enum FrameInput {
    /// Base64 text, optionally carrying a `data:<mime>;base64,` header
    Base64(String),
    /// Encoded image bytes from an upload
    Bytes(Vec<u8>),
}

/// Drop everything up to and including the first `base64,` marker.
/// Bare payloads are returned unchanged.
pub fn strip_data_url_prefix(payload: &str) -> &str {
    match payload.find(DATA_URL_MARKER) {
        Some(idx) => &payload[idx + DATA_URL_MARKER.len()..],
        None => payload,
    }
}

/// Decode a frame into pixels, enforcing the payload size cap
pub fn decode_frame(input: &FrameInput, max_payload_bytes: usize) -> Result<DynamicImage> {
    match input {
        FrameInput::Base64(text) => {
            // Line-wrapped (MIME style) payloads carry newlines inside the text
            let encoded: String = strip_data_url_prefix(text)
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            if encoded.is_empty() {
                return Err(VisionError::Decode("empty image payload".to_string()));
            }
            // 4 base64 chars carry 3 bytes
            if encoded.len() / 4 * 3 > max_payload_bytes {
                return Err(VisionError::Decode(format!(
                    "image payload too large (max {} bytes)",
                    max_payload_bytes
                )));
            }
            let bytes = STANDARD.decode(encoded.as_bytes())?;
            decode_image_bytes(&bytes, max_payload_bytes)
        }
        FrameInput::Bytes(bytes) => decode_image_bytes(bytes, max_payload_bytes),
    }
}

/// Decode encoded image bytes (PNG, JPEG, GIF, WebP, ...)
pub fn decode_image_bytes(bytes: &[u8], max_payload_bytes: usize) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(VisionError::Decode("empty image payload".to_string()));
    }

    if bytes.len() > max_payload_bytes {
        return Err(VisionError::Decode(format!(
            "image payload too large: {} bytes (max {} bytes)",
            bytes.len(),
            max_payload_bytes
        )));
    }

    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| VisionError::Decode(format!("cannot read image: {}", e)))?;

    if reader.format().is_none() {
        return Err(VisionError::Decode("unrecognized image format".to_string()));
    }

    // Check dimensions before allocating the full buffer
    let (width, height) = reader.into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(VisionError::Decode(format!("invalid image dimensions: {}x{}", width, height)));
    }
    if (width as u64).saturating_mul(height as u64) > MAX_PIXELS {
        return Err(VisionError::Decode(format!(
            "image too large: {}x{} pixels (max {})",
            width, height, MAX_PIXELS
        )));
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Map a decoded format guess to a file extension for persisted uploads
pub fn guess_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::WebP) => "webp",
        Ok(image::ImageFormat::Bmp) => "bmp",
        _ => "bin",
    }
}
