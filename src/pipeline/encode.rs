//! Image encoding: scanned file → base64 PNG wrapped in `ImageData`.
//!
//! Scans arrive as PNG or JPEG in whatever colour mode the scanner chose.
//! Decoding and re-encoding every one as PNG gives the vision model a single
//! lossless format and surfaces corrupt files as [`PipelineError::ImageDecode`]
//! before any API call is made.

use crate::error::PipelineError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// File extensions accepted as scans (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `path` has one of [`IMAGE_EXTENSIONS`].
pub fn is_scan(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Decode a scan from disk and encode it for the vision API.
pub fn encode_file(path: &Path) -> Result<ImageData, PipelineError> {
    let img = image::open(path).map_err(|e| PipelineError::ImageDecode {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    encode_image(&img).map_err(|e| PipelineError::ImageDecode {
        path: path.to_path_buf(),
        detail: format!("PNG encoding failed: {e}"),
    })
}

/// Encode a decoded image as a base64 PNG.
///
/// `detail: "high"` keeps small print legible on GPT-4-class models, which
/// otherwise downscale to a single 512 px tile.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
