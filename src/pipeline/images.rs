//! Image blocks: size filter, PNG persistence and Markdown tag construction.
//!
//! Images never reach the translation backend. They are rasterised from the
//! page, written under `images/` next to the output document, and carried
//! through the pipeline as a ready-to-embed Markdown tag.
//!
//! PNG keeps line art and diagram text crisp; the alpha channel is dropped
//! because rendered page regions are always opaque.

use crate::error::TranslateError;
use crate::model::Rect;
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory, relative to the output document, that holds extracted images.
pub const IMAGES_DIR: &str = "images";

/// Whether a region is too small to be a figure (icons, bullets, rules).
pub fn is_decorative(region: &Rect, min_width: f32, min_height: f32) -> bool {
    region.width() < min_width || region.height() < min_height
}

/// `p<page:04>_img<seq:02>.png`
pub fn image_filename(page: usize, seq: usize) -> String {
    format!("p{page:04}_img{seq:02}.png")
}

/// Relative Markdown tag for an extracted image.
pub fn image_tag(page: usize, seq: usize) -> String {
    format!(
        "![Рисунок {page}-{seq}]({IMAGES_DIR}/{})",
        image_filename(page, seq)
    )
}

/// Encode `img` as an opaque PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Write `img` to `dir/<filename>`, creating `dir` if needed.
pub fn save_png(img: &DynamicImage, dir: &Path, filename: &str) -> Result<PathBuf, TranslateError> {
    let path = dir.join(filename);
    std::fs::create_dir_all(dir).map_err(|e| TranslateError::ImageWriteFailed {
        path: path.clone(),
        detail: e.to_string(),
    })?;

    let bytes = encode_png(img).map_err(|e| TranslateError::ImageWriteFailed {
        path: path.clone(),
        detail: e.to_string(),
    })?;
    std::fs::write(&path, &bytes).map_err(|e| TranslateError::ImageWriteFailed {
        path: path.clone(),
        detail: e.to_string(),
    })?;

    debug!(
        "Saved {}x{} image → {} ({} bytes)",
        img.width(),
        img.height(),
        path.display(),
        bytes.len()
    );
    Ok(path)
}
