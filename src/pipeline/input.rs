//! Input validation: confirm a user-supplied path is a readable PDF.
//!
//! pdfium reports a missing file, a permission problem and a non-PDF all as
//! the same opaque load failure. Checking the path and the `%PDF` magic bytes
//! first turns those into actionable errors before any pdfium call, and
//! before a backend health check that may take seconds.

use crate::error::TranslateError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate `path` as a local PDF and return it as an owned path.
pub fn validate_pdf(path: impl AsRef<Path>) -> Result<PathBuf, TranslateError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(TranslateError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                Ok(()) => return Err(TranslateError::NotAPdf { path, magic }),
                // Shorter than the magic itself: cannot be a PDF.
                Err(_) => return Err(TranslateError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TranslateError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(TranslateError::FileNotFound { path });
        }
    }

    debug!("Validated local PDF: {}", path.display());
    Ok(path)
}

/// File stem of the input, used as the default document title.
pub fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Translation".to_string())
}
