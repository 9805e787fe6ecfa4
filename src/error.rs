//! Error types for the edgequake-pdf-translate library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TranslateError`] — **Fatal**: the run cannot proceed (unreadable PDF,
//!   backend unreachable, a chunk that kept failing after every retry).
//!   Returned as `Err(TranslateError)` from the top-level `translate*`
//!   functions. Chunks completed before the failure stay checkpointed, so a
//!   fatal error mid-run is always resumable.
//!
//! * [`BackendError`] — the outcome of a *single* generation call. It is
//!   either [`BackendError::Transient`] (network hiccup, timeout, 5xx) which
//!   the executor retries with a fixed backoff, or [`BackendError::Fatal`]
//!   which is never retried. Only the executor decides what a transient
//!   failure means for the run.
//!
//! Translation *quality* problems (hallucinated sections, runaway length) are
//! not errors at all: the executor retries once and accepts what it gets.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf-translate library.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The requested page range does not intersect the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error while reading a page.
    #[error("Failed to read page {page}: {detail}")]
    PageReadFailed { page: usize, detail: String },

    /// pdfium returned an error while rasterising an image region.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Backend setup errors ──────────────────────────────────────────────
    /// The local inference service did not answer.
    #[error("Backend '{backend}' is not reachable at {url}.\n{hint}")]
    BackendUnreachable {
        backend: String,
        url: String,
        hint: String,
    },

    /// The service answered, but the requested model is not installed.
    #[error("Model '{model}' is not available.\nPull it first: ollama pull {model}")]
    ModelMissing { model: String },

    /// The edgequake-llm provider could not be constructed.
    #[error("LLM provider '{provider}' failed to load.\n{hint}")]
    ProviderLoadFailed { provider: String, hint: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// A chunk could not be translated after every permitted attempt.
    ///
    /// `chunk` is the 0-based index; the message counts from 1 like the logs.
    /// All chunks before it are checkpointed; rerun with resume enabled to
    /// continue from this chunk.
    #[error("Chunk {} failed after {attempts} attempt(s): {detail}\nRerun with --resume to continue from this chunk.", .chunk + 1)]
    GenerationFailed {
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    // ── Persistence errors ────────────────────────────────────────────────
    /// The checkpoint could not be written.
    #[error("Failed to write checkpoint '{path}': {source}")]
    CheckpointWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chunk result arrived out of order.
    #[error("Checkpoint out of order: expected chunk {expected}, got {got}")]
    CheckpointOrder { expected: usize, got: usize },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not save an extracted image.
    #[error("Failed to save image '{path}': {detail}")]
    ImageWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of one failed backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Worth retrying: connection refused, timeout, 5xx.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Retrying will not help: bad request, malformed response, load failure.
    #[error("backend failure: {0}")]
    Fatal(String),
}

impl BackendError {
    /// Whether the executor may retry the call.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failed_mentions_resume() {
        let e = TranslateError::GenerationFailed {
            chunk: 7,
            attempts: 3,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Chunk 8 failed"), "got: {msg}");
        assert!(msg.contains("--resume"), "got: {msg}");
    }

    #[test]
    fn model_missing_suggests_pull() {
        let e = TranslateError::ModelMissing {
            model: "aya-expanse:8b".into(),
        };
        assert!(e.to_string().contains("ollama pull aya-expanse:8b"));
    }

    #[test]
    fn transient_classification() {
        assert!(BackendError::Transient("timeout".into()).is_transient());
        assert!(!BackendError::Fatal("HTTP 400".into()).is_transient());
    }

    #[test]
    fn page_out_of_range_display() {
        let e = TranslateError::PageOutOfRange { page: 40, total: 12 };
        assert!(e.to_string().contains("Page 40"));
        assert!(e.to_string().contains("12 pages"));
    }
}
