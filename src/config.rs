//! Configuration types for a book translation run.
//!
//! All run behaviour is controlled through [`TranslationConfig`], built via
//! its [`TranslationConfigBuilder`]. The same struct drives the library entry
//! points and the CLI, so a run started from a script and one started by hand
//! with the same flags behave identically.

use crate::error::TranslateError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default model for both backends.
pub const DEFAULT_MODEL: &str = "aya-expanse:8b";

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Configuration for a PDF book translation run.
///
/// # Example
/// ```rust
/// use edgequake_pdf_translate::{BackendKind, PageRange, TranslationConfig};
///
/// let config = TranslationConfig::builder()
///     .pages(PageRange::new(50, Some(100)))
///     .chunk_words(400)
///     .backend(BackendKind::Ollama)
///     .resume(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_words, 400);
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Pages to translate (1-based, inclusive). Default: the whole book.
    pub pages: PageRange,

    /// Word threshold at which a chunk closes. Default: 600.
    ///
    /// Larger chunks give the model more context per call but raise the odds
    /// of a runaway generation; 400–600 words suits 8B-class local models.
    pub chunk_words: usize,

    /// Continue from the checkpoint instead of starting over. Default: false.
    pub resume: bool,

    /// Which backend performs generation. Default: [`BackendKind::Ollama`].
    pub backend: BackendKind,

    /// Model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// edgequake-llm provider used by [`BackendKind::Provider`]. Default: "ollama".
    pub provider_name: String,

    /// Base URL of the Ollama service. Default: [`DEFAULT_OLLAMA_URL`].
    pub ollama_url: String,

    /// Checkpoint file. If None, `.checkpoint.json` beside the output file.
    pub checkpoint_path: Option<PathBuf>,

    /// Run a second, narrower backend pass restoring mistranslated terms. Default: false.
    pub term_fix: bool,

    /// Write a `<stem>_glossary.md` table next to the output. Default: false.
    pub emit_glossary: bool,

    /// Title for the document header. If None, the input file stem.
    pub title: Option<String>,

    /// DPI used when rasterising image regions. Range 72–400. Default: 150.
    pub image_dpi: u32,

    /// Image regions narrower than this (points) are treated as decoration. Default: 60.
    pub min_image_width: f32,

    /// Image regions shorter than this (points) are treated as decoration. Default: 40.
    pub min_image_height: f32,

    /// Sampling temperature for translation calls. Default: 0.2.
    pub temperature: f32,

    /// Output token limit for a translation call. Default: 4096.
    pub max_tokens: usize,

    /// Output token limit for a term-restoration call. Default: 2048.
    pub term_fix_max_tokens: usize,

    /// Attempts per backend call when failures are transient. Default: 3.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds. Default: 3000.
    pub retry_backoff_ms: u64,

    /// Per-request HTTP timeout in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Characters of the previous chunk's translation passed as context. Default: 400.
    pub context_chars: usize,

    /// Output/source word ratio above which a translation counts as hallucinated. Default: 2.5.
    pub hallucination_ratio: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Receives per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            pages: PageRange::default(),
            chunk_words: 600,
            resume: false,
            backend: BackendKind::default(),
            model: None,
            provider_name: "ollama".to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            checkpoint_path: None,
            term_fix: false,
            emit_glossary: false,
            title: None,
            image_dpi: 150,
            min_image_width: 60.0,
            min_image_height: 40.0,
            temperature: 0.2,
            max_tokens: 4096,
            term_fix_max_tokens: 2048,
            max_attempts: 3,
            retry_backoff_ms: 3000,
            request_timeout_secs: 300,
            context_chars: 400,
            hallucination_ratio: 2.5,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("pages", &self.pages)
            .field("chunk_words", &self.chunk_words)
            .field("resume", &self.resume)
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("ollama_url", &self.ollama_url)
            .field("checkpoint_path", &self.checkpoint_path)
            .field("term_fix", &self.term_fix)
            .field("emit_glossary", &self.emit_glossary)
            .field("image_dpi", &self.image_dpi)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn TranslationProgressCallback>"),
            )
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model identifier in effect.
    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`TranslationConfig`].
#[derive(Debug)]
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl TranslationConfigBuilder {
    pub fn pages(mut self, pages: PageRange) -> Self {
        self.config.pages = pages;
        self
    }

    pub fn chunk_words(mut self, words: usize) -> Self {
        self.config.chunk_words = words;
        self
    }

    pub fn resume(mut self, v: bool) -> Self {
        self.config.resume = v;
        self
    }

    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.config.backend = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_path = Some(path.into());
        self
    }

    pub fn term_fix(mut self, v: bool) -> Self {
        self.config.term_fix = v;
        self
    }

    pub fn emit_glossary(mut self, v: bool) -> Self {
        self.config.emit_glossary = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn image_dpi(mut self, dpi: u32) -> Self {
        self.config.image_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn min_image_size(mut self, width: f32, height: f32) -> Self {
        self.config.min_image_width = width.max(0.0);
        self.config.min_image_height = height.max(0.0);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn term_fix_max_tokens(mut self, n: usize) -> Self {
        self.config.term_fix_max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn context_chars(mut self, n: usize) -> Self {
        self.config.context_chars = n;
        self
    }

    pub fn hallucination_ratio(mut self, ratio: f32) -> Self {
        self.config.hallucination_ratio = ratio;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslationConfig, TranslateError> {
        let c = &self.config;
        if c.chunk_words < 50 {
            return Err(TranslateError::InvalidConfig(format!(
                "chunk size must be at least 50 words, got {}",
                c.chunk_words
            )));
        }
        if c.pages.start == 0 {
            return Err(TranslateError::InvalidConfig(
                "pages are 1-based; start page must be ≥ 1".into(),
            ));
        }
        if let Some(end) = c.pages.end {
            if end < c.pages.start {
                return Err(TranslateError::InvalidConfig(format!(
                    "end page {} is before start page {}",
                    end, c.pages.start
                )));
            }
        }
        if c.hallucination_ratio.is_nan() || c.hallucination_ratio <= 1.0 {
            return Err(TranslateError::InvalidConfig(format!(
                "hallucination ratio must be > 1.0, got {}",
                c.hallucination_ratio
            )));
        }
        if c.max_tokens == 0 || c.term_fix_max_tokens == 0 {
            return Err(TranslateError::InvalidConfig(
                "token limits must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which generation backend a run uses.
///
/// Both produce the same contract (`prompt → raw text`); everything downstream
/// of the backend is identical, so switching only changes latency and the
/// model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// An edgequake-llm provider named by [`TranslationConfig::provider_name`],
    /// built once on first use and reused for every chunk.
    Provider,
    /// The Ollama HTTP API at [`TranslationConfig::ollama_url`]. (default)
    #[default]
    Ollama,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Provider => f.write_str("provider"),
            BackendKind::Ollama => f.write_str("ollama"),
        }
    }
}

/// 1-based inclusive page range; `end: None` means "to the last page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl Default for PageRange {
    fn default() -> Self {
        Self { start: 1, end: None }
    }
}

impl PageRange {
    pub fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// Clamp against the document, returning the inclusive `(start, end)` pair.
    ///
    /// An `end` past the last page is clamped; a `start` past it is an error.
    pub fn resolve(&self, total_pages: usize) -> Result<(usize, usize), TranslateError> {
        let start = self.start.max(1);
        if start > total_pages {
            return Err(TranslateError::PageOutOfRange {
                page: start,
                total: total_pages,
            });
        }
        let end = self.end.unwrap_or(total_pages).min(total_pages);
        if end < start {
            return Err(TranslateError::PageOutOfRange {
                page: start,
                total: total_pages,
            });
        }
        Ok((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = TranslationConfig::default();
        assert_eq!(c.chunk_words, 600);
        assert_eq!(c.context_chars, 400);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_backoff_ms, 3000);
        assert_eq!(c.model_id(), DEFAULT_MODEL);
        assert_eq!(c.backend, BackendKind::Ollama);
    }

    #[test]
    fn builder_rejects_tiny_chunks() {
        let err = TranslationConfig::builder().chunk_words(10).build().unwrap_err();
        assert!(err.to_string().contains("at least 50"));
    }

    #[test]
    fn builder_rejects_inverted_range() {
        let err = TranslationConfig::builder()
            .pages(PageRange::new(10, Some(5)))
            .build()
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_bad_hallucination_ratio() {
        for ratio in [1.0, 0.5, f32::NAN] {
            assert!(
                TranslationConfig::builder().hallucination_ratio(ratio).build().is_err(),
                "ratio {ratio} accepted"
            );
        }
        assert!(TranslationConfig::builder().hallucination_ratio(1.5).build().is_ok());
    }

    #[test]
    fn builder_clamps_dpi_and_trims_url() {
        let c = TranslationConfig::builder()
            .image_dpi(1000)
            .ollama_url("http://gpu-box:11434/")
            .build()
            .unwrap();
        assert_eq!(c.image_dpi, 400);
        assert_eq!(c.ollama_url, "http://gpu-box:11434");
    }

    #[test]
    fn page_range_resolution() {
        assert_eq!(PageRange::default().resolve(12).unwrap(), (1, 12));
        assert_eq!(PageRange::new(3, Some(99)).resolve(12).unwrap(), (3, 12));
        assert!(matches!(
            PageRange::new(13, None).resolve(12),
            Err(TranslateError::PageOutOfRange { page: 13, total: 12 })
        ));
    }
}
