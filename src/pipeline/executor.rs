//! Translation executor: drives chunks through a backend, strictly in order,
//! checkpointing after every one.
//!
//! Per chunk:
//!
//! ```text
//! prompt(text, context) ──▶ backend ──▶ strip_noise ──▶ hallucinated? ──yes──▶ once more, no context
//!                                                           │
//!                                                           ▼
//!                     force_terminology ──▶ [term fix] ──▶ + image tags ──▶ record + save + document
//! ```
//!
//! The continuity context is the tail of the previous chunk's translation,
//! which makes chunk `i` depend on chunk `i-1`. There is no concurrency
//! between chunks.
//!
//! After chunk `i` the checkpoint holds exactly chunks `0..=i`, and the
//! partial document on disk is their join. A run killed at any point resumes
//! from the first chunk without a checkpointed result.

use crate::config::TranslationConfig;
use crate::error::TranslateError;
use crate::model::{Chunk, ImagePlacement};
use crate::pipeline::backend::{GenerationParams, TranslationBackend};
use crate::pipeline::checkpoint::{write_document, CheckpointState, CheckpointStore};
use crate::pipeline::clean::{
    detect_hallucination, force_terminology, strip_noise, HallucinationRules, StripRules,
};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::{term_fix_prompt, translation_prompt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Sampling temperature for the term-restoration pass.
const TERM_FIX_TEMPERATURE: f32 = 0.1;

/// A term-fix result shorter than this fraction of its input is discarded.
const TERM_FIX_MIN_RATIO: f32 = 0.5;

/// Executor tuning, usually derived from [`TranslationConfig`].
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    pub term_fix: bool,
    pub term_fix_max_tokens: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub context_chars: usize,
    pub hallucination_ratio: f32,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&TranslationConfig::default())
    }
}

impl ExecutorOptions {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            term_fix: config.term_fix,
            term_fix_max_tokens: config.term_fix_max_tokens,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            context_chars: config.context_chars,
            hallucination_ratio: config.hallucination_ratio,
        }
    }
}

/// What a run did, beyond the document itself.
#[derive(Debug, Clone, Default)]
pub struct ExecutorReport {
    /// All chunk translations joined with the chunk separator.
    pub document: String,
    /// First chunk index sent to the backend.
    pub resumed_from: usize,
    pub translated_chunks: usize,
    pub hallucination_retries: usize,
    pub term_fix_discarded: usize,
}

/// Sequential, checkpointed translation of a chunk list.
pub struct Executor<'a, B: TranslationBackend> {
    backend: &'a B,
    store: CheckpointStore,
    output_path: PathBuf,
    options: ExecutorOptions,
    strip: StripRules,
    hallucination: HallucinationRules,
    progress: ProgressCallback,
}

impl<'a, B: TranslationBackend> Executor<'a, B> {
    /// `output_path` receives the partial document after every chunk.
    pub fn new(
        backend: &'a B,
        store: CheckpointStore,
        output_path: impl Into<PathBuf>,
        options: ExecutorOptions,
    ) -> Self {
        let hallucination = HallucinationRules::with_ratio(options.hallucination_ratio);
        Self {
            backend,
            store,
            output_path: output_path.into(),
            options,
            strip: StripRules::default(),
            hallucination,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        if let Some(cb) = progress {
            self.progress = cb;
        }
        self
    }

    pub fn with_strip_rules(mut self, rules: StripRules) -> Self {
        self.strip = rules;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Translate `chunks`, continuing from the checkpoint when `resume` is
    /// set and starting from scratch (checkpoint cleared) otherwise.
    pub async fn run(&self, chunks: &[Chunk], resume: bool) -> Result<ExecutorReport, TranslateError> {
        let total = chunks.len();
        let mut state = if resume {
            self.store.load(total)
        } else {
            self.store.clear()?;
            CheckpointState::default()
        };

        let start = state.next_index();
        let mut report = ExecutorReport {
            resumed_from: start,
            ..Default::default()
        };

        if start > 0 {
            info!("Resuming at chunk {}/{} ({} already translated)", start + 1, total, start);
        }
        info!("Translating {} chunk(s) with {}", total - start, self.backend.model_id());
        self.progress.on_run_start(total, start);

        let mut context = continuity_text(state.last_text());

        for (index, chunk) in chunks.iter().enumerate().skip(start) {
            let chunk_start = Instant::now();
            self.progress.on_chunk_start(index, total, chunk.word_count());

            let translated = self.translate_chunk(index, chunk, &context, &mut report).await?;
            let result = assemble(&translated, &chunk.image_placements());

            state.record(index, result.clone())?;
            self.store.save(&state, total)?;
            write_document(&self.output_path, &state.document())?;

            report.translated_chunks += 1;
            info!(
                "Chunk {}/{}: {} words → {} chars in {:.1?}",
                index + 1,
                total,
                chunk.word_count(),
                result.chars().count(),
                chunk_start.elapsed()
            );
            self.progress.on_chunk_complete(index, total, result.len());
            context = continuity_text(&translated);
        }

        if start >= total {
            // Nothing to translate; make sure the document reflects the checkpoint.
            write_document(&self.output_path, &state.document())?;
        }

        self.progress.on_run_complete(total, report.translated_chunks);
        report.document = state.document();
        Ok(report)
    }

    /// Translated text of one chunk, without its images.
    async fn translate_chunk(
        &self,
        index: usize,
        chunk: &Chunk,
        context: &str,
        report: &mut ExecutorReport,
    ) -> Result<String, TranslateError> {
        let text = chunk.prompt_text();
        if text.trim().is_empty() {
            debug!("Chunk {} has no text; skipping backend", index + 1);
            return Ok(String::new());
        }

        let params = GenerationParams {
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };
        let source_words = chunk.word_count();

        let prompt = translation_prompt(&text, context, self.options.context_chars);
        let mut translated = self.generate(index, &prompt, params).await?;

        if let Some(kind) = detect_hallucination(&translated, source_words, &self.hallucination) {
            warn!("Chunk {}: {kind} detected; retrying without context", index + 1);
            self.progress.on_chunk_retry(index, &format!("hallucination: {kind}"));
            report.hallucination_retries += 1;
            let prompt = translation_prompt(&text, "", self.options.context_chars);
            translated = self.generate(index, &prompt, params).await?;
            if let Some(kind) = detect_hallucination(&translated, source_words, &self.hallucination) {
                warn!("Chunk {}: retry still shows {kind}; accepting it", index + 1);
            }
        }

        let mut translated = force_terminology(translated.trim());

        if self.options.term_fix {
            match self.restore_terms(index, &text, &translated).await {
                Some(fixed) => translated = fixed,
                None => report.term_fix_discarded += 1,
            }
        }
        Ok(translated)
    }

    /// Second pass restoring technical terms. `None` keeps the input.
    async fn restore_terms(&self, index: usize, source: &str, translated: &str) -> Option<String> {
        let params = GenerationParams {
            max_tokens: self.options.term_fix_max_tokens,
            temperature: TERM_FIX_TEMPERATURE,
        };
        let prompt = term_fix_prompt(source, translated);
        let fixed = match self.generate(index, &prompt, params).await {
            Ok(fixed) => force_terminology(fixed.trim()),
            Err(e) => {
                warn!("Chunk {}: term fix failed, keeping translation: {e}", index + 1);
                return None;
            }
        };

        let before = translated.chars().count();
        let after = fixed.chars().count();
        if (after as f32) < before as f32 * TERM_FIX_MIN_RATIO {
            warn!(
                "Chunk {}: term fix returned {after} chars for {before}; discarded",
                index + 1
            );
            return None;
        }
        Some(fixed)
    }

    /// One backend call with transient-failure retries. Every response
    /// passes through noise stripping here and nowhere else.
    async fn generate(&self, index: usize, prompt: &str, params: GenerationParams) -> Result<String, TranslateError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.generate(prompt, params).await {
                Ok(raw) => return Ok(strip_noise(&raw, &self.strip)),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Chunk {}: attempt {}/{} failed: {e}; retrying in {:?}",
                        index + 1,
                        attempt,
                        max_attempts,
                        self.options.retry_backoff
                    );
                    self.progress.on_chunk_retry(index, &e.to_string());
                    sleep(self.options.retry_backoff).await;
                }
                Err(e) => {
                    return Err(TranslateError::GenerationFailed {
                        chunk: index,
                        attempts: attempt,
                        detail: e.to_string(),
                    })
                }
            }
        }
    }
}

/// A chunk's recorded result: translation first, then its images in
/// placement order.
///
/// Translated paragraphs do not map one-to-one onto source blocks, so images
/// are not spliced at their fraction; they follow the text.
fn assemble(translated: &str, images: &[ImagePlacement]) -> String {
    let translated = translated.trim();
    let mut parts: Vec<&str> = Vec::with_capacity(images.len() + 1);
    if !translated.is_empty() {
        parts.push(translated);
    }
    for image in images {
        debug!("Image {} placed at {:.2} of the chunk", image.tag, image.position_fraction);
        parts.push(&image.tag);
    }
    parts.join("\n\n")
}

/// Text usable as continuity context: image tag lines removed.
fn continuity_text(recorded: &str) -> String {
    recorded
        .lines()
        .filter(|l| !l.trim_start().starts_with("!["))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
