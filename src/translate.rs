//! Top-level entry points: translate a PDF, or inspect one without a backend.
//!
//! [`translate`] is the whole pipeline end to end. It is resumable: the
//! checkpoint beside the output records every finished chunk, and a rerun
//! with `resume` enabled picks up at the first unfinished one.

use crate::config::{PageRange, TranslationConfig};
use crate::error::TranslateError;
use crate::glossary::build_glossary_note;
use crate::model::Chunk;
use crate::output::{BookInfo, TranslationOutput, TranslationStats};
use crate::pipeline::backend::{Backend, TranslationBackend};
use crate::pipeline::checkpoint::{write_document, CheckpointStore};
use crate::pipeline::chunk::chunk_blocks;
use crate::pipeline::executor::{Executor, ExecutorOptions};
use crate::pipeline::extract::{BlockExtractor, ExtractOptions, ImageMode};
use crate::pipeline::images::IMAGES_DIR;
use crate::pipeline::input::{default_title, validate_pdf};
use crate::pipeline::postprocess::annotate_terms;
use crate::pipeline::source::{bind_pdfium, DocumentSource, PdfiumSource};
use crate::prompts::document_header;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Pages covered by the [`inspect`] preview.
const PREVIEW_PAGES: usize = 5;

/// Blocks shown by the [`inspect`] preview.
const PREVIEW_BLOCKS: usize = 20;

/// Translate a PDF into a Ukrainian Markdown document at `output`.
///
/// Images are written to `images/` next to `output`. The checkpoint goes to
/// `config.checkpoint_path`, or `.checkpoint.json` next to `output`.
///
/// # Errors
/// Every error is fatal for the run. Chunks finished before the error stay
/// checkpointed; rerun with `resume` to continue.
pub async fn translate(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    let total_start = Instant::now();
    let output = output.as_ref().to_path_buf();
    let output_dir = output_dir(&output);

    // ── Step 1: Validate input ───────────────────────────────────────────
    let pdf_path = validate_pdf(input.as_ref())?;
    info!("Starting translation: {} → {}", pdf_path.display(), output.display());

    // ── Step 2: Backend ──────────────────────────────────────────────────
    // Checked before any page is read: a missing model should not cost an
    // extraction pass.
    let backend = Backend::from_config(config)?;
    backend.check_available().await?;

    // ── Step 3: Extract and chunk ────────────────────────────────────────
    let extract_start = Instant::now();
    let options = ExtractOptions {
        images: ImageMode::SaveTo(output_dir.join(IMAGES_DIR)),
        dpi: config.image_dpi,
        min_image_width: config.min_image_width,
        min_image_height: config.min_image_height,
        ..Default::default()
    };
    let extraction = extract_chunks(
        pdf_path.clone(),
        config.password.clone(),
        config.pages,
        config.chunk_words,
        options,
    )
    .await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Pages {}–{} of {}: {} blocks ({} images) in {} chunks, {}ms",
        extraction.start_page,
        extraction.end_page,
        extraction.total_pages,
        extraction.blocks,
        extraction.images,
        extraction.chunks.len(),
        extract_duration_ms
    );

    // ── Step 4: Translate ────────────────────────────────────────────────
    let translate_start = Instant::now();
    let store = match &config.checkpoint_path {
        Some(path) => CheckpointStore::new(path),
        None => CheckpointStore::in_dir(&output_dir),
    };
    debug!("Checkpoint: {}", store.path().display());
    let report = Executor::new(&backend, store, &output, ExecutorOptions::from_config(config))
        .with_progress(config.progress_callback.clone())
        .run(&extraction.chunks, config.resume)
        .await?;
    let translate_duration_ms = translate_start.elapsed().as_millis() as u64;

    // ── Step 5: Assemble and annotate ────────────────────────────────────
    let title = config.title.clone().unwrap_or_else(|| default_title(&pdf_path));
    let mut markdown = document_header(
        &title,
        extraction.start_page,
        extraction.end_page,
        extraction.total_pages,
    );
    markdown.push_str(&report.document);
    write_document(&output, &markdown)?;

    let (markdown, annotations) = annotate_terms(&markdown);
    write_document(&output, &markdown)?;
    info!("Annotated {} terms", annotations.len());

    // ── Step 6: Glossary ─────────────────────────────────────────────────
    let glossary_path = if config.emit_glossary {
        let path = glossary_path(&output);
        write_document(&path, &build_glossary_note())?;
        info!("Glossary written to {}", path.display());
        Some(path)
    } else {
        None
    };

    let stats = TranslationStats {
        total_pages: extraction.total_pages,
        start_page: extraction.start_page,
        end_page: extraction.end_page,
        blocks: extraction.blocks,
        images: extraction.images,
        chunks: extraction.chunks.len(),
        resumed_from: report.resumed_from,
        translated_chunks: report.translated_chunks,
        hallucination_retries: report.hallucination_retries,
        term_fix_discarded: report.term_fix_discarded,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        extract_duration_ms,
        translate_duration_ms,
    };
    info!(
        "Translation complete: {} chunks ({} this run), {}ms total",
        stats.chunks, stats.translated_chunks, stats.total_duration_ms
    );

    Ok(TranslationOutput {
        markdown,
        output_path: output,
        annotations,
        glossary_path,
        stats,
    })
}

/// Translate and return only the statistics.
pub async fn translate_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationStats, TranslateError> {
    translate(input, output, config).await.map(|o| o.stats)
}

/// Synchronous wrapper around [`translate`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranslateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(translate(input, output, config))
}

/// Page count, a text preview and size estimates, without any backend.
pub async fn inspect(input: impl AsRef<Path>, password: Option<&str>) -> Result<BookInfo, TranslateError> {
    let path = validate_pdf(input.as_ref())?;
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let source = PdfiumSource::open(&pdfium, &path, password.as_deref())?;
        let page_count = source.page_count();

        let preview = BlockExtractor::new(&source, 1, PREVIEW_PAGES, ExtractOptions::default())
            .take(PREVIEW_BLOCKS)
            .collect::<Result<Vec<_>, _>>()?;

        let mut total_words = 0usize;
        for block in BlockExtractor::new(&source, 1, page_count, ExtractOptions::default()) {
            total_words += block?.word_count();
        }
        let (est_input_tokens, est_output_tokens) = BookInfo::estimate_tokens(total_words);

        Ok(BookInfo {
            path,
            page_count,
            preview,
            total_words,
            est_input_tokens,
            est_output_tokens,
        })
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("inspect task panicked: {e}")))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Extraction {
    total_pages: usize,
    start_page: usize,
    end_page: usize,
    blocks: usize,
    images: usize,
    chunks: Vec<Chunk>,
}

/// Run extraction and chunking on the blocking pool; pdfium is not async-safe.
async fn extract_chunks(
    path: PathBuf,
    password: Option<String>,
    pages: PageRange,
    chunk_words: usize,
    options: ExtractOptions,
) -> Result<Extraction, TranslateError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let source = PdfiumSource::open(&pdfium, &path, password.as_deref())?;
        let total_pages = source.page_count();
        let (start_page, end_page) = pages.resolve(total_pages)?;

        let mut blocks = 0usize;
        let mut images = 0usize;
        let extractor = BlockExtractor::new(&source, start_page, end_page, options).inspect(|r| {
            if let Ok(block) = r {
                blocks += 1;
                if block.is_image() {
                    images += 1;
                }
            }
        });
        let chunks = chunk_blocks(extractor, chunk_words)?;

        Ok(Extraction {
            total_pages,
            start_page,
            end_page,
            blocks,
            images,
            chunks,
        })
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("extraction task panicked: {e}")))?
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `<dir>/<stem>_glossary.md` beside the output document.
fn glossary_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "translation".to_string());
    output_dir(output).join(format!("{stem}_glossary.md"))
}
