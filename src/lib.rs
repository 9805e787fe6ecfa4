//! # edgequake-pdf-translate
//!
//! Translate technical PDF books into Ukrainian Markdown with a local LLM.
//!
//! ## Why this crate?
//!
//! A book is hundreds of pages and a local model translates a page in tens of
//! seconds, so a run takes hours and will be interrupted. This crate reads the
//! PDF's text layer into typed blocks (headings, paragraphs, code, captions,
//! figures), groups them into word-bounded chunks, and translates the chunks
//! one after another with a checkpoint after each. A killed run resumes at
//! the first unfinished chunk; the partial document on disk is always
//! readable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     check existence, permissions, %PDF magic
//!  ├─ 2. Extract   text runs → lines → typed Blocks; figures saved as PNG
//!  ├─ 3. Chunk     word-bounded Chunks starting at chapter headings
//!  ├─ 4. Translate one chunk at a time via Ollama or an edgequake-llm provider,
//!  │               noise stripping, hallucination retry, checkpoint
//!  ├─ 5. Annotate  English originals after first use of known terms
//!  └─ 6. Output    header + chunks joined by `---`, optional glossary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_translate::{translate, PageRange, TranslationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Ollama at http://localhost:11434 with aya-expanse:8b by default.
//!     let config = TranslationConfig::builder()
//!         .pages(PageRange::new(1, Some(40)))
//!         .resume(true)
//!         .build()?;
//!     let output = translate("book.pdf", "out/book_uk.md", &config).await?;
//!     eprintln!(
//!         "{} chunks, {} annotated terms",
//!         output.stats.chunks,
//!         output.annotations.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-translate` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf-translate = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod glossary;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BackendKind, PageRange, TranslationConfig, TranslationConfigBuilder};
pub use error::{BackendError, TranslateError};
pub use model::{Block, BlockKind, Chunk, ImagePlacement, Rect};
pub use output::{BookInfo, TranslationOutput, TranslationStats};
pub use pipeline::backend::{Backend, GenerationParams, TranslationBackend};
pub use pipeline::postprocess::annotate_terms;
pub use progress::{NoopProgressCallback, ProgressCallback, TranslationProgressCallback};
pub use translate::{inspect, translate, translate_sync, translate_to_file};
