//! Pipeline stages for PDF-to-Ukrainian-Markdown translation.
//!
//! Each submodule implements one transformation step and is testable on its
//! own: extraction runs against any [`source::DocumentSource`], translation
//! against any [`backend::TranslationBackend`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ layout ──▶ extract ──▶ chunk ──▶ executor ──▶ postprocess
//! (%PDF)    (pdfium)   (lines)    (Blocks)   (Chunks)  (backend,     (term
//!                                   │                   checkpoint)   annotation)
//!                                   ▼
//!                                 images (PNG under images/)
//! ```
//!
//! 1. [`input`]   — check the file exists, is readable and starts with `%PDF`
//! 2. [`source`]  — positioned text runs and image regions per page; pdfium
//!    is not async-safe, so this runs in `spawn_blocking`
//! 3. [`layout`]  — group runs into lines and lines into fragments
//! 4. [`extract`] — classify fragments into [`crate::model::Block`]s, drop
//!    page noise, save figures through [`images`]
//! 5. [`chunk`]   — word-bounded [`crate::model::Chunk`]s that start at major headings
//! 6. [`executor`] — sequential translation through [`backend`], with
//!    [`clean`] applied to every response and [`checkpoint`] written after
//!    every chunk
//! 7. [`postprocess`] — English originals after first term occurrences

pub mod backend;
pub mod checkpoint;
pub mod chunk;
pub mod clean;
pub mod executor;
pub mod extract;
pub mod images;
pub mod input;
pub mod layout;
pub mod postprocess;
pub mod source;
