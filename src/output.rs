//! Result types returned by the public entry points.

use crate::model::Block;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a finished translation run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationOutput {
    /// Final document: header, translated chunks, term annotations.
    pub markdown: String,
    /// Where the final document was written.
    pub output_path: PathBuf,
    /// Change descriptions from the term annotation pass.
    pub annotations: Vec<String>,
    /// Path of the emitted glossary, when requested.
    pub glossary_path: Option<PathBuf>,
    pub stats: TranslationStats,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// First translated page (1-based).
    pub start_page: usize,
    /// Last translated page (1-based, inclusive).
    pub end_page: usize,
    /// Blocks emitted by the extractor, images included.
    pub blocks: usize,
    /// Image blocks saved under `images/`.
    pub images: usize,
    /// Chunks in the run.
    pub chunks: usize,
    /// Index of the first chunk sent to the backend (0 for a fresh run).
    pub resumed_from: usize,
    /// Chunks sent to the backend in this run.
    pub translated_chunks: usize,
    /// Chunks retried without context after a hallucination flag.
    pub hallucination_retries: usize,
    /// Term-restoration results discarded by the length floor.
    pub term_fix_discarded: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Time spent reading the PDF and saving images.
    pub extract_duration_ms: u64,
    /// Time spent in the executor.
    pub translate_duration_ms: u64,
}

/// Pre-flight report on a book, produced without any backend.
#[derive(Debug, Clone, Serialize)]
pub struct BookInfo {
    pub path: PathBuf,
    pub page_count: usize,
    /// First blocks of the opening pages (text only).
    pub preview: Vec<Block>,
    /// Words across the whole book.
    pub total_words: usize,
    /// Rough prompt tokens for the whole book.
    pub est_input_tokens: usize,
    /// Rough completion tokens for the whole book.
    pub est_output_tokens: usize,
}

impl BookInfo {
    /// Token estimates: Ukrainian output runs longer than the English source.
    pub fn estimate_tokens(total_words: usize) -> (usize, usize) {
        let input = (total_words as f64 * 1.5) as usize;
        let output = (total_words as f64 * 1.8) as usize;
        (input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimates() {
        assert_eq!(BookInfo::estimate_tokens(1000), (1500, 1800));
        assert_eq!(BookInfo::estimate_tokens(0), (0, 0));
    }

    #[test]
    fn stats_serialize() {
        let stats = TranslationStats {
            chunks: 4,
            resumed_from: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"resumed_from\":2"));
    }
}
