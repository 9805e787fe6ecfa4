//! Block extraction: classify page fragments and emit them in reading order.
//!
//! For each page in the range the extractor:
//!
//! 1. reads positioned text runs and image regions from the [`DocumentSource`]
//! 2. groups runs into fragments ([`super::layout`])
//! 3. classifies each fragment once from its font signals ([`classify`])
//! 4. drops publisher noise ([`NoiseFilter`])
//! 5. rasterises non-decorative images and saves them as PNG
//! 6. sorts the page's blocks by `(top, left)` and yields them
//!
//! The sort in step 6 is the page's final reading order; nothing downstream
//! reorders blocks.

use super::images::{image_filename, image_tag, is_decorative, save_png};
use super::layout::{page_fragments, TextFragment};
use super::source::DocumentSource;
use crate::error::TranslateError;
use crate::model::{Block, BlockKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, trace};

// ── Classification ───────────────────────────────────────────────────────

/// Font-size thresholds for block classification (points).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyThresholds {
    /// Max font size at or above which a fragment is a major heading.
    pub heading_major: f32,
    /// Max font size at or above which a fragment is a minor heading.
    pub heading_minor: f32,
    /// Bold fragments at or above this size are minor headings too.
    pub bold_heading_minor: f32,
    /// Fully italic fragments shorter than this are captions.
    pub caption_max_chars: usize,
}

impl Default for ClassifyThresholds {
    fn default() -> Self {
        Self {
            heading_major: 18.0,
            heading_minor: 14.0,
            bold_heading_minor: 12.0,
            caption_max_chars: 200,
        }
    }
}

/// Decide a fragment's kind and flatten its text.
///
/// First match wins: monospace → code; large → major heading; medium or
/// bold-and-mid-sized → minor heading; fully italic and short → caption;
/// anything else → paragraph. Code keeps its line breaks; every other kind
/// has its whitespace collapsed.
pub fn classify(fragment: &TextFragment, thresholds: &ClassifyThresholds) -> (BlockKind, String) {
    let mut max_size = 0.0f32;
    let mut has_bold = false;
    let mut has_mono = false;
    let mut all_italic = true;

    for span in fragment.spans() {
        max_size = max_size.max(span.font_size);
        has_bold |= span.bold;
        has_mono |= span.monospace;
        all_italic &= span.italic;
    }

    let collapsed = fragment
        .lines
        .iter()
        .map(|l| l.text())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if has_mono {
        let text = fragment
            .lines
            .iter()
            .map(|l| l.text().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return (BlockKind::Code, text);
    }

    let kind = if max_size >= thresholds.heading_major {
        BlockKind::HeadingMajor
    } else if max_size >= thresholds.heading_minor
        || (has_bold && max_size >= thresholds.bold_heading_minor)
    {
        BlockKind::HeadingMinor
    } else if all_italic && collapsed.chars().count() < thresholds.caption_max_chars {
        BlockKind::Caption
    } else {
        BlockKind::Paragraph
    };
    (kind, collapsed)
}

// ── Noise filter ─────────────────────────────────────────────────────────

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static RE_DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s]{10,}$").unwrap());
static RE_BOILERPLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ISBN|US \$|CAN \$").unwrap());
static RE_SOCIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Twitter:|linkedin\.com|youtube\.com").unwrap());
static RE_RUNNING_LEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s*\|\s*").unwrap());
static RE_RUNNING_TRAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+\|\s*\d+$").unwrap());
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,:;]").unwrap());
static RE_TITLE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z ]+$").unwrap());

/// Declarative table of fragment-level noise rules.
///
/// A fragment is dropped when it is shorter than `min_chars`, matches any of
/// `always`, matches any of `boilerplate` while shorter than
/// `boilerplate_max_chars`, or looks like a running header: past
/// `running_header_after_page`, shorter than `running_header_max_chars`, no
/// punctuation, and all caps or title case.
///
/// The running-header rule drops some legitimate short headings. That is
/// accepted: missing a two-word heading costs less than a translated
/// chapter title on every page.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    pub min_chars: usize,
    pub always: Vec<Regex>,
    pub boilerplate: Vec<Regex>,
    pub boilerplate_max_chars: usize,
    pub running_header_after_page: usize,
    pub running_header_max_chars: usize,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            min_chars: 3,
            always: vec![
                RE_PAGE_NUMBER.clone(),
                RE_DIGIT_RUN.clone(),
                RE_SOCIAL.clone(),
                RE_RUNNING_LEAD.clone(),
                RE_RUNNING_TRAIL.clone(),
            ],
            boilerplate: vec![RE_BOILERPLATE.clone()],
            boilerplate_max_chars: 80,
            running_header_after_page: 5,
            running_header_max_chars: 40,
        }
    }
}

impl NoiseFilter {
    /// Whether a fragment's text is noise on `page`.
    pub fn is_noise(&self, text: &str, page: usize) -> bool {
        let t = text.trim();
        let len = t.chars().count();
        if len < self.min_chars {
            return true;
        }
        if self.always.iter().any(|re| re.is_match(t)) {
            return true;
        }
        if len < self.boilerplate_max_chars && self.boilerplate.iter().any(|re| re.is_match(t)) {
            return true;
        }
        if page > self.running_header_after_page
            && len < self.running_header_max_chars
            && !RE_PUNCT.is_match(t)
            && (is_all_caps(t) || RE_TITLE_CASE.is_match(t))
        {
            return true;
        }
        false
    }
}

/// At least one cased character and no lowercase ones.
fn is_all_caps(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

// ── Extractor ────────────────────────────────────────────────────────────

/// What to do with image regions.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageMode {
    /// Emit no image blocks and render nothing (`inspect`).
    Skip,
    /// Rasterise non-decorative images into this directory.
    SaveTo(PathBuf),
}

/// Extraction parameters.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub images: ImageMode,
    pub dpi: u32,
    pub min_image_width: f32,
    pub min_image_height: f32,
    pub thresholds: ClassifyThresholds,
    pub noise: NoiseFilter,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            images: ImageMode::Skip,
            dpi: 150,
            min_image_width: 60.0,
            min_image_height: 40.0,
            thresholds: ClassifyThresholds::default(),
            noise: NoiseFilter::default(),
        }
    }
}

/// Lazy, page-at-a-time sequence of [`Block`]s over a 1-based inclusive range.
///
/// One page is buffered at a time. The first error ends the sequence: a
/// page that cannot be read makes every later block meaningless. To repeat an
/// extraction, build a new extractor.
pub struct BlockExtractor<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    next_page: usize,
    end_page: usize,
    options: ExtractOptions,
    buffer: VecDeque<Block>,
    finished: bool,
}

impl<'a, S: DocumentSource + ?Sized> BlockExtractor<'a, S> {
    /// Extract pages `start..=end`. `end` is clamped to the document.
    pub fn new(source: &'a S, start: usize, end: usize, options: ExtractOptions) -> Self {
        Self {
            source,
            next_page: start.max(1),
            end_page: end.min(source.page_count()),
            options,
            buffer: VecDeque::new(),
            finished: false,
        }
    }

    /// Blocks of one page, sorted into reading order.
    pub fn extract_page(&self, page: usize) -> Result<Vec<Block>, TranslateError> {
        let content = self.source.page_content(page)?;
        let mut blocks = Vec::new();

        for fragment in page_fragments(content.spans) {
            let (kind, text) = classify(&fragment, &self.options.thresholds);
            if self.options.noise.is_noise(&text, page) {
                trace!("Page {}: noise dropped: {:?}", page, text);
                continue;
            }
            blocks.push(Block::new(page, kind, text, fragment.bbox));
        }

        if let ImageMode::SaveTo(dir) = &self.options.images {
            let mut seq = 0usize;
            for region in &content.images {
                if is_decorative(&region.bbox, self.options.min_image_width, self.options.min_image_height) {
                    continue;
                }
                seq += 1;
                let img = self.source.render_region(page, &region.bbox, self.options.dpi)?;
                save_png(&img, dir, &image_filename(page, seq))?;
                blocks.push(Block::new(page, BlockKind::Image, image_tag(page, seq), region.bbox));
            }
        }

        blocks.sort_by(|a, b| a.position.reading_cmp(&b.position));
        debug!("Page {}: {} blocks", page, blocks.len());
        Ok(blocks)
    }
}

impl<S: DocumentSource + ?Sized> Iterator for BlockExtractor<'_, S> {
    type Item = Result<Block, TranslateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(block) = self.buffer.pop_front() {
                return Some(Ok(block));
            }
            if self.finished || self.next_page > self.end_page {
                return None;
            }
            let page = self.next_page;
            self.next_page += 1;
            match self.extract_page(page) {
                Ok(blocks) => self.buffer.extend(blocks),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
