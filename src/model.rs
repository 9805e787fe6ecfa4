//! Content model shared by the extractor, the chunker and the executor.
//!
//! [`Block`]s and [`Chunk`]s are transient: they are rebuilt from the PDF on
//! every run and never persisted. Only translated text reaches the checkpoint.

use serde::Serialize;
use std::fmt;

/// Bounding box in page space, top-down (`top < bottom`), in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Reading-order comparison: top to bottom, then left to right.
    pub fn reading_cmp(&self, other: &Rect) -> std::cmp::Ordering {
        self.top
            .total_cmp(&other.top)
            .then(self.left.total_cmp(&other.left))
    }
}

/// Kind of a content block, decided once from font signals at extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    HeadingMajor,
    HeadingMinor,
    Paragraph,
    Code,
    Caption,
    Image,
}

impl BlockKind {
    pub fn is_heading(self) -> bool {
        matches!(self, BlockKind::HeadingMajor | BlockKind::HeadingMinor)
    }

    /// Short tag used by `pdf-translate info`.
    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::HeadingMajor => "[H1]",
            BlockKind::HeadingMinor => "[H2]",
            BlockKind::Paragraph => "[  ]",
            BlockKind::Code => "[CODE]",
            BlockKind::Caption => "[CAP]",
            BlockKind::Image => "[IMG]",
        }
    }
}

/// One classified unit of page content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// 1-based page number.
    pub page_number: usize,
    pub kind: BlockKind,
    /// Text for text kinds; a ready-to-embed Markdown image tag for images.
    pub content: String,
    /// Used for ordering within the page only.
    pub position: Rect,
}

impl Block {
    pub fn new(page_number: usize, kind: BlockKind, content: impl Into<String>, position: Rect) -> Self {
        Self {
            page_number,
            kind,
            content: content.into(),
            position,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == BlockKind::Image
    }

    /// Words this block contributes to a chunk. Images count for nothing.
    pub fn word_count(&self) -> usize {
        if self.is_image() {
            0
        } else {
            self.content.split_whitespace().count()
        }
    }

    /// Markdown projection for the translation prompt. `None` for images,
    /// which never reach the backend.
    pub fn to_markdown(&self) -> Option<String> {
        let text = &self.content;
        match self.kind {
            BlockKind::Image => None,
            BlockKind::HeadingMajor => Some(format!("# {text}")),
            BlockKind::HeadingMinor => Some(format!("## {text}")),
            BlockKind::Code => Some(format!("```\n{text}\n```")),
            BlockKind::Caption => Some(format!("*{text}*")),
            BlockKind::Paragraph => Some(text.clone()),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p.{:03} {} {}", self.page_number, self.kind.tag(), self.content)
    }
}

/// Where an image sat among a chunk's text blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePlacement {
    /// Fraction in `[0, 1]`: text blocks preceding the image / text blocks in chunk.
    pub position_fraction: f32,
    pub tag: String,
}

/// An ordered run of blocks translated by one backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    blocks: Vec<Block>,
}

impl Chunk {
    /// Build a chunk. The chunker never produces an empty one.
    pub fn new(blocks: Vec<Block>) -> Self {
        debug_assert!(!blocks.is_empty(), "chunks always hold at least one block");
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.is_image())
    }

    pub fn word_count(&self) -> usize {
        self.blocks.iter().map(Block::word_count).sum()
    }

    /// Prompt text: each text block rendered by kind, blank-line separated.
    pub fn prompt_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(Block::to_markdown)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Relative position of every image among the chunk's text blocks.
    ///
    /// A chunk without text blocks places every image at `1.0`.
    pub fn image_placements(&self) -> Vec<ImagePlacement> {
        let total_text = self.text_blocks().count();
        if total_text == 0 {
            return self
                .blocks
                .iter()
                .filter(|b| b.is_image())
                .map(|b| ImagePlacement {
                    position_fraction: 1.0,
                    tag: b.content.clone(),
                })
                .collect();
        }

        let mut seen_text = 0usize;
        let mut placements = Vec::new();
        for block in &self.blocks {
            if block.is_image() {
                placements.push(ImagePlacement {
                    position_fraction: seen_text as f32 / total_text as f32,
                    tag: block.content.clone(),
                });
            } else {
                seen_text += 1;
            }
        }
        placements
    }
}
