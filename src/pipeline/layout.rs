//! Layout grouping: positioned text runs → lines → fragments.
//!
//! A PDF page is a bag of independently placed text runs. Classification
//! needs paragraph-sized fragments, so runs are first merged into lines by
//! vertical proximity and lines into fragments by spacing, font size and
//! indentation. Fragments are the unit the extractor classifies.

use super::source::TextSpan;
use crate::model::Rect;

/// Line spacing assumed when a page has fewer than two lines.
const DEFAULT_LINE_SPACING: f32 = 12.0;

/// A visual line: spans sharing a baseline, sorted left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    pub bbox: Rect,
    /// Dominant font size, weighted by text length.
    pub font_size: f32,
}

impl TextLine {
    /// Build a line from spans. Returns `None` for an empty span list.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Option<Self> {
        let first = spans.first()?;
        let mut bbox = first.bbox;
        for span in &spans {
            bbox = bbox.union(&span.bbox);
        }
        spans.sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));

        let total_chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();
        let font_size = if total_chars > 0 {
            spans
                .iter()
                .map(|s| s.font_size * s.text.chars().count() as f32)
                .sum::<f32>()
                / total_chars as f32
        } else {
            spans[0].font_size
        };

        Some(Self {
            spans,
            bbox,
            font_size,
        })
    }

    /// Combined text, with a space wherever the horizontal gap between two
    /// runs is wider than a fifth of a character.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.bbox.left - prev.bbox.right;
                let chars = span.text.chars().count();
                let avg_char_width = if chars > 0 && span.bbox.width() > 0.0 {
                    span.bbox.width() / chars as f32
                } else {
                    span.font_size * 0.5
                };
                let needs_space = gap > avg_char_width * 0.2
                    && !prev.text.ends_with(char::is_whitespace)
                    && !span.text.starts_with(char::is_whitespace);
                if needs_space {
                    out.push(' ');
                }
            }
            out.push_str(&span.text);
        }
        out
    }

    pub fn is_monospace(&self) -> bool {
        self.spans.iter().any(|s| s.monospace)
    }
}

/// A run of consecutive lines forming one paragraph, heading or code listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub lines: Vec<TextLine>,
    pub bbox: Rect,
}

impl TextFragment {
    fn from_lines(lines: Vec<TextLine>) -> Option<Self> {
        let mut bbox = lines.first()?.bbox;
        for line in &lines {
            bbox = bbox.union(&line.bbox);
        }
        Some(Self { lines, bbox })
    }

    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.lines.iter().flat_map(|l| l.spans.iter())
    }
}

/// Group a page's spans into fragments in reading order.
pub fn page_fragments(spans: Vec<TextSpan>) -> Vec<TextFragment> {
    group_lines_into_fragments(group_spans_into_lines(spans))
}

/// Merge spans whose bottoms lie within 30% of the font size of each other.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.retain(|s| !s.text.trim().is_empty());
    spans.sort_by(|a, b| {
        a.bbox
            .bottom
            .total_cmp(&b.bbox.bottom)
            .then(a.bbox.left.total_cmp(&b.bbox.left))
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_bottom: Option<f32> = None;

    for span in spans {
        let tolerance = span.font_size * 0.3;
        match current_bottom {
            Some(bottom) if (span.bbox.bottom - bottom).abs() <= tolerance => current.push(span),
            _ => {
                lines.extend(TextLine::from_spans(std::mem::take(&mut current)));
                current_bottom = Some(span.bbox.bottom);
                current.push(span);
            }
        }
    }
    lines.extend(TextLine::from_spans(current));
    lines
}

/// Merge consecutive lines into fragments.
pub fn group_lines_into_fragments(lines: Vec<TextLine>) -> Vec<TextFragment> {
    let avg_spacing = average_line_spacing(&lines);
    let mut fragments = Vec::new();
    let mut current: Vec<TextLine> = Vec::new();

    for line in lines {
        if let Some(prev) = current.last() {
            if should_break(prev, &line, avg_spacing) {
                fragments.extend(TextFragment::from_lines(std::mem::take(&mut current)));
            }
        }
        current.push(line);
    }
    fragments.extend(TextFragment::from_lines(current));
    fragments
}

fn average_line_spacing(lines: &[TextLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[1].bbox.bottom - w[0].bbox.bottom).abs())
        .filter(|s| *s > 0.1)
        .collect();
    if spacings.is_empty() {
        return DEFAULT_LINE_SPACING;
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

fn should_break(prev: &TextLine, curr: &TextLine, avg_spacing: f32) -> bool {
    // Code listings never merge with prose, in either direction.
    if prev.is_monospace() != curr.is_monospace() {
        return true;
    }

    let spacing = (curr.bbox.bottom - prev.bbox.bottom).abs();
    if spacing > avg_spacing * 1.5 {
        return true;
    }

    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }

    // Indentation inside a listing is structure, not a new block.
    let both_code = prev.is_monospace() && curr.is_monospace();
    if !both_code && (prev.bbox.left - curr.bbox.left).abs() > 20.0 {
        return true;
    }

    false
}
