//! Term annotation: put the English original after the first use of each
//! known Ukrainian technical term.
//!
//! ```text
//! Зв'язаність визначає ...     ──▶   Зв'язаність (coupling) визначає ...
//! ```
//!
//! Rules:
//!
//! * Terms are tried longest first. An occurrence inside a longer term's
//!   match (`зв'язаність` inside `доцентрова зв'язаність`) never counts.
//! * Fenced code blocks are skipped.
//! * Only the first eligible occurrence of a term is considered. If it is
//!   already followed by a parenthetical, the term is left alone, so a
//!   second pass over annotated text changes nothing.
//! * Matching is case-insensitive and word-bounded; the apostrophe in a term
//!   matches any of `'`, `’` or `ʼ`.

use crate::glossary::ANNOTATION_TERMS;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;

static RE_FOLLOWING_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\([^)]*\)").unwrap());

struct TermPattern {
    re: Regex,
    english: &'static str,
}

static TERM_PATTERNS: Lazy<Vec<TermPattern>> = Lazy::new(|| {
    let mut terms: Vec<&(&str, &str)> = ANNOTATION_TERMS.iter().collect();
    terms.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    let mut seen = HashSet::new();
    terms
        .into_iter()
        .filter(|(uk, _)| seen.insert(uk.to_lowercase()))
        .map(|(uk, en)| TermPattern {
            re: Regex::new(&format!(r"(?i)\b{}\b", term_pattern(uk))).unwrap(),
            english: en,
        })
        .collect()
});

/// Regex source for a term: literal text, any apostrophe variant.
fn term_pattern(term: &str) -> String {
    term.split(['\'', '’', 'ʼ'])
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("['’ʼ]")
}

/// Annotate `text`. Returns the new text and one `«term» → «term (en)»`
/// line per change, in document order.
pub fn annotate_terms(text: &str) -> (String, Vec<String>) {
    let fences = fenced_ranges(text);
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut insertions: Vec<(usize, String, String)> = Vec::new();

    for term in TERM_PATTERNS.iter() {
        let matches: Vec<Range<usize>> = term
            .re
            .find_iter(text)
            .map(|m| m.range())
            .filter(|r| !overlaps_any(r, &fences) && !overlaps_any(r, &claimed))
            .collect();

        if let Some(first) = matches.first() {
            let already = RE_FOLLOWING_PAREN.is_match(&text[first.end..]);
            if !already {
                let original = &text[first.clone()];
                insertions.push((
                    first.end,
                    format!(" ({})", term.english),
                    format!("  «{original}» → «{original} ({})»", term.english),
                ));
            }
        }
        claimed.extend(matches);
    }

    insertions.sort_by_key(|(at, _, _)| *at);
    let mut out = String::with_capacity(text.len() + insertions.len() * 16);
    let mut changes = Vec::with_capacity(insertions.len());
    let mut cursor = 0;
    for (at, insert, change) in insertions {
        out.push_str(&text[cursor..at]);
        out.push_str(&insert);
        cursor = at;
        changes.push(change);
    }
    out.push_str(&text[cursor..]);
    (out, changes)
}

fn overlaps_any(r: &Range<usize>, ranges: &[Range<usize>]) -> bool {
    ranges.iter().any(|o| r.start < o.end && o.start < r.end)
}

/// Byte ranges covered by ``` fenced blocks, fence lines included. An
/// unclosed fence runs to the end of the text.
fn fenced_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match open.take() {
                Some(start) => ranges.push(start..offset + line.len()),
                None => open = Some(offset),
            }
        }
        offset += line.len();
    }
    if let Some(start) = open {
        ranges.push(start..text.len());
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_only() {
        let (out, changes) = annotate_terms("Зв'язаність важлива. Зв'язаність вимірюють.");
        assert_eq!(out, "Зв'язаність (coupling) важлива. Зв'язаність вимірюють.");
        assert_eq!(changes, vec!["  «Зв'язаність» → «Зв'язаність (coupling)»"]);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let text = "Мікросервіси та мікросервісна архітектура.\n\nДоцентрова зв'язаність і зв'язаність.\n\nТехнічний борг.";
        let (once, changes) = annotate_terms(text);
        assert!(!changes.is_empty());
        let (twice, again) = annotate_terms(&once);
        assert_eq!(twice, once);
        assert!(again.is_empty());
    }

    #[test]
    fn every_term_is_stable_under_a_second_pass() {
        let mut docs: Vec<String> = Vec::new();
        for (uk, _) in ANNOTATION_TERMS {
            docs.push(format!("{uk} на початку. Потім {uk} ще раз."));
            docs.push(format!("```\n{uk}\n```\n\n{uk} поза кодом."));
            docs.push(format!("Слово «{uk}», а далі ({uk})."));
        }
        for window in ANNOTATION_TERMS.windows(3) {
            let doc: Vec<String> = window.iter().map(|(uk, _)| format!("Про {uk}.")).collect();
            docs.push(doc.join("\n\n---\n\n"));
        }
        docs.push(ANNOTATION_TERMS.iter().map(|(uk, _)| *uk).collect::<Vec<_>>().join(", "));

        for doc in &docs {
            let (once, changes) = annotate_terms(doc);
            assert!(!changes.is_empty(), "nothing annotated in {doc:?}");
            let (twice, again) = annotate_terms(&once);
            assert_eq!(twice, once, "second pass changed {doc:?}");
            assert!(again.is_empty(), "second pass reported {again:?}");
        }
    }

    #[test]
    fn longer_term_wins() {
        let (out, _) = annotate_terms("Доцентрова зв'язаність модуля.");
        assert_eq!(out, "Доцентрова зв'язаність (afferent coupling) модуля.");

        let (out, _) = annotate_terms("Доцентрова зв'язаність, а потім зв'язаність.");
        assert_eq!(
            out,
            "Доцентрова зв'язаність (afferent coupling), а потім зв'язаність (coupling)."
        );
    }

    #[test]
    fn code_blocks_are_skipped() {
        let text = "```\n// рефакторинг\n```\n\nРефакторинг коду.";
        let (out, _) = annotate_terms(text);
        assert_eq!(out, "```\n// рефакторинг\n```\n\nРефакторинг (refactoring) коду.");
    }

    #[test]
    fn existing_parenthetical_is_respected() {
        let (out, changes) = annotate_terms("Сага (saga) координує кроки. Сага знову.");
        assert_eq!(out, "Сага (saga) координує кроки. Сага знову.");
        assert!(changes.is_empty());
    }

    #[test]
    fn typographic_apostrophe_and_word_bounds() {
        let (out, _) = annotate_terms("Зв’язаність тут.");
        assert_eq!(out, "Зв’язаність (coupling) тут.");

        // Inflected forms are different words.
        let (out, changes) = annotate_terms("Сагами керують.");
        assert_eq!(out, "Сагами керують.");
        assert!(changes.is_empty());
    }

    #[test]
    fn fence_ranges_cover_unclosed_block() {
        let text = "a\n```\ncode\n```\nb\n```\nopen";
        let ranges = fenced_ranges(text);
        assert_eq!(ranges.len(), 2);
        assert_eq!(&text[ranges[0].clone()], "```\ncode\n```\n");
        assert_eq!(&text[ranges[1].clone()], "```\nopen");
    }
}
