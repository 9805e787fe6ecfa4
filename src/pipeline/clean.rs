//! Deterministic cleanup and quality checks for raw backend output.
//!
//! Small local models fail in recognisable ways: they drift into another
//! script for a sentence, announce "(continued)", loop on the same sentence,
//! end with a burst of hashtags, or stop inside a code block. Each failure
//! has a rule here, and every rule set is a plain struct with a `Default`
//! so tests and callers can inspect or extend the tables without touching the
//! functions that apply them.
//!
//! Three entry points, applied by the executor in this order:
//!
//! 1. [`strip_noise`] — once, on every backend response
//! 2. [`detect_hallucination`] — decides whether the chunk is retried
//! 3. [`force_terminology`] — on the accepted translation
//!
//! Stripping never trims or reflows whitespace and never touches balanced
//! fences, so it is a no-op on text that is already clean.

use crate::prompts::{ANSWER_LABEL, CONTEXT_LABEL, FIX_ANSWER_LABEL, FIX_DRAFT_LABEL, FIX_SOURCE_LABEL, SOURCE_LABEL};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// ── Noise stripping ──────────────────────────────────────────────────────

static RE_FOREIGN_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}\p{Arabic}\p{Hebrew}\p{Thai}\p{Devanagari}]+[^\n]*",
    )
    .unwrap()
});

static RE_CONTINUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*[\(\[*_]*\s*(продовження( далі| буде| наступує| слідує)?|далі буде|кінець фрагмента|continued|to be continued|continues)\s*[.…:]*\s*[\)\]*_]*\s*$",
    )
    .unwrap()
});

static RE_OUTER_MARKDOWN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```(?:markdown|md)\n(.*?)\n```\s*$").unwrap());

static RE_HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)#[\p{L}\p{N}_]+").unwrap());

static RE_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?…\n]+[.!?…]*").unwrap());

static RE_CODE_SIGNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[{}();=<>\[\]$]|::|->|=>|^\s{2,}\S|^\t").unwrap());

/// Non-alphanumeric characters that make a line meaningful on their own.
const KEPT_SYMBOLS: &str = "«»—–…“”„’•·№§©®™°±×÷→←↑↓";

/// Zero-width and formatting characters models copy from their training data.
const INVISIBLE_CHARS: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'];

/// Rules applied by [`strip_noise`].
#[derive(Debug, Clone)]
pub struct StripRules {
    /// Runs of unrelated scripts; each match and the rest of its line are removed.
    pub foreign_script: Regex,
    /// Whole lines that are meta-annotations, dropped.
    pub continuation_markers: Vec<Regex>,
    /// A line with at least this many hashtags truncates the text before it.
    pub hashtag_limit: usize,
    /// Characters of a sentence used as its repetition fingerprint.
    pub fingerprint_chars: usize,
    /// Sentences shorter than this never count as repeats.
    pub min_sentence_chars: usize,
    /// The text is cut where a fingerprint occurs for this many times.
    pub repeat_limit: usize,
}

impl Default for StripRules {
    fn default() -> Self {
        Self {
            foreign_script: RE_FOREIGN_SCRIPT.clone(),
            continuation_markers: vec![RE_CONTINUATION.clone()],
            hashtag_limit: 3,
            fingerprint_chars: 60,
            min_sentence_chars: 20,
            repeat_limit: 3,
        }
    }
}

/// Remove generation noise from a backend response.
///
/// Fenced code is exempt from the truncation rules, and fences come out
/// balanced: a dangling fence is closed when code follows it and dropped
/// otherwise.
pub fn strip_noise(text: &str, rules: &StripRules) -> String {
    let mut s = normalise(text);
    s = strip_outer_markdown_fence(&s);
    s = rules.foreign_script.replace_all(&s, "").into_owned();
    s = drop_lines(&s, |line| {
        rules.continuation_markers.iter().any(|re| re.is_match(line)) || is_symbol_garbage(line)
    });
    s = truncate_at_hashtags(&s, rules.hashtag_limit);
    s = truncate_at_repetition(&s, rules);
    balance_fences(&s)
}

fn normalise(text: &str) -> String {
    let s = if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    };
    if s.contains(INVISIBLE_CHARS) {
        s.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
    } else {
        s
    }
}

fn strip_outer_markdown_fence(text: &str) -> String {
    match RE_OUTER_MARKDOWN_FENCE.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}

fn drop_lines(text: &str, drop: impl Fn(&str) -> bool) -> String {
    if !text.lines().any(&drop) {
        return text.to_string();
    }
    text.split('\n').filter(|l| !drop(l)).collect::<Vec<_>>().join("\n")
}

/// A non-blank line with no letters, digits or punctuation at all.
fn is_symbol_garbage(line: &str) -> bool {
    !line.trim().is_empty()
        && !line
            .chars()
            .any(|c| c.is_alphanumeric() || c.is_ascii_punctuation() || KEPT_SYMBOLS.contains(c))
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// A line that reads as source code: code punctuation, indentation, or plain
/// ASCII without sentence punctuation (`mvn package`).
fn is_code_like(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() {
        return false;
    }
    RE_CODE_SIGNAL.is_match(line) || (t.is_ascii() && !t.ends_with(['.', '!', '?', ',', ':', ';']))
}

/// Lines outside fenced code, with their byte offsets.
fn prose_lines(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut offset = 0;
    let mut in_code = false;
    text.split('\n').filter_map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        if is_fence(line) {
            in_code = !in_code;
            None
        } else if in_code {
            None
        } else {
            Some((start, line))
        }
    })
}

/// Close or drop an unmatched last fence. Paired fences are left alone.
fn balance_fences(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let fences: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| is_fence(l))
        .map(|(i, _)| i)
        .collect();
    let Some(&dangling) = fences.last().filter(|_| fences.len() % 2 == 1) else {
        return text.to_string();
    };

    let tagged = !lines[dangling].trim_start().trim_start_matches('`').trim().is_empty();
    if tagged || lines[dangling + 1..].iter().any(|l| is_code_like(l)) {
        // The model stopped inside a code block.
        return format!("{}\n```", text.trim_end());
    }
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != dangling)
        .map(|(_, l)| *l)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Cut the text before the first prose line carrying `limit` or more hashtags.
fn truncate_at_hashtags(text: &str, limit: usize) -> String {
    for (start, line) in prose_lines(text) {
        if RE_HASHTAG.find_iter(line).count() >= limit {
            return text[..start].trim_end().to_string();
        }
    }
    text.to_string()
}

/// Cut the text where a prose sentence fingerprint appears for the
/// `repeat_limit`-th time. Repeated lines inside code are normal.
fn truncate_at_repetition(text: &str, rules: &StripRules) -> String {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (start, line) in prose_lines(text) {
        for m in RE_SENTENCE.find_iter(line) {
            let sentence = m.as_str().trim();
            if sentence.chars().count() < rules.min_sentence_chars {
                continue;
            }
            let fingerprint = sentence
                .chars()
                .take(rules.fingerprint_chars)
                .collect::<String>()
                .to_lowercase();
            let count = seen.entry(fingerprint).or_insert(0);
            *count += 1;
            if *count >= rules.repeat_limit {
                return text[..start + m.start()].trim_end().to_string();
            }
        }
    }
    text.to_string()
}

// ── Forced terminology ───────────────────────────────────────────────────

/// Inflected Ukrainian renderings rewritten back to the English term.
pub const FORCED_TERMS: &[(&str, &str)] = &[
    (r"архітектор[аиуові]?\s+програмного\s+забезпечення", "software architect"),
    (r"архітектор[аиуові]?\s+програмне\s+забезпечення", "software architect"),
    (r"архітектур[аиуові]+\s+програмного\s+забезпечення", "software architecture"),
    (r"програмн[аиоу]+\s+архітектур[аиуові]*", "software architecture"),
    (r"програмн[аиоу]+\s+архітектор[аиуові]*", "software architect"),
    (r"інженерія\s+програмного\s+забезпечення", "software engineering"),
    (r"розробк[аи]\s+програмного\s+забезпечення", "software development"),
];

static FORCED_TERM_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    FORCED_TERMS
        .iter()
        .map(|(pattern, term)| (Regex::new(&format!("(?i){pattern}")).unwrap(), *term))
        .collect()
});

/// Rewrite Ukrainian variants of keep-in-English terms, case-insensitively.
pub fn force_terminology(text: &str) -> String {
    let mut out = text.to_string();
    for (re, term) in FORCED_TERM_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *term).into_owned();
        }
    }
    out
}

// ── Hallucination detection ──────────────────────────────────────────────

/// Why a translation was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HallucinationKind {
    /// Echoed prompt labels or "Original:/Translation:" style prefixes.
    BilingualLabel,
    /// A section heading the source never had ("Translator's note", ...).
    FabricatedHeader,
    /// Far more words than the source chunk.
    ExcessiveLength,
}

impl std::fmt::Display for HallucinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HallucinationKind::BilingualLabel => f.write_str("bilingual label"),
            HallucinationKind::FabricatedHeader => f.write_str("fabricated header"),
            HallucinationKind::ExcessiveLength => f.write_str("excessive length"),
        }
    }
}

static RE_BILINGUAL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^\s*\**\s*(original|оригінал|translation|переклад|english|англійською|ukrainian|українською|en|uk|ua)\s*\**\s*:",
    )
    .unwrap()
});

static RE_FABRICATED_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^\s*(#{1,6}\s*|\*\*)?\s*(примітк[аи] перекладача|від перекладача|translator'?s note|note from the translator|key takeaways|ключові висновки|summary of (the|this) chapter|підсумок розділу)",
    )
    .unwrap()
});

/// Rules applied by [`detect_hallucination`].
#[derive(Debug, Clone)]
pub struct HallucinationRules {
    /// Literal strings that only appear when the model echoes its prompt.
    pub echoed_labels: Vec<&'static str>,
    pub bilingual_patterns: Vec<Regex>,
    pub fabricated_headers: Vec<Regex>,
    /// Output words above this multiple of source words are excessive.
    pub max_length_ratio: f32,
}

impl Default for HallucinationRules {
    fn default() -> Self {
        Self {
            echoed_labels: vec![
                CONTEXT_LABEL,
                SOURCE_LABEL,
                ANSWER_LABEL,
                FIX_SOURCE_LABEL,
                FIX_DRAFT_LABEL,
                FIX_ANSWER_LABEL,
            ],
            bilingual_patterns: vec![RE_BILINGUAL_PREFIX.clone()],
            fabricated_headers: vec![RE_FABRICATED_HEADER.clone()],
            max_length_ratio: 2.5,
        }
    }
}

impl HallucinationRules {
    pub fn with_ratio(ratio: f32) -> Self {
        Self {
            max_length_ratio: ratio,
            ..Self::default()
        }
    }
}

/// Flag a translation of a `source_words`-word chunk, or `None` if it looks sane.
pub fn detect_hallucination(
    output: &str,
    source_words: usize,
    rules: &HallucinationRules,
) -> Option<HallucinationKind> {
    if rules.echoed_labels.iter().any(|l| output.contains(l))
        || rules.bilingual_patterns.iter().any(|re| re.is_match(output))
    {
        return Some(HallucinationKind::BilingualLabel);
    }
    if rules.fabricated_headers.iter().any(|re| re.is_match(output)) {
        return Some(HallucinationKind::FabricatedHeader);
    }
    let output_words = output.split_whitespace().count();
    if source_words > 0 && output_words as f32 > source_words as f32 * rules.max_length_ratio {
        return Some(HallucinationKind::ExcessiveLength);
    }
    None
}
