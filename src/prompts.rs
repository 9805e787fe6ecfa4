//! Prompts for the translation and term-restoration backend calls.
//!
//! Every prompt the pipeline sends lives here so that a change to the
//! translation rules is one edit, and so tests can inspect the exact text the
//! model sees without a running backend.
//!
//! The labels that frame each section of a prompt are exported as constants:
//! the hallucination rules in [`crate::pipeline::clean`] look for the same
//! strings when a model echoes its prompt back.

use crate::glossary::KEEP_AS_IS;

/// Label introducing the previous chunk's translation.
pub const CONTEXT_LABEL: &str = "[Previous context for terminology consistency]:";

/// Label introducing the source text.
pub const SOURCE_LABEL: &str = "[Text to translate]:";

/// Label the model continues from.
pub const ANSWER_LABEL: &str = "[Ukrainian translation]:";

/// Labels used by the term-restoration prompt.
pub const FIX_SOURCE_LABEL: &str = "[Original (English)]:";
pub const FIX_DRAFT_LABEL: &str = "[Translation (before correction)]:";
pub const FIX_ANSWER_LABEL: &str = "[Corrected translation]:";

/// Characters of source text passed to the term-restoration call.
pub const FIX_SOURCE_CHARS: usize = 1200;

/// Base instructions for translating one chunk of a technical book.
pub const TRANSLATION_RULES: &str = r#"You are a professional translator of technical literature from English into Ukrainian.

Rules:
1. Reply with the translation ONLY: no comments, no introductions, no notes
2. Preserve Markdown: # ## ### - * ** `code`
3. Do not translate fenced code blocks; copy them unchanged
4. Do not translate proper names, company names, tool names or acronyms
5. On the first use of an architecture term write: Ukrainian (english). Example: зв'язаність (coupling)
6. Style: clear academic Ukrainian
7. Keep the paragraph structure of the original
8. Numbers, URLs and email addresses stay unchanged"#;

/// Instructions for the second, narrower term-restoration call.
pub const TERM_FIX_RULES: &str = r#"You are an editor of technical translations. You are given an English original and its Ukrainian translation.

Find technical terms in the original that must stay in English (CamelCase names, acronyms, framework, library and tool names, product names) but were translated anyway, and restore them.

Return ONLY the corrected Ukrainian text. No explanations, no comments.
If nothing needs correcting, return the text unchanged."#;

/// Build the translation prompt for one chunk.
///
/// `context` is the previous chunk's translation; only its last
/// `context_chars` characters are included, and a blank context omits the
/// section entirely (the hallucination retry passes `""`).
pub fn translation_prompt(text: &str, context: &str, context_chars: usize) -> String {
    let mut prompt = String::with_capacity(TRANSLATION_RULES.len() + text.len() + 1024);
    prompt.push_str(TRANSLATION_RULES);
    prompt.push_str("\n9. ALWAYS keep in English: ");
    prompt.push_str(&KEEP_AS_IS.join(", "));
    prompt.push_str("\n\n");

    if !context.trim().is_empty() {
        prompt.push_str(CONTEXT_LABEL);
        prompt.push('\n');
        prompt.push_str(tail_chars(context, context_chars));
        prompt.push_str("\n\n");
    }

    prompt.push_str(SOURCE_LABEL);
    prompt.push('\n');
    prompt.push_str(text);
    prompt.push_str("\n\n");
    prompt.push_str(ANSWER_LABEL);
    prompt
}

/// Build the term-restoration prompt comparing source and translation.
pub fn term_fix_prompt(source: &str, translated: &str) -> String {
    format!(
        "{TERM_FIX_RULES}\n\n{FIX_SOURCE_LABEL}\n{}\n\n{FIX_DRAFT_LABEL}\n{translated}\n\n{FIX_ANSWER_LABEL}",
        head_chars(source, FIX_SOURCE_CHARS)
    )
}

/// Header placed above the translated body in the final document.
pub fn document_header(title: &str, start_page: usize, end_page: usize, total_pages: usize) -> String {
    format!(
        "# {title}\n\n> Переклад: сторінки {start_page}–{end_page} з {total_pages}\n\n---\n\n"
    )
}

/// Last `n` characters of `s`, on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// First `n` characters of `s`, on a char boundary.
fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_context_tail_only() {
        let context = format!("{}КІНЕЦЬ", "а".repeat(1000));
        let prompt = translation_prompt("Coupling matters.", &context, 10);
        assert!(prompt.contains(CONTEXT_LABEL));
        assert!(prompt.contains("ааааКІНЕЦЬ"));
        assert!(!prompt.contains("аааааКІНЕЦЬ"));
        assert!(prompt.ends_with(ANSWER_LABEL));
    }

    #[test]
    fn blank_context_is_omitted() {
        let prompt = translation_prompt("Text", "   \n", 400);
        assert!(!prompt.contains(CONTEXT_LABEL));
        assert!(prompt.contains("[Text to translate]:\nText"));
    }

    #[test]
    fn prompt_lists_keep_as_is_terms() {
        let prompt = translation_prompt("x", "", 400);
        assert!(prompt.contains("software architecture"));
        assert!(prompt.contains("Kubernetes"));
    }

    #[test]
    fn term_fix_prompt_truncates_source() {
        let source = "s".repeat(5000);
        let prompt = term_fix_prompt(&source, "переклад");
        assert!(prompt.contains(&"s".repeat(FIX_SOURCE_CHARS)));
        assert!(!prompt.contains(&"s".repeat(FIX_SOURCE_CHARS + 1)));
        assert!(prompt.ends_with(FIX_ANSWER_LABEL));
    }

    #[test]
    fn header_format() {
        let h = document_header("Fundamentals", 1, 12, 420);
        assert!(h.starts_with("# Fundamentals\n\n> Переклад: сторінки 1–12 з 420\n\n---\n\n"));
    }

    #[test]
    fn tail_respects_multibyte_boundaries() {
        assert_eq!(tail_chars("привіт", 3), "віт");
        assert_eq!(tail_chars("ab", 5), "ab");
        assert_eq!(head_chars("привіт", 2), "пр");
    }
}
