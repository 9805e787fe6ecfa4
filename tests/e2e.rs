//! End-to-end integration tests for edgequake-pdf-translate.
//!
//! These tests read a real PDF from `./test_cases/` through pdfium and call a
//! running Ollama server. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DYLD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! Use another book with `E2E_PDF=/path/to/book.pdf`, another model with
//! `E2E_MODEL=...`.

use edgequake_pdf_translate::{inspect, translate, BlockKind, PageRange, TranslationConfig};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_pdf() -> PathBuf {
    std::env::var("E2E_PDF")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/book.pdf"))
}

fn output_dir(name: &str) -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases/output")
        .join(name);
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn config(pages: PageRange, resume: bool) -> TranslationConfig {
    let mut builder = TranslationConfig::builder()
        .pages(pages)
        .chunk_words(300)
        .resume(resume)
        .emit_glossary(true);
    if let Ok(model) = std::env::var("E2E_MODEL") {
        builder = builder.model(model);
    }
    builder.build().expect("valid config")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect() {
    let pdf = e2e_skip_unless_ready!(test_pdf());

    let info = inspect(&pdf, None).await.expect("inspect");
    println!(
        "{} pages, {} words, ~{} input tokens",
        info.page_count, info.total_words, info.est_input_tokens
    );
    assert!(info.page_count > 0);
    assert!(info.preview.len() <= 20);
    assert!(info.preview.iter().all(|b| b.kind != BlockKind::Image));
    assert!(info.preview.iter().all(|b| b.page_number <= 5));
}

#[tokio::test]
async fn test_translate_then_resume() {
    let pdf = e2e_skip_unless_ready!(test_pdf());
    let out_dir = output_dir("translate");
    let output = out_dir.join("book_ua.md");

    let first = translate(&pdf, &output, &config(PageRange::new(1, Some(2)), false))
        .await
        .expect("translation");
    println!("{:#?}", first.stats);

    assert!(first.markdown.starts_with("# "));
    assert!(first.markdown.contains("> Переклад: сторінки 1–2"));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), first.markdown);
    assert!(out_dir.join(".checkpoint.json").exists());
    assert!(out_dir.join("progress.json").exists());
    assert!(first.glossary_path.as_ref().is_some_and(|p| p.exists()));
    assert_eq!(first.stats.translated_chunks, first.stats.chunks);

    // Everything is checkpointed: a resumed run sends nothing to the backend
    // and reproduces the same document.
    let second = translate(&pdf, &output, &config(PageRange::new(1, Some(2)), true))
        .await
        .expect("resumed translation");
    assert_eq!(second.stats.translated_chunks, 0);
    assert_eq!(second.stats.resumed_from, first.stats.chunks);
    assert_eq!(second.markdown, first.markdown);
}

#[tokio::test]
async fn test_start_page_past_end_is_rejected() {
    let pdf = e2e_skip_unless_ready!(test_pdf());
    let output = output_dir("out_of_range").join("book_ua.md");

    let err = translate(&pdf, &output, &config(PageRange::new(100_000, None), false))
        .await
        .unwrap_err();
    println!("{err}");
    assert!(matches!(
        err,
        edgequake_pdf_translate::TranslateError::PageOutOfRange { .. }
    ));
}
