//! Pipeline integration tests: an in-memory document source and a scripted
//! backend stand in for pdfium and the model, so these run anywhere.

use edgequake_pdf_translate::pipeline::checkpoint::{CheckpointState, CheckpointStore};
use edgequake_pdf_translate::pipeline::chunk::{chunk_blocks, Chunker};
use edgequake_pdf_translate::pipeline::executor::{Executor, ExecutorOptions};
use edgequake_pdf_translate::pipeline::extract::{BlockExtractor, ExtractOptions, ImageMode};
use edgequake_pdf_translate::pipeline::source::{DocumentSource, ImageRegion, PageContent, TextSpan};
use edgequake_pdf_translate::prompts::CONTEXT_LABEL;
use edgequake_pdf_translate::{
    annotate_terms, BackendError, Block, BlockKind, Chunk, GenerationParams, Rect, TranslateError,
    TranslationBackend, TranslationProgressCallback,
};
use image::DynamicImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────

struct FakeSource {
    pages: Vec<PageContent>,
}

impl DocumentSource for FakeSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_content(&self, page: usize) -> Result<PageContent, TranslateError> {
        self.pages
            .get(page - 1)
            .cloned()
            .ok_or(TranslateError::PageOutOfRange {
                page,
                total: self.pages.len(),
            })
    }

    fn render_region(&self, _page: usize, region: &Rect, _dpi: u32) -> Result<DynamicImage, TranslateError> {
        Ok(DynamicImage::new_rgb8(region.width() as u32, region.height() as u32))
    }
}

fn page(number: usize, spans: Vec<TextSpan>, images: Vec<ImageRegion>) -> PageContent {
    PageContent {
        page_number: number,
        width: 612.0,
        height: 792.0,
        spans,
        images,
    }
}

/// Replies in order; records every prompt.
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|s| Ok(s.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TranslationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str, _params: GenerationParams) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Fatal("no scripted reply left".into())))
    }

    async fn check_available(&self) -> Result<(), TranslateError> {
        Ok(())
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

fn words(prefix: &str, n: usize) -> String {
    (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

fn paragraph(text: impl Into<String>) -> Block {
    Block::new(1, BlockKind::Paragraph, text, Rect::default())
}

fn fast() -> ExecutorOptions {
    ExecutorOptions {
        retry_backoff: Duration::ZERO,
        ..Default::default()
    }
}

fn executor<'a>(backend: &'a ScriptedBackend, dir: &Path) -> Executor<'a, ScriptedBackend> {
    Executor::new(backend, CheckpointStore::in_dir(dir), dir.join("book_ua.md"), fast())
}

// ── Extraction ───────────────────────────────────────────────────────────

#[test]
fn three_pages_yield_heading_paragraph_code() {
    let source = FakeSource {
        pages: vec![
            page(
                1,
                vec![TextSpan::new("Chapter 1", 24.0, "Times-Roman", Rect::new(72.0, 72.0, 200.0, 96.0))],
                vec![],
            ),
            page(
                2,
                vec![TextSpan::new(
                    "Modularity is an organizing principle.",
                    11.0,
                    "Times-Roman",
                    Rect::new(72.0, 100.0, 400.0, 111.0),
                )],
                vec![],
            ),
            page(
                3,
                vec![TextSpan::new("fn main() {}", 10.0, "Courier", Rect::new(72.0, 100.0, 160.0, 110.0))],
                vec![],
            ),
        ],
    };

    let blocks: Vec<Block> = BlockExtractor::new(&source, 1, 3, ExtractOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();

    let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
    assert_eq!(kinds, vec![BlockKind::HeadingMajor, BlockKind::Paragraph, BlockKind::Code]);
    assert_eq!(blocks[0].content, "Chapter 1");
    assert_eq!(blocks.iter().map(|b| b.page_number).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn extraction_range_is_respected_and_noise_dropped() {
    let source = FakeSource {
        pages: (1..=4)
            .map(|n| {
                page(
                    n,
                    vec![
                        TextSpan::new(
                            format!("Body text on page {n}, long enough to keep."),
                            11.0,
                            "Times-Roman",
                            Rect::new(72.0, 100.0, 400.0, 111.0),
                        ),
                        TextSpan::new(n.to_string(), 9.0, "Times-Roman", Rect::new(300.0, 750.0, 310.0, 759.0)),
                    ],
                    vec![],
                )
            })
            .collect(),
    };

    let blocks: Vec<Block> = BlockExtractor::new(&source, 2, 3, ExtractOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(blocks.len(), 2);
    assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    assert_eq!(blocks[0].page_number, 2);
}

#[test]
fn figures_are_saved_and_tagged() {
    let dir = tempfile::tempdir().unwrap();
    let images_dir = dir.path().join("images");
    let source = FakeSource {
        pages: vec![page(
            1,
            vec![TextSpan::new(
                "A paragraph above the figure.",
                11.0,
                "Times-Roman",
                Rect::new(72.0, 100.0, 400.0, 111.0),
            )],
            vec![
                ImageRegion {
                    bbox: Rect::new(72.0, 200.0, 272.0, 320.0),
                },
                // Decorative: below the 60×40 cut-off.
                ImageRegion {
                    bbox: Rect::new(10.0, 10.0, 20.0, 20.0),
                },
            ],
        )],
    };
    let options = ExtractOptions {
        images: ImageMode::SaveTo(images_dir.clone()),
        ..Default::default()
    };

    let blocks: Vec<Block> = BlockExtractor::new(&source, 1, 1, options)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].kind, BlockKind::Image);
    assert_eq!(blocks[1].content, "![Рисунок 1-1](images/p0001_img01.png)");
    assert!(images_dir.join("p0001_img01.png").exists());
    assert!(!images_dir.join("p0001_img02.png").exists());
}

#[test]
fn unreadable_page_stops_extraction() {
    struct Broken;
    impl DocumentSource for Broken {
        fn page_count(&self) -> usize {
            3
        }
        fn page_content(&self, page: usize) -> Result<PageContent, TranslateError> {
            if page == 2 {
                Err(TranslateError::PageReadFailed {
                    page,
                    detail: "bad stream".into(),
                })
            } else {
                Ok(page_content_with_text(page))
            }
        }
        fn render_region(&self, page: usize, _: &Rect, _: u32) -> Result<DynamicImage, TranslateError> {
            Err(TranslateError::RasterisationFailed {
                page,
                detail: "unused".into(),
            })
        }
    }

    fn page_content_with_text(n: usize) -> PageContent {
        page(
            n,
            vec![TextSpan::new(
                "Some ordinary sentence.",
                11.0,
                "Times-Roman",
                Rect::new(72.0, 100.0, 300.0, 111.0),
            )],
            vec![],
        )
    }

    let results: Vec<_> = BlockExtractor::new(&Broken, 1, 3, ExtractOptions::default()).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(TranslateError::PageReadFailed { page: 2, .. })));
    assert!(chunk_blocks(BlockExtractor::new(&Broken, 1, 3, ExtractOptions::default()), 50).is_err());
}

// ── Chunking ─────────────────────────────────────────────────────────────

#[test]
fn threshold_of_fifty_words() {
    let chunks: Vec<Chunk> = Chunker::new(
        vec![
            paragraph(words("a", 30)),
            paragraph(words("b", 30)),
            paragraph(words("c", 10)),
        ]
        .into_iter(),
        50,
    )
    .collect();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].len(), 2);
    assert_eq!(chunks[0].word_count(), 60);
    assert_eq!(chunks[1].word_count(), 10);
}

#[test]
fn chunking_preserves_block_order() {
    let input: Vec<Block> = (0..12).map(|i| paragraph(words(&format!("p{i}w"), 17))).collect();
    let chunks: Vec<Chunk> = Chunker::new(input.clone().into_iter(), 50).collect();
    let flattened: Vec<Block> = chunks.iter().flat_map(|c| c.blocks().to_vec()).collect();
    assert_eq!(flattened, input);
}

// ── Executor ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn resume_processes_only_remaining_chunks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".checkpoint.json"),
        r#"{"chunks": {"0": "A", "1": "B"}, "last_chunk": 1}"#,
    )
    .unwrap();

    let chunks = vec![
        Chunk::new(vec![paragraph("first chunk")]),
        Chunk::new(vec![paragraph("second chunk")]),
        Chunk::new(vec![paragraph("third chunk")]),
    ];
    let backend = ScriptedBackend::new(["C"]);
    let report = executor(&backend, dir.path()).run(&chunks, true).await.unwrap();

    assert_eq!(report.document, "A\n\n---\n\nB\n\n---\n\nC");
    assert_eq!(report.resumed_from, 2);
    assert_eq!(report.translated_chunks, 1);

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("third chunk"));
    // Continuity context comes from the checkpointed chunk 1.
    assert!(prompts[0].contains(&format!("{CONTEXT_LABEL}\nB\n")));

    let on_disk = std::fs::read_to_string(dir.path().join("book_ua.md")).unwrap();
    assert_eq!(on_disk, report.document);

    let state = CheckpointStore::in_dir(dir.path()).load(3);
    assert_eq!(state.last_chunk, 2);
    assert_eq!(state.chunks[&0], "A");
    assert_eq!(state.chunks[&1], "B");
}

#[tokio::test]
async fn fresh_run_ignores_existing_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".checkpoint.json"),
        r#"{"chunks": {"0": "stale"}, "last_chunk": 0}"#,
    )
    .unwrap();

    let chunks = vec![Chunk::new(vec![paragraph("only chunk")])];
    let backend = ScriptedBackend::new(["Новий"]);
    let report = executor(&backend, dir.path()).run(&chunks, false).await.unwrap();
    assert_eq!(report.document, "Новий");
    assert_eq!(backend.prompts().len(), 1);
}

#[tokio::test]
async fn hallucination_retries_once_without_context() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = vec![
        Chunk::new(vec![paragraph("Opening words of the book.")]),
        Chunk::new(vec![paragraph(words("src", 10))]),
    ];
    let backend = ScriptedBackend::new([
        "Перші слова книги.".to_string(),
        words("слово", 30),
        "Нормальний переклад.".to_string(),
    ]);
    let report = executor(&backend, dir.path()).run(&chunks, false).await.unwrap();

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].contains(CONTEXT_LABEL));
    assert!(!prompts[2].contains(CONTEXT_LABEL));
    assert_eq!(report.hallucination_retries, 1);
    assert_eq!(report.document, "Перші слова книги.\n\n---\n\nНормальний переклад.");
}

#[tokio::test]
async fn second_hallucination_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = vec![Chunk::new(vec![paragraph(words("src", 10))])];
    let second = words("інше", 30);
    let backend = ScriptedBackend::new([words("слово", 30), second.clone()]);
    let report = executor(&backend, dir.path()).run(&chunks, false).await.unwrap();

    assert_eq!(backend.prompts().len(), 2);
    assert_eq!(report.document, second);
}

#[tokio::test]
async fn images_follow_the_translation() {
    let dir = tempfile::tempdir().unwrap();
    let chunk = Chunk::new(vec![
        paragraph("Text before the figure."),
        Block::new(1, BlockKind::Image, "![Рисунок 1-1](images/p0001_img01.png)", Rect::default()),
        paragraph("Text after the figure."),
    ]);
    let backend = ScriptedBackend::new(["Текст до рисунка.\n\nТекст після рисунка."]);
    let report = executor(&backend, dir.path()).run(&[chunk], false).await.unwrap();

    assert_eq!(
        report.document,
        "Текст до рисунка.\n\nТекст після рисунка.\n\n![Рисунок 1-1](images/p0001_img01.png)"
    );
    assert!(!backend.prompts()[0].contains("![Рисунок"));
}

#[tokio::test]
async fn clean_output_passes_through_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let clean = "## Модульність\n\nМодульність описує, як система поділена на частини.\n\n```\nfn main() {}\n```";
    let backend = ScriptedBackend::new([clean]);
    let chunks = vec![Chunk::new(vec![paragraph("Modularity describes how a system is divided.")])];
    let report = executor(&backend, dir.path()).run(&chunks, false).await.unwrap();
    assert_eq!(report.document, clean);
}

/// Snapshots the checkpoint and the partial document after every chunk.
struct Snapshots {
    dir: PathBuf,
    seen: Mutex<Vec<(CheckpointState, String)>>,
}

impl TranslationProgressCallback for Snapshots {
    fn on_chunk_complete(&self, _index: usize, total: usize, _output_len: usize) {
        let state = CheckpointStore::in_dir(&self.dir).load(total);
        let doc = std::fs::read_to_string(self.dir.join("book_ua.md")).unwrap();
        self.seen.lock().unwrap().push((state, doc));
    }
}

#[tokio::test]
async fn checkpoint_and_document_grow_monotonically() {
    let dir = tempfile::tempdir().unwrap();
    let chunks: Vec<Chunk> = (0..4)
        .map(|i| Chunk::new(vec![paragraph(format!("source chunk {i}"))]))
        .collect();
    let backend = ScriptedBackend::new((0..4).map(|i| format!("Переклад {i}")));
    let snapshots = Arc::new(Snapshots {
        dir: dir.path().to_path_buf(),
        seen: Mutex::new(Vec::new()),
    });

    executor(&backend, dir.path())
        .with_progress(Some(snapshots.clone() as Arc<dyn TranslationProgressCallback>))
        .run(&chunks, false)
        .await
        .unwrap();

    let seen = snapshots.seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    for (i, (state, doc)) in seen.iter().enumerate() {
        assert_eq!(state.last_chunk, i as i64);
        assert_eq!(*doc, state.document());
        if let Some((_, next)) = seen.get(i + 1) {
            assert!(next.starts_with(doc.as_str()));
            assert!(next.len() > doc.len());
        }
    }
    let progress = std::fs::read_to_string(dir.path().join("progress.json")).unwrap();
    assert_eq!(progress, r#"{"done":4,"total":4}"#);
}

#[tokio::test]
async fn failed_chunk_leaves_prior_work_resumable() {
    let dir = tempfile::tempdir().unwrap();
    let chunks: Vec<Chunk> = (0..3)
        .map(|i| Chunk::new(vec![paragraph(format!("source chunk {i}"))]))
        .collect();

    // Only one reply: chunk 1 hits the end of the script.
    let backend = ScriptedBackend::new(["Перший"]);
    let err = executor(&backend, dir.path()).run(&chunks, false).await.unwrap_err();
    assert!(matches!(err, TranslateError::GenerationFailed { chunk: 1, .. }));

    let backend = ScriptedBackend::new(["Другий", "Третій"]);
    let report = executor(&backend, dir.path()).run(&chunks, true).await.unwrap();
    assert_eq!(report.resumed_from, 1);
    assert_eq!(report.document, "Перший\n\n---\n\nДругий\n\n---\n\nТретій");
}

// ── Term annotation ──────────────────────────────────────────────────────

#[tokio::test]
async fn annotating_a_translated_document_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new([
        "Зв'язаність і модульність визначають архітектуру.",
        "Мікросервісна архітектура знижує зв'язаність.\n\n```\nлет модульність = 1;\n```",
    ]);
    let chunks = vec![
        Chunk::new(vec![paragraph("Coupling and modularity shape architecture.")]),
        Chunk::new(vec![paragraph("Microservices architecture lowers coupling.")]),
    ];
    let report = executor(&backend, dir.path()).run(&chunks, false).await.unwrap();

    let (once, changes) = annotate_terms(&report.document);
    assert!(once.starts_with("Зв'язаність (coupling) і модульність (modularity)"));
    assert!(once.contains("Мікросервісна архітектура (microservices architecture)"));
    assert!(once.contains("лет модульність = 1;"));
    assert_eq!(changes.len(), 3);

    let (twice, again) = annotate_terms(&once);
    assert_eq!(twice, once);
    assert!(again.is_empty());
}
