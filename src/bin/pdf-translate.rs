//! CLI binary for edgequake-pdf-translate.
//!
//! A thin shim over the library crate: maps subcommands and flags to
//! `TranslationConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_pdf_translate::glossary::build_glossary_note;
use edgequake_pdf_translate::pipeline::checkpoint::write_document;
use edgequake_pdf_translate::{
    annotate_terms, inspect, translate, BackendKind, PageRange, ProgressCallback, TranslationConfig,
    TranslationProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all chunks, one log line per
/// finished chunk, and a yellow line for every retry.
struct CliProgressCallback {
    bar: ProgressBar,
    chunk_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports the chunk count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            chunk_started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.chunk_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranslationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_chunks: usize, resume_from: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_chunks as u64);
        self.bar.set_position(resume_from as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Translating");
        self.bar.reset_eta();

        let note = if resume_from > 0 {
            format!(" (resuming at chunk {})", resume_from + 1)
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_chunks} chunks to translate{note}"))
        ));
    }

    fn on_chunk_start(&self, index: usize, _total: usize, words: usize) {
        if let Ok(mut t) = self.chunk_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("chunk {} · {words} words", index + 1));
    }

    fn on_chunk_retry(&self, index: usize, reason: &str) {
        self.bar.println(format!(
            "  {} Chunk {:>4}  {}",
            yellow("↻"),
            index + 1,
            yellow(reason)
        ));
    }

    fn on_chunk_complete(&self, index: usize, total: usize, output_len: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>4}/{:<4}  {:<12}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{output_len:>6} bytes")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_chunks: usize, translated: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chunks translated ({} total)",
            green("✔"),
            bold(&translated.to_string()),
            total_chunks
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate a whole book with Ollama (aya-expanse:8b)
  pdf-translate translate book.pdf -o output/book_ua.md

  # A page range, continuing an interrupted run
  pdf-translate translate book.pdf --from-page 50 --to-page 100 --resume

  # Any edgequake-llm provider instead of the Ollama HTTP API
  pdf-translate translate book.pdf --backend provider --provider openai --model gpt-4.1-mini

  # Second pass restoring technical terms, plus a standalone glossary
  pdf-translate translate book.pdf --term-fix --glossary

  # Page count, preview and token estimate (no backend needed)
  pdf-translate info book.pdf

  # Annotate an existing translation (writes book_ua.md.bak first)
  pdf-translate annotate output/book_ua.md
  pdf-translate annotate output/book_ua.md --preview

ENVIRONMENT VARIABLES:
  PDF_TRANSLATE_BACKEND     ollama | provider
  PDF_TRANSLATE_MODEL       Model ID (default aya-expanse:8b)
  PDF_TRANSLATE_OLLAMA_URL  Ollama base URL (default http://localhost:11434)
  PDFIUM_LIB_PATH           Path to libpdfium (file or directory)
  RUST_LOG                  Override log filter (e.g. edgequake_pdf_translate=debug)

SETUP:
  1. ollama pull aya-expanse:8b
  2. ollama serve
  3. pdf-translate translate book.pdf
"#;

/// Translate technical PDF books into Ukrainian Markdown with a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-translate",
    version,
    about = "Translate technical PDF books into Ukrainian Markdown with a local LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF_TRANSLATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_TRANSLATE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate a PDF into a Markdown document.
    Translate(TranslateArgs),
    /// Show page count, a text preview and token estimates.
    Info {
        /// PDF file.
        input: PathBuf,
        /// PDF user password for encrypted documents.
        #[arg(long, env = "PDF_TRANSLATE_PASSWORD")]
        password: Option<String>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the technical glossary as a Markdown table.
    Glossary,
    /// Add English originals after the first use of known terms.
    Annotate {
        /// Translated Markdown file.
        file: PathBuf,
        /// Show the changes without writing anything.
        #[arg(long)]
        preview: bool,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// PDF file.
    input: PathBuf,

    /// Output Markdown file. Default: output/<input stem>_ua.md
    #[arg(short, long, env = "PDF_TRANSLATE_OUTPUT")]
    output: Option<PathBuf>,

    /// First page to translate (1-based).
    #[arg(long, env = "PDF_TRANSLATE_FROM_PAGE", default_value_t = 1)]
    from_page: usize,

    /// Last page to translate (inclusive). Default: last page.
    #[arg(long, env = "PDF_TRANSLATE_TO_PAGE")]
    to_page: Option<usize>,

    /// Words per chunk (≥ 50).
    #[arg(long, env = "PDF_TRANSLATE_CHUNK_WORDS", default_value_t = 600)]
    chunk_words: usize,

    /// Continue from the checkpoint instead of starting over.
    #[arg(long, env = "PDF_TRANSLATE_RESUME")]
    resume: bool,

    /// Checkpoint file. Default: .checkpoint.json beside the output.
    #[arg(long, env = "PDF_TRANSLATE_CHECKPOINT")]
    checkpoint: Option<PathBuf>,

    /// Generation backend.
    #[arg(long, env = "PDF_TRANSLATE_BACKEND", value_enum, default_value = "ollama")]
    backend: BackendArg,

    /// Model ID. Default: aya-expanse:8b
    #[arg(long, env = "PDF_TRANSLATE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider used by the provider backend.
    #[arg(long, env = "PDF_TRANSLATE_PROVIDER", default_value = "ollama")]
    provider: String,

    /// Ollama base URL.
    #[arg(long, env = "PDF_TRANSLATE_OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Second backend pass restoring mistranslated technical terms.
    #[arg(long, env = "PDF_TRANSLATE_TERM_FIX")]
    term_fix: bool,

    /// Write <output stem>_glossary.md beside the output.
    #[arg(long, env = "PDF_TRANSLATE_GLOSSARY")]
    glossary: bool,

    /// Document title. Default: input file stem.
    #[arg(long, env = "PDF_TRANSLATE_TITLE")]
    title: Option<String>,

    /// Rasterisation DPI for figures (72–400).
    #[arg(long, env = "PDF_TRANSLATE_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF_TRANSLATE_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max output tokens per chunk.
    #[arg(long, env = "PDF_TRANSLATE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Attempts per backend call on transient failure.
    #[arg(long, env = "PDF_TRANSLATE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PDF_TRANSLATE_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF_TRANSLATE_PASSWORD")]
    password: Option<String>,

    /// Disable the progress bar (plain log lines instead).
    #[arg(long, env = "PDF_TRANSLATE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Ollama,
    Provider,
}

impl From<BackendArg> for BackendKind {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Ollama => BackendKind::Ollama,
            BackendArg::Provider => BackendKind::Provider,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = matches!(&cli.command, Command::Translate(a) if !a.no_progress) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Translate(args) => run_translate(args, show_progress, cli.quiet).await,
        Command::Info { input, password, json } => run_info(&input, password.as_deref(), json).await,
        Command::Glossary => {
            println!("{}", build_glossary_note());
            Ok(())
        }
        Command::Annotate { file, preview } => run_annotate(&file, preview),
    }
}

async fn run_translate(args: TranslateArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn TranslationProgressCallback>)
    } else {
        None
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    let config = build_config(&args, progress)?;

    let result = translate(&args.input, &output, &config)
        .await
        .context("Translation failed")?;

    if !quiet {
        let stats = &result.stats;
        eprintln!(
            "{}  pages {}–{} of {}  {} chunks  {} images  {}s  →  {}",
            green("✔"),
            stats.start_page,
            stats.end_page,
            stats.total_pages,
            stats.chunks,
            stats.images,
            stats.total_duration_ms / 1000,
            bold(&result.output_path.display().to_string()),
        );
        if stats.hallucination_retries > 0 || stats.term_fix_discarded > 0 {
            eprintln!(
                "   {} hallucination retries  /  {} term fixes discarded",
                dim(&stats.hallucination_retries.to_string()),
                dim(&stats.term_fix_discarded.to_string()),
            );
        }
        eprintln!("   {} terms annotated", dim(&result.annotations.len().to_string()));
        if let Some(ref path) = result.glossary_path {
            eprintln!("   glossary  →  {}", path.display());
        }
    }
    Ok(())
}

async fn run_info(input: &Path, password: Option<&str>, json: bool) -> Result<()> {
    let info = inspect(input, password).await.context("Failed to inspect PDF")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialize book info")?
        );
        return Ok(());
    }

    println!("File:           {}", info.path.display());
    println!("Pages:          {}", info.page_count);
    println!("Words:          {}", info.total_words);
    println!("Input tokens:   ~{}", info.est_input_tokens);
    println!("Output tokens:  ~{}", info.est_output_tokens);
    println!();
    println!("{}", bold("Preview:"));
    for block in &info.preview {
        let line = block.to_string();
        let short: String = line.chars().take(100).collect();
        println!("  {short}");
    }
    Ok(())
}

fn run_annotate(file: &Path, preview: bool) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let (annotated, changes) = annotate_terms(&text);

    if changes.is_empty() {
        println!("No terms to annotate.");
        return Ok(());
    }
    println!("{} changes:", changes.len());
    for change in &changes {
        println!("{change}");
    }
    if preview {
        println!("{}", dim("(preview: nothing written)"));
        return Ok(());
    }

    let backup = file.with_extension("md.bak");
    std::fs::copy(file, &backup).with_context(|| format!("Failed to write backup {}", backup.display()))?;
    write_document(file, &annotated).context("Failed to write annotated file")?;
    println!("Saved {}  (backup: {})", file.display(), backup.display());
    Ok(())
}

/// Map CLI args to `TranslationConfig`.
fn build_config(args: &TranslateArgs, progress: Option<ProgressCallback>) -> Result<TranslationConfig> {
    let mut builder = TranslationConfig::builder()
        .pages(PageRange::new(args.from_page, args.to_page))
        .chunk_words(args.chunk_words)
        .resume(args.resume)
        .backend(args.backend.into())
        .provider_name(args.provider.clone())
        .ollama_url(args.ollama_url.clone())
        .term_fix(args.term_fix)
        .emit_glossary(args.glossary)
        .image_dpi(args.dpi)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_attempts(args.max_attempts)
        .request_timeout_secs(args.timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref path) = args.checkpoint {
        builder = builder.checkpoint_path(path.clone());
    }
    if let Some(ref title) = args.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `output/<stem>_ua.md`
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    PathBuf::from("output").join(format!("{stem}_ua.md"))
}
