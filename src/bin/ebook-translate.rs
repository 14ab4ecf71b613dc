//! CLI binary for ebook-translate.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `RunRequest` + `PipelineConfig` and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use ebook_translate::{
    run_pipeline, Document, ExistingWorkspace, PipelineConfig, PipelineProgressCallback,
    PipelineReport, ProgressCallback, RunRequest, Stage, TranslatorMode, Workspace,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Terminal progress callback: a spinner per stage, switching to a bar once
/// the translate stage reports how many units there are.
struct CliProgressCallback {
    bar: ProgressBar,
    unit_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once `total` is known.
    fn activate_bar(&self, total: usize) {
        if self.bar.length() == Some(total as u64) {
            return;
        }
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.reset_eta();
    }

    fn elapsed(&self) -> String {
        let secs = self
            .unit_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message("");
    }

    fn on_unit_start(&self, unit: usize, total: usize) {
        self.activate_bar(total);
        if let Ok(mut started) = self.unit_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("unit {unit}"));
    }

    fn on_unit_complete(&self, unit: usize, total: usize, len: usize) {
        self.bar.println(format!(
            "  {} Unit {:>4}/{:<4}  {:<8}  {}",
            green("✓"),
            unit,
            total,
            dim(&format!("{len:>6} bytes")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_unit_skipped(&self, unit: usize, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "  {} Unit {:>4}/{:<4}  {}",
            dim("·"),
            unit,
            total,
            dim("already translated"),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Unit {:>4}/{:<4}  {}  {}",
            red("✗"),
            unit,
            total,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("{} done", stage_label(stage)))));
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Split => "Splitting",
        Stage::Translated => "Translating",
        Stage::Merged => "Merging",
        Stage::Rendered => "Rendering",
        Stage::TocInserted => "Table of contents",
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate a PDF into Chinese, typing translations at the terminal
  ebook-translate -i book.pdf

  # Translate an EPUB from English to German with an LLM
  ebook-translate -i novel.epub -l en --olang de --api

  # Pick provider and model explicitly
  ebook-translate -i book.docx --api --provider anthropic --model claude-sonnet-4-20250514

  # Resume an interrupted run at the translate step
  ebook-translate -i book.pdf --api --start-step 3

  # Start over, discarding an existing working directory
  ebook-translate -i book.pdf --api -y

  # Machine-readable report
  ebook-translate -i book.md --api --json > report.json

STEPS:
  1  init        book_temp/config.txt, pages/, images/, output/
  2  split       pages/page0001.md …
  3  translate   output/output_page0001.md …
  4  merge       output/output.md
  5  render      output/output.html (pandoc)
  6  toc         table of contents inserted into output.html

MANUAL MODE (default, without --api):
  Each unit is printed to stdout. Type the translation, then a line with
  `.end` (or press Ctrl-D). A line with `.skip` abandons the unit; it is
  retried on the next run.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library is used)
  RUST_LOG                Log filter, e.g. ebook_translate=debug

REQUIREMENTS:
  pandoc on PATH for DOCX/EPUB input and for HTML rendering.
  libpdfium for PDF input.
"#;

/// Translate ebooks page by page into a single HTML document.
#[derive(Parser, Debug)]
#[command(
    name = "ebook-translate",
    version,
    about = "Translate PDF, DOCX, EPUB and Markdown books into paginated HTML",
    long_about = "Split an ebook into page units, translate each unit with an LLM or by hand, \
then merge the result and render it as standalone HTML with a table of contents. \
Every step is resumable: finished units are never translated twice.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input ebook (.pdf, .docx, .epub, .md).
    #[arg(short, long, env = "EBOOK_INPUT")]
    input: PathBuf,

    /// Source language code; auto-detected when omitted.
    #[arg(short, long, env = "EBOOK_INPUT_LANG")]
    lang: Option<String>,

    /// Target language code.
    #[arg(long, env = "EBOOK_OUTPUT_LANG", default_value = "zh")]
    olang: String,

    /// Translate with an LLM instead of typing translations by hand.
    #[arg(long, env = "EBOOK_API")]
    api: bool,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// First step to run (1 = init … 6 = table of contents).
    #[arg(long, env = "EBOOK_START_STEP", default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(1..=6))]
    start_step: u8,

    /// Working directory. Default: <input dir>/<input stem>_temp.
    #[arg(long, env = "EBOOK_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Replace an existing working directory without asking.
    #[arg(short = 'y', long, env = "EBOOK_YES")]
    yes: bool,

    /// pandoc HTML template.
    #[arg(long, env = "EBOOK_TEMPLATE")]
    template: Option<PathBuf>,

    /// Stylesheet linked from the HTML output.
    #[arg(long, env = "EBOOK_CSS")]
    css: Option<PathBuf>,

    /// Title of the HTML document.
    #[arg(long, env = "EBOOK_TITLE")]
    title: Option<String>,

    /// Per-unit LLM call timeout in seconds.
    #[arg(long, env = "EBOOK_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Print the pipeline report as JSON on stdout.
    #[arg(long, env = "EBOOK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "EBOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EBOOK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Manual mode owns the terminal, so the bar only runs with --api.
    let show_progress = cli.api && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request ────────────────────────────────────────────────────
    let document = Document::new(&cli.input, cli.lang.as_deref(), cli.olang.as_str())
        .with_context(|| format!("Cannot translate {}", cli.input.display()))?;
    let work_dir = cli
        .work_dir
        .clone()
        .unwrap_or_else(|| Workspace::for_input(&document.path).root().to_path_buf());

    let existing = if cli.start_step == 1 && work_dir.exists() {
        existing_policy(&cli, &work_dir)?
    } else {
        ExistingWorkspace::Reuse
    };

    let request = RunRequest {
        document: Some(document),
        work_dir: Some(work_dir),
        start_step: cli.start_step,
        existing,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn PipelineProgressCallback>),
    )?;

    // ── Run pipeline ─────────────────────────────────────────────────────
    let result = run_pipeline(&request, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let report = result.context("Pipeline failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

/// Ask whether to replace an existing working directory. Anything but an
/// explicit "y" keeps it.
fn existing_policy(cli: &Cli, work_dir: &Path) -> Result<ExistingWorkspace> {
    if cli.yes {
        return Ok(ExistingWorkspace::Replace);
    }
    eprintln!(
        "{} Working directory {} already exists.",
        cyan("⚠"),
        bold(&work_dir.display().to_string())
    );
    eprint!("Remove it and start over? (y/N): ");
    io::stderr().flush().ok();

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    if answer.trim().eq_ignore_ascii_case("y") {
        Ok(ExistingWorkspace::Replace)
    } else {
        eprintln!("{}", dim("Using existing directory."));
        Ok(ExistingWorkspace::Reuse)
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mode = if cli.api {
        TranslatorMode::Api
    } else {
        TranslatorMode::Manual
    };
    let mut builder = PipelineConfig::builder()
        .translator_mode(mode)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref template) = cli.template {
        builder = builder.template(template);
    }
    if let Some(ref css) = cli.css {
        builder = builder.css(css);
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &PipelineReport) {
    if let Some(ref segment) = report.segment {
        eprintln!(
            "   {} units, {} images",
            segment.units.len(),
            segment.image_count()
        );
    }
    if let Some(ref translate) = report.translate {
        let failed = translate.failed.len();
        eprintln!(
            "{}  {} translated, {} already done{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&translate.translated.len().to_string()),
            translate.skipped.len(),
            if failed == 0 {
                String::new()
            } else {
                format!(", {} failed (re-run to retry)", red(&failed.to_string()))
            },
        );
        for error in &translate.failed {
            eprintln!("   {} {}", red("✗"), error);
        }
    }
    if let Some(ref toc) = report.toc {
        if toc.entries > 0 {
            eprintln!("   {} table of contents entries", toc.entries);
        }
    }
    let html = report
        .render
        .as_ref()
        .map(|r| r.path.display().to_string())
        .unwrap_or_else(|| report.work_dir.display().to_string());
    eprintln!(
        "{}  {}ms  →  {}",
        green("✔"),
        report.total_duration_ms,
        bold(&html)
    );
}
