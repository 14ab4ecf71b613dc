//! # ebook-translate
//!
//! Translate a PDF, DOCX, EPUB or Markdown book page by page and reassemble
//! it as a single HTML document with a table of contents.
//!
//! ## Pipeline Overview
//!
//! ```text
//! book.pdf
//!  │
//!  ├─ 1. Init       book_temp/config.txt + pages/ images/ output/
//!  ├─ 2. Split      one markdown unit per page (PDF) or top-level heading
//!  ├─ 3. Translate  one LLM request per unit, or an operator at the terminal
//!  ├─ 4. Merge      natural order, units joined with `---`
//!  ├─ 5. Render     pandoc → standalone HTML
//!  └─ 6. TOC        heading anchors + navigation block
//! ```
//!
//! All state lives in the working directory. A unit is translated once its
//! `output/output_page{NNNN}.md` exists, so an interrupted run can simply be
//! started again: finished units are skipped, failed ones are retried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ebook_translate::{run_pipeline, Document, PipelineConfig, RunRequest, TranslatorMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = PipelineConfig::builder()
//!         .translator_mode(TranslatorMode::Api)
//!         .build()?;
//!     let document = Document::new("book.pdf", None, "zh")?;
//!     let report = run_pipeline(&RunRequest::new(document), &config).await?;
//!     println!("{}", report.work_dir.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ebook-translate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External tools
//!
//! PDF extraction needs the pdfium shared library (system-wide, or the file
//! named by `PDFIUM_LIB_PATH`). DOCX/EPUB conversion and HTML rendering need
//! `pandoc` on `PATH`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod stage;
pub mod translator;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, TranslatorMode};
pub use document::{Document, DocumentFormat, AUTO_LANGUAGE};
pub use error::{PipelineError, TranslatorError, UnitError};
pub use output::{
    ImageAsset, MergeReport, PageUnit, PipelineReport, RenderReport, SegmentReport, TocReport,
    TranslateReport,
};
pub use pipeline::merge::{merge_units, natural_cmp};
pub use pipeline::render::{PandocRenderer, Renderer};
pub use pipeline::toc::build_toc;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{run_pipeline, run_pipeline_sync, RunRequest};
pub use stage::{Stage, StageTracker};
pub use translator::{ApiTranslator, ManualTranslator, Translator};
pub use workspace::{initialize, ConfigFile, ExistingWorkspace, PipelineState, Workspace};
