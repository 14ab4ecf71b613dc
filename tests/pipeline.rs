//! End-to-end tests over the library API.
//!
//! Translation and rendering go through in-process stand-ins, so these run
//! without network access, pdfium or pandoc. The one test that exercises the
//! real pandoc renderer is skipped when pandoc is not on PATH.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use ebook_translate::pipeline::merge::merge;
use ebook_translate::{
    build_toc, initialize, merge_units, run_pipeline, Document, ExistingWorkspace,
    PipelineConfig, PipelineError, PipelineState, Renderer, RunRequest, Stage, StageTracker,
    Translator, TranslatorError, UnitError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOOK: &str = "\
# Intro

Hello there.

# Chapter 2

The middle part.

# Intro

Hello again.
";

/// Upper-cases every unit and counts how often it was asked to.
#[derive(Default)]
struct CountingTranslator {
    calls: AtomicUsize,
}

#[async_trait]
impl Translator for CountingTranslator {
    fn name(&self) -> &str {
        "counting"
    }

    async fn translate(
        &self,
        content: &str,
        _target_lang: &str,
        _source_lang: &str,
    ) -> Result<String, TranslatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if content.contains("BROKEN") {
            return Err(TranslatorError::RequestFailed("503 service unavailable".into()));
        }
        Ok(content.to_uppercase())
    }
}

/// Minimal markdown → HTML: `#` headings, `---` rules, everything else a paragraph.
struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    fn name(&self) -> &str {
        "stub"
    }

    async fn render(&self, markdown: &Path, html: &Path) -> Result<(), PipelineError> {
        let text =
            std::fs::read_to_string(markdown).map_err(|e| PipelineError::io(markdown, e))?;
        let mut body = String::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(heading) = line.strip_prefix("# ") {
                body.push_str(&format!("<h1>{heading}</h1>\n"));
            } else if let Some(heading) = line.strip_prefix("## ") {
                body.push_str(&format!("<h2>{heading}</h2>\n"));
            } else if line == "---" {
                body.push_str("<hr />\n");
            } else {
                body.push_str(&format!("<p>{line}</p>\n"));
            }
        }
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<title>Book</title>\n</head>\n<body>\n{body}</body>\n</html>\n"
        );
        std::fs::write(html, page).map_err(|e| PipelineError::io(html, e))
    }
}

fn write_book(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("book.md");
    std::fs::write(&path, content).unwrap();
    path
}

fn config_with(translator: Arc<CountingTranslator>) -> PipelineConfig {
    PipelineConfig::builder()
        .translator(translator as Arc<dyn Translator>)
        .renderer(Arc::new(StubRenderer))
        .build()
        .unwrap()
}

/// Library logs for `--nocapture` runs; `RUST_LOG` picks the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pandoc_available() -> bool {
    std::process::Command::new("pandoc")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn markdown_book_runs_end_to_end() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let translator = Arc::new(CountingTranslator::default());
    let config = config_with(Arc::clone(&translator));

    let document = Document::new(&input, Some("en"), "zh").unwrap();
    let report = run_pipeline(&RunRequest::new(document), &config)
        .await
        .unwrap();

    assert_eq!(report.work_dir, dir.path().join("book_temp"));
    assert_eq!(
        report.stages_run,
        vec![
            Stage::Split,
            Stage::Translated,
            Stage::Merged,
            Stage::Rendered,
            Stage::TocInserted
        ]
    );
    assert_eq!(report.segment.as_ref().unwrap().units.len(), 3);
    assert_eq!(report.translate.as_ref().unwrap().translated, vec![1, 2, 3]);
    assert_eq!(translator.calls.load(Ordering::SeqCst), 3);

    let merged = std::fs::read_to_string(&report.merge.as_ref().unwrap().path).unwrap();
    assert_eq!(
        merged,
        "# INTRO\n\nHELLO THERE.\n\n---\n\n# CHAPTER 2\n\nTHE MIDDLE PART.\n\n---\n\n# INTRO\n\nHELLO AGAIN."
    );

    let toc = report.toc.as_ref().unwrap();
    assert_eq!(toc.entries, 3);
    assert_eq!(toc.anchors_added, 3);

    let html = std::fs::read_to_string(&toc.path).unwrap();
    assert_eq!(html.matches("data-ebook-toc").count(), 1);
    assert!(html.contains("<a href=\"#heading-1-intro\">INTRO</a>"));
    assert!(html.contains("<a href=\"#heading-2-chapter-2\">CHAPTER 2</a>"));
    assert!(html.contains("<a href=\"#heading-3-intro\">INTRO</a>"));
    assert!(html.contains("<h1 id=\"heading-3-intro\">INTRO</h1>"));
}

#[tokio::test]
async fn rerun_is_idempotent_and_skips_finished_units() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let translator = Arc::new(CountingTranslator::default());
    let config = config_with(Arc::clone(&translator));
    let document = Document::new(&input, None, "zh").unwrap();

    let first = run_pipeline(&RunRequest::new(document.clone()), &config)
        .await
        .unwrap();
    let html_path = first.toc.as_ref().unwrap().path.clone();
    let first_html = std::fs::read(&html_path).unwrap();
    let first_merged = std::fs::read(first.merge.as_ref().unwrap().path.clone()).unwrap();

    let mut again = RunRequest::new(document);
    again.existing = ExistingWorkspace::Reuse;
    let second = run_pipeline(&again, &config).await.unwrap();

    assert_eq!(translator.calls.load(Ordering::SeqCst), 3);
    let translate = second.translate.as_ref().unwrap();
    assert!(translate.translated.is_empty());
    assert_eq!(translate.skipped, vec![1, 2, 3]);
    assert_eq!(
        std::fs::read(second.merge.as_ref().unwrap().path.clone()).unwrap(),
        first_merged
    );
    assert_eq!(std::fs::read(&html_path).unwrap(), first_html);
}

#[tokio::test]
async fn existing_workspace_is_refused_without_confirmation() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let config = config_with(Arc::new(CountingTranslator::default()));
    let document = Document::new(&input, None, "zh").unwrap();

    run_pipeline(&RunRequest::new(document.clone()), &config)
        .await
        .unwrap();
    let err = run_pipeline(&RunRequest::new(document), &config)
        .await
        .unwrap_err();
    match err {
        PipelineError::WorkspaceExists { path } => {
            assert_eq!(path, dir.path().join("book_temp"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_unit_is_retried_on_the_next_run() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), "# One\n\nfine\n\n# Two\n\nBROKEN\n");
    let translator = Arc::new(CountingTranslator::default());
    let config = config_with(Arc::clone(&translator));
    let document = Document::new(&input, None, "de").unwrap();

    let report = run_pipeline(&RunRequest::new(document.clone()), &config)
        .await
        .unwrap();
    let translate = report.translate.as_ref().unwrap();
    assert_eq!(translate.translated, vec![1]);
    assert!(matches!(
        translate.failed.as_slice(),
        [UnitError::TranslationRequestFailed { unit: 2, .. }]
    ));
    // The merge still runs over what was translated.
    let merged = std::fs::read_to_string(&report.merge.as_ref().unwrap().path).unwrap();
    assert_eq!(merged, "# ONE\n\nFINE");

    // Fix the source unit by hand and resume at the translate step.
    let work_dir = report.work_dir.clone();
    std::fs::write(work_dir.join("pages").join("page0002.md"), "# Two\n\nrepaired\n").unwrap();
    let resumed = run_pipeline(&RunRequest::resume(&work_dir, 3), &config)
        .await
        .unwrap();
    let translate = resumed.translate.as_ref().unwrap();
    assert_eq!(translate.skipped, vec![1]);
    assert_eq!(translate.translated, vec![2]);
    assert_eq!(translator.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn toc_is_inserted_only_once() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let config = config_with(Arc::new(CountingTranslator::default()));
    let document = Document::new(&input, None, "zh").unwrap();

    let report = run_pipeline(&RunRequest::new(document), &config)
        .await
        .unwrap();
    let html_path = report.toc.as_ref().unwrap().path.clone();
    let before = std::fs::read(&html_path).unwrap();

    let again = run_pipeline(&RunRequest::resume(&report.work_dir, 6), &config)
        .await
        .unwrap();
    assert_eq!(again.stages_run, vec![Stage::TocInserted]);
    assert_eq!(again.toc.as_ref().unwrap().entries, 0);
    assert_eq!(std::fs::read(&html_path).unwrap(), before);

    let state = PipelineState::load(&report.work_dir).unwrap();
    assert!(StageTracker::new(&state.workspace).is_complete(Stage::TocInserted, 0));
}

#[tokio::test]
async fn heading_called_table_of_contents_still_gets_a_toc() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let config = config_with(Arc::new(CountingTranslator::default()));
    let document = Document::new(&input, None, "zh").unwrap();
    let state = initialize(document, None, ExistingWorkspace::Refuse).unwrap();

    let html_path = state.workspace.html_path();
    std::fs::write(
        &html_path,
        "<html><head></head><body>\n\
         <h1 id=\"table-of-contents\">Table of Contents</h1>\n\
         <h1 id=\"chapter-1\">Chapter 1</h1>\n\
         </body></html>",
    )
    .unwrap();

    let report = run_pipeline(&RunRequest::resume(state.workspace.root(), 6), &config)
        .await
        .unwrap();
    let toc = report.toc.as_ref().unwrap();
    assert_eq!(toc.entries, 2);
    assert_eq!(toc.anchors_added, 0);

    let html = std::fs::read_to_string(&html_path).unwrap();
    assert_eq!(html.matches("data-ebook-toc").count(), 1);
    assert_eq!(html.matches("id=\"table-of-contents\"").count(), 1);
    assert!(html.contains("<a href=\"#table-of-contents\">Table of Contents</a>"));
    assert!(html.contains("<a href=\"#chapter-1\">Chapter 1</a>"));
}

#[test]
fn resuming_before_merge_reports_missing_translations() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let config = config_with(Arc::new(CountingTranslator::default()));
    let document = Document::new(&input, None, "zh").unwrap();
    let state = initialize(document, None, ExistingWorkspace::Refuse).unwrap();

    let err = tokio_test::block_on(run_pipeline(
        &RunRequest::resume(state.workspace.root(), 5),
        &config,
    ))
    .unwrap_err();
    match err {
        PipelineError::PrerequisiteMissing { stage, path } => {
            assert_eq!(stage, Stage::Rendered);
            assert_eq!(path, state.workspace.merged_path());
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Merge ────────────────────────────────────────────────────────────────────

#[test]
fn merge_joins_units_with_a_rule_and_no_trailing_separator() {
    let units = [("output_page0001.md", "A"), ("output_page0002.md", "B")];
    assert_eq!(merge_units(&units[..]), "A\n\n---\n\nB");
}

#[test]
fn merge_orders_units_naturally() {
    let units = [
        ("output_page10.md", "ten"),
        ("output_page2.md", "two"),
        ("output_page1.md", "one"),
    ];
    assert_eq!(
        merge_units(&units[..]),
        "one\n\n---\n\ntwo\n\n---\n\nten"
    );
}

#[test]
fn merge_without_translations_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let document = Document::new(&input, None, "zh").unwrap();
    let state = initialize(document, None, ExistingWorkspace::Refuse).unwrap();

    let err = merge(&state, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::NoUnitsFound { .. }));
    assert!(!state.workspace.merged_path().exists());
}

// ── Table of contents ────────────────────────────────────────────────────────

#[test]
fn duplicate_headings_get_distinct_anchors() {
    let html = "<html><head></head><body><h1>Intro</h1><p>a</p><h2>Setup</h2><h1>Intro</h1></body></html>";
    let outcome = build_toc(html, "Contents").unwrap();

    let anchors: Vec<&str> = outcome.headings.iter().map(|h| h.anchor.as_str()).collect();
    assert_eq!(
        anchors,
        vec!["heading-1-intro", "heading-2-setup", "heading-3-intro"]
    );
    assert!(outcome.html.contains("<h1 id=\"heading-1-intro\">Intro</h1>"));
    assert!(outcome.html.contains("<h1 id=\"heading-3-intro\">Intro</h1>"));
    assert!(outcome.html.contains("  <li><a href=\"#heading-2-setup\">Setup</a></li>"));
}

#[test]
fn document_without_headings_is_left_unchanged() {
    let html = "<!DOCTYPE html>\n<html><body><p>No structure here.</p></body></html>\n";
    let outcome = build_toc(html, "Contents").unwrap();
    assert!(outcome.headings.is_empty());
    assert_eq!(outcome.html, html);
}

// ── Config store ─────────────────────────────────────────────────────────────

#[test]
fn pipeline_state_survives_a_round_trip_through_config_txt() {
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let document = Document::new(&input, None, "ja").unwrap();
    let work_dir = dir.path().join("elsewhere");

    let state = initialize(document, Some(work_dir.clone()), ExistingWorkspace::Refuse).unwrap();
    let config_txt = std::fs::read_to_string(work_dir.join("config.txt")).unwrap();
    assert!(config_txt.contains("INPUT_LANG=auto"));
    assert!(config_txt.contains("OUTPUT_LANG=ja"));

    let loaded = PipelineState::load(&work_dir).unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.document.source_lang, "auto");
}

// ── pandoc ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pandoc_renders_a_navigable_document() {
    if !pandoc_available() {
        println!("SKIP - pandoc not found on PATH");
        return;
    }
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = write_book(dir.path(), BOOK);
    let config = PipelineConfig::builder()
        .translator(Arc::new(CountingTranslator::default()) as Arc<dyn Translator>)
        .title("Stub Book")
        .build()
        .unwrap();
    let document = Document::new(&input, None, "zh").unwrap();

    let report = run_pipeline(&RunRequest::new(document), &config)
        .await
        .unwrap();
    let html = std::fs::read_to_string(&report.render.as_ref().unwrap().path).unwrap();
    assert_eq!(html.matches("data-ebook-toc").count(), 1);
    assert!(html.contains("CHAPTER 2"));
    assert!(report.toc.as_ref().unwrap().entries >= 3);
}
