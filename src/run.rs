//! Pipeline orchestration: steps 1-6 in order, or a resumed tail of them.
//!
//! | Step | Stage      | Artifact                         |
//! |------|------------|----------------------------------|
//! | 1    | init       | `config.txt`, empty sub-dirs     |
//! | 2    | segment    | `pages/page{NNNN}.md`, `images/` |
//! | 3    | translate  | `output/output_page{NNNN}.md`    |
//! | 4    | merge      | `output/output.md`               |
//! | 5    | render     | `output/output.html`             |
//! | 6    | toc        | `output/output.html` (in place)  |
//!
//! Starting after step 1 loads the pipeline state from `config.txt` instead
//! of initialising. Every step that finds its work already done skips it,
//! so re-running the whole pipeline after a failure is safe.

use crate::config::PipelineConfig;
use crate::document::Document;
use crate::error::PipelineError;
use crate::output::PipelineReport;
use crate::pipeline::render::{render_html, PandocRenderer, Renderer};
use crate::pipeline::{merge, segment, toc, translate};
use crate::stage::Stage;
use crate::translator::resolve_translator;
use crate::workspace::{initialize, ExistingWorkspace, PipelineState, Workspace};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 6;

/// Human-readable name of a step number.
pub fn step_name(step: u8) -> &'static str {
    match step {
        1 => "initialise",
        2 => "split",
        3 => "translate",
        4 => "merge",
        5 => "render",
        6 => "table of contents",
        _ => "unknown",
    }
}

/// What to run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source document. Required when starting at step 1.
    pub document: Option<Document>,
    /// Working directory. Defaults to `<input parent>/<input stem>_temp`.
    pub work_dir: Option<PathBuf>,
    /// First step to run, 1..=6.
    pub start_step: u8,
    /// Policy for an existing working directory at step 1.
    pub existing: ExistingWorkspace,
}

impl RunRequest {
    /// Full run of `document` with the default working directory.
    pub fn new(document: Document) -> Self {
        Self {
            document: Some(document),
            work_dir: None,
            start_step: FIRST_STEP,
            existing: ExistingWorkspace::Refuse,
        }
    }

    /// Resume an existing working directory from `start_step`.
    pub fn resume(work_dir: impl Into<PathBuf>, start_step: u8) -> Self {
        Self {
            document: None,
            work_dir: Some(work_dir.into()),
            start_step,
            existing: ExistingWorkspace::Reuse,
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if !(FIRST_STEP..=LAST_STEP).contains(&self.start_step) {
            return Err(PipelineError::InvalidConfig(format!(
                "start step must be between {FIRST_STEP} and {LAST_STEP}, got {}",
                self.start_step
            )));
        }
        if self.start_step == FIRST_STEP && self.document.is_none() {
            return Err(PipelineError::InvalidConfig(
                "an input document is required to initialise the pipeline".into(),
            ));
        }
        if self.document.is_none() && self.work_dir.is_none() {
            return Err(PipelineError::InvalidConfig(
                "resuming needs either an input document or a working directory".into(),
            ));
        }
        Ok(())
    }
}

/// Run the pipeline from `request.start_step` through step 6.
///
/// # Errors
/// Returns `Err(PipelineError)` for the first stage-fatal failure. Per-unit
/// translation failures do not stop the run; they are listed in
/// `report.translate.failed`.
pub async fn run_pipeline(
    request: &RunRequest,
    config: &PipelineConfig,
) -> Result<PipelineReport, PipelineError> {
    let total_start = Instant::now();
    request.validate()?;

    // ── Step 1: Initialise or load state ─────────────────────────────────
    let state = if request.start_step == FIRST_STEP {
        let document = request
            .document
            .clone()
            .ok_or_else(|| PipelineError::Internal("document checked by validate".into()))?;
        info!("Step 1: initialising working directory for {}", document.path.display());
        initialize(document, request.work_dir.clone(), request.existing)?
    } else {
        let work_dir = match (&request.work_dir, &request.document) {
            (Some(dir), _) => dir.clone(),
            (None, Some(doc)) => Workspace::for_input(&doc.path).root().to_path_buf(),
            (None, None) => {
                return Err(PipelineError::Internal("work dir checked by validate".into()))
            }
        };
        info!(
            "Resuming from step {} ({}) in {}",
            request.start_step,
            step_name(request.start_step),
            work_dir.display()
        );
        PipelineState::load(work_dir)?
    };

    let mut report = PipelineReport {
        work_dir: state.workspace.root().to_path_buf(),
        ..Default::default()
    };
    let runs = |step: u8| request.start_step <= step;

    // ── Step 2: Split into page units ────────────────────────────────────
    if runs(2) {
        report.segment = Some(segment::segment(&state, config).await?);
        report.stages_run.push(Stage::Split);
    }

    // ── Step 3: Translate ────────────────────────────────────────────────
    if runs(3) {
        let translator = resolve_translator(config)?;
        let translated = translate::translate_units(&state, translator.as_ref(), config).await?;
        if !translated.is_complete() {
            warn!(
                "{} unit(s) failed to translate; re-run to retry them",
                translated.failed.len()
            );
        }
        report.translate = Some(translated);
        report.stages_run.push(Stage::Translated);
    }

    // ── Step 4: Merge ────────────────────────────────────────────────────
    if runs(4) {
        report.merge = Some(merge::merge(&state, config)?);
        report.stages_run.push(Stage::Merged);
    }

    // ── Step 5: Render ───────────────────────────────────────────────────
    if runs(5) {
        let renderer: Arc<dyn Renderer> = match config.renderer {
            Some(ref renderer) => Arc::clone(renderer),
            None => Arc::new(PandocRenderer::from_config(config)),
        };
        report.render = Some(render_html(&state, renderer.as_ref(), config).await?);
        report.stages_run.push(Stage::Rendered);
    }

    // ── Step 6: Table of contents ────────────────────────────────────────
    if runs(6) {
        report.toc = Some(toc::insert_toc(&state, config)?);
        report.stages_run.push(Stage::TocInserted);
    }

    report.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Pipeline finished in {}ms: {}",
        report.total_duration_ms,
        state.workspace.root().display()
    );
    Ok(report)
}

/// Synchronous wrapper around [`run_pipeline`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_pipeline_sync(
    request: &RunRequest,
    config: &PipelineConfig,
) -> Result<PipelineReport, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_pipeline(request, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_step_is_bounded() {
        let err = RunRequest::resume("/w", 7).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        let err = RunRequest::resume("/w", 0).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert!(RunRequest::resume("/w", 4).validate().is_ok());
    }

    #[test]
    fn step_one_needs_a_document() {
        let err = RunRequest::resume("/w", 1).validate().unwrap_err();
        assert!(err.to_string().contains("input document"));
    }

    #[test]
    fn resuming_a_missing_workspace_reports_the_config_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = RunRequest::resume(dir.path().join("nothing_here"), 4);
        let err = run_pipeline_sync(&request, &PipelineConfig::default()).unwrap_err();
        match err {
            PipelineError::PrerequisiteMissing { path, .. } => {
                assert!(path.ends_with("config.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn step_names() {
        assert_eq!(step_name(3), "translate");
        assert_eq!(step_name(6), "table of contents");
    }
}
