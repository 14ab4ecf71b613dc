//! Error types for the ebook-translate library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PipelineError`] - **Fatal for the stage**: the stage cannot proceed
//!   (unknown input format, converter crash, missing predecessor artifact,
//!   nothing to merge). Returned as `Err(PipelineError)` from every stage
//!   function and from [`crate::run::run_pipeline`].
//!
//! * [`UnitError`] - **Non-fatal**: a single page unit failed to translate
//!   but every other unit is fine. Collected in
//!   [`crate::output::TranslateReport`] so the batch keeps going and a later
//!   re-run picks the unit up again.
//!
//! * [`TranslatorError`] - what a [`crate::translator::Translator`] returns.
//!   The translate stage knows which unit it was working on and turns it into
//!   a [`UnitError`].

use crate::stage::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All stage-fatal errors returned by the ebook-translate library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Input extension is not one of pdf, docx, epub, md.
    #[error("Unsupported input format '{extension}' for '{path}'\nSupported: .pdf, .docx, .epub, .md")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The document-conversion library or tool failed.
    #[error("Conversion of '{path}' failed: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    // ── Workspace errors ──────────────────────────────────────────────────
    /// The working directory already exists and re-initialisation was not confirmed.
    #[error("Working directory '{path}' already exists.\nRe-run with --yes to replace it, or resume with --start-step.")]
    WorkspaceExists { path: PathBuf },

    /// A stage ran before its predecessor produced its artifact.
    #[error("Cannot run stage '{stage}': prerequisite '{path}' does not exist")]
    PrerequisiteMissing { stage: Stage, path: PathBuf },

    /// Merge or translate found nothing to work on.
    #[error("No page units found in '{dir}'")]
    NoUnitsFound { dir: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed, or `config.txt` is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `config.txt` lacks a key every stage relies on.
    #[error("Config file '{path}' is missing key '{key}'")]
    ConfigMissingKey { path: PathBuf, key: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The configured LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The HTML renderer failed or is not installed.
    #[error("Rendering '{path}' to HTML failed: {detail}")]
    RenderFailed { path: PathBuf, detail: String },

    /// The table of contents could not be injected.
    #[error("Table of contents generation for '{path}' failed: {detail}")]
    TocFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a workspace artifact failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single page unit.
///
/// The unit is left untranslated; re-running the translate stage retries it
/// because no translated artifact was written.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// Transport failure or malformed response from the translation provider.
    #[error("Unit {unit}: translation request failed: {detail}")]
    TranslationRequestFailed { unit: usize, detail: String },

    /// The provider did not answer within the configured timeout.
    #[error("Unit {unit}: translation timed out after {secs}s")]
    Timeout { unit: usize, secs: u64 },

    /// The operator abandoned the unit during manual translation.
    #[error("Unit {unit}: abandoned by operator")]
    Abandoned { unit: usize },
}

impl UnitError {
    /// 1-based sequence index of the failed unit.
    pub fn unit(&self) -> usize {
        match self {
            UnitError::TranslationRequestFailed { unit, .. }
            | UnitError::Timeout { unit, .. }
            | UnitError::Abandoned { unit } => *unit,
        }
    }
}

/// Failure reported by a translator adapter for one piece of content.
#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("abandoned by operator")]
    Abandoned,
}

impl TranslatorError {
    /// Attach the unit index the failure belongs to.
    pub fn into_unit_error(self, unit: usize) -> UnitError {
        match self {
            TranslatorError::RequestFailed(detail) | TranslatorError::MalformedResponse(detail) => {
                UnitError::TranslationRequestFailed { unit, detail }
            }
            TranslatorError::Timeout(secs) => UnitError::Timeout { unit, secs },
            TranslatorError::Abandoned => UnitError::Abandoned { unit },
        }
    }
}
