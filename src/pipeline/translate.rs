//! Translate stage: one translator call per page unit, in ascending order.
//!
//! A unit whose translated artifact already exists is skipped without
//! touching the translator, so a re-run only works on what is missing. A
//! unit that fails is logged and reported; the stage carries on with the
//! next one and no artifact is written for the failed unit.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::TranslateReport;
use crate::stage::{Stage, StageTracker};
use crate::translator::Translator;
use crate::workspace::{write_atomic, PipelineState};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Translate every source unit that has no translation yet.
///
/// Fails with [`PipelineError::NoUnitsFound`] when `pages/` holds no units.
pub async fn translate_units(
    state: &PipelineState,
    translator: &dyn Translator,
    config: &PipelineConfig,
) -> Result<TranslateReport, PipelineError> {
    let start = Instant::now();
    let workspace = &state.workspace;
    let document = &state.document;
    let tracker = StageTracker::new(workspace);

    let units = workspace.source_units()?;
    if units.is_empty() {
        return Err(PipelineError::NoUnitsFound {
            dir: workspace.pages_dir(),
        });
    }
    let total = units.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Translated);
    }
    info!(
        "Translating {} units to '{}' with the {} translator",
        total,
        document.target_lang,
        translator.name()
    );

    let mut report = TranslateReport {
        total_units: total,
        ..Default::default()
    };

    for (index, _) in units {
        if tracker.is_complete(Stage::Translated, index) {
            debug!("Unit {} already translated, skipping", index);
            report.skipped.push(index);
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_skipped(index, total);
            }
            continue;
        }

        let source_path = tracker.require_predecessor(Stage::Translated, index)?;
        let content =
            std::fs::read_to_string(&source_path).map_err(|e| PipelineError::io(&source_path, e))?;

        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_start(index, total);
        }

        match translator
            .translate(&content, &document.target_lang, &document.source_lang)
            .await
        {
            Ok(translated) => {
                let target = tracker.artifact(Stage::Translated, index);
                write_atomic(&target, &translated)?;
                info!("Translated unit {}/{} → {}", index, total, target.display());
                report.translated.push(index);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_unit_complete(index, total, translated.len());
                }
            }
            Err(e) => {
                let unit_error = e.into_unit_error(index);
                warn!("{}", unit_error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_unit_error(index, total, &unit_error.to_string());
                }
                report.failed.push(unit_error);
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Translation finished: {} translated, {} skipped, {} failed",
        report.translated.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Translated);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::error::{TranslatorError, UnitError};
    use crate::workspace::{initialize, ExistingWorkspace};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Upper-cases content; fails on any unit containing "FAIL".
    #[derive(Default)]
    struct Upper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn translate(
            &self,
            content: &str,
            _target_lang: &str,
            _source_lang: &str,
        ) -> Result<String, TranslatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if content.contains("FAIL") {
                return Err(TranslatorError::RequestFailed("connection reset".into()));
            }
            Ok(content.to_uppercase())
        }
    }

    fn state_with_units(units: &[&str]) -> (TempDir, PipelineState) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("book.md");
        std::fs::write(&input, "# x\n").unwrap();
        let doc = Document::new(&input, Some("en"), "zh").unwrap();
        let state = initialize(doc, None, ExistingWorkspace::Refuse).unwrap();
        for (i, content) in units.iter().enumerate() {
            std::fs::write(state.workspace.page_path(i + 1), content).unwrap();
        }
        (dir, state)
    }

    #[tokio::test]
    async fn failed_unit_does_not_stop_the_batch() {
        let (_dir, state) = state_with_units(&["# one", "# FAIL", "# three"]);
        let translator = Upper::default();

        let report = translate_units(&state, &translator, &PipelineConfig::default())
            .await
            .unwrap();
        assert_eq!(report.translated, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0],
            UnitError::TranslationRequestFailed { unit: 2, .. }
        ));
        assert!(!report.is_complete());

        let ws = &state.workspace;
        assert_eq!(std::fs::read_to_string(ws.translated_path(3)).unwrap(), "# THREE");
        assert!(!ws.translated_path(2).exists());
    }

    #[tokio::test]
    async fn existing_translation_is_not_requested_again() {
        let (_dir, state) = state_with_units(&["# one", "# two"]);
        std::fs::write(state.workspace.translated_path(1), "已翻译").unwrap();
        let translator = Upper::default();

        let report = translate_units(&state, &translator, &PipelineConfig::default())
            .await
            .unwrap();
        assert_eq!(report.skipped, vec![1]);
        assert_eq!(report.translated, vec![2]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            std::fs::read_to_string(state.workspace.translated_path(1)).unwrap(),
            "已翻译"
        );
    }

    #[tokio::test]
    async fn no_units_is_an_error() {
        let (_dir, state) = state_with_units(&[]);
        let err = translate_units(&state, &Upper::default(), &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoUnitsFound { .. }));
    }
}
