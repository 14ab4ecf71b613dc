//! Merge translated units into one document.
//!
//! Units are ordered by a natural sort key so `page2` precedes `page10`
//! even without zero padding, each unit is trimmed, and consecutive units
//! are joined with a horizontal rule. The merged file is rebuilt from
//! scratch on every run.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::MergeReport;
use crate::stage::{Stage, StageTracker};
use crate::workspace::{write_atomic, PipelineState};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Placed between consecutive units; never after the last one.
pub const UNIT_SEPARATOR: &str = "\n\n---\n\n";

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// One run of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyPart {
    Num(u128),
    Text(String),
}

/// Split `name` into alternating text and digit runs.
///
/// The key always starts with a (possibly empty) text run so two keys line
/// up run for run. Text compares case-insensitively, digits numerically.
pub fn natural_sort_key(name: &str) -> Vec<KeyPart> {
    let mut key = Vec::new();
    let mut last = 0;
    for m in RE_DIGITS.find_iter(name) {
        key.push(KeyPart::Text(name[last..m.start()].to_lowercase()));
        key.push(KeyPart::Num(m.as_str().parse().unwrap_or(u128::MAX)));
        last = m.end();
    }
    key.push(KeyPart::Text(name[last..].to_lowercase()));
    key
}

/// Natural ordering; names with equal keys (`page01` / `page1`) fall back
/// to plain byte order so the result is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a)
        .cmp(&natural_sort_key(b))
        .then_with(|| a.cmp(b))
}

/// Order `(name, content)` pairs naturally by name, trim each content and
/// join them with [`UNIT_SEPARATOR`].
pub fn merge_units<N, C>(units: &[(N, C)]) -> String
where
    N: AsRef<str>,
    C: AsRef<str>,
{
    let mut ordered: Vec<&(N, C)> = units.iter().collect();
    ordered.sort_by(|a, b| natural_cmp(a.0.as_ref(), b.0.as_ref()));
    ordered
        .iter()
        .map(|(_, content)| content.as_ref().trim())
        .collect::<Vec<_>>()
        .join(UNIT_SEPARATOR)
}

/// Merge every translated unit in the working directory into `output/output.md`.
///
/// Fails with [`PipelineError::NoUnitsFound`] and writes nothing when no
/// translated unit exists.
pub fn merge(state: &PipelineState, config: &PipelineConfig) -> Result<MergeReport, PipelineError> {
    let workspace = &state.workspace;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Merged);
    }

    let translated = workspace.translated_units()?;
    if translated.is_empty() {
        return Err(PipelineError::NoUnitsFound {
            dir: workspace.output_dir(),
        });
    }

    let tracker = StageTracker::new(workspace);
    let missing: Vec<usize> = workspace
        .source_units()?
        .into_iter()
        .map(|(index, _)| index)
        .filter(|&index| !tracker.is_complete(Stage::Translated, index))
        .collect();
    if !missing.is_empty() {
        warn!(
            "{} unit(s) have no translation yet and are left out: {:?}",
            missing.len(),
            missing
        );
    }

    let mut units = Vec::with_capacity(translated.len());
    for (_, path) in &translated {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!("Merging {}", path.display());
        units.push((name, content));
    }

    let merged = merge_units(&units);
    let path = workspace.merged_path();
    write_atomic(&path, &merged)?;
    info!("Merged {} units into {}", units.len(), path.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Merged);
    }

    Ok(MergeReport {
        path,
        units: units.len(),
        bytes: merged.len(),
    })
}
