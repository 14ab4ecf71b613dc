//! Stage tracking inferred from artifact existence.
//!
//! A page unit moves through `Split → Translated → Merged → Rendered →
//! TocInserted`. Nothing records that progress except the artifacts
//! themselves: a unit is translated once `output/output_page{NNNN}.md`
//! exists, the document is rendered once `output/output.html` exists, and
//! so on. Every skip-if-done and prerequisite check in the pipeline goes
//! through [`StageTracker`] so the rule lives in exactly one place.

use crate::error::PipelineError;
use crate::pipeline::toc::has_toc_block;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Split,
    Translated,
    Merged,
    Rendered,
    TocInserted,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Split,
        Stage::Translated,
        Stage::Merged,
        Stage::Rendered,
        Stage::TocInserted,
    ];

    /// The stage whose artifact must exist before this one may run.
    pub fn predecessor(self) -> Option<Stage> {
        match self {
            Stage::Split => None,
            Stage::Translated => Some(Stage::Split),
            Stage::Merged => Some(Stage::Translated),
            Stage::Rendered => Some(Stage::Merged),
            Stage::TocInserted => Some(Stage::Rendered),
        }
    }

    /// `true` for stages with one artifact per page unit.
    pub fn is_per_unit(self) -> bool {
        matches!(self, Stage::Split | Stage::Translated)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Split => "split",
            Stage::Translated => "translated",
            Stage::Merged => "merged",
            Stage::Rendered => "rendered",
            Stage::TocInserted => "toc_inserted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answers "has this stage already produced its artifact?".
#[derive(Debug, Clone, Copy)]
pub struct StageTracker<'a> {
    workspace: &'a Workspace,
}

impl<'a> StageTracker<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    /// Path of the artifact a stage produces.
    ///
    /// `unit` is the 1-based sequence index for per-unit stages and is
    /// ignored for document-level stages.
    pub fn artifact(&self, stage: Stage, unit: usize) -> PathBuf {
        match stage {
            Stage::Split => self.workspace.page_path(unit),
            Stage::Translated => self.workspace.translated_path(unit),
            Stage::Merged => self.workspace.merged_path(),
            Stage::Rendered | Stage::TocInserted => self.workspace.html_path(),
        }
    }

    /// `true` when the stage's artifact for `unit` already exists.
    ///
    /// `TocInserted` shares its file with `Rendered`, so it is complete only
    /// when the rendered HTML already carries the marked navigation block.
    pub fn is_complete(&self, stage: Stage, unit: usize) -> bool {
        let path = self.artifact(stage, unit);
        match stage {
            Stage::TocInserted => std::fs::read_to_string(&path)
                .ok()
                .and_then(|html| has_toc_block(&html).ok())
                .unwrap_or(false),
            _ => path.is_file(),
        }
    }

    /// `true` once the segmenter has written every source unit.
    ///
    /// Units on disk without the marker are the remains of an interrupted
    /// split and do not count.
    pub fn split_finished(&self) -> bool {
        self.workspace.split_marker_path().is_file()
    }

    /// Fail with [`PipelineError::PrerequisiteMissing`] unless the
    /// predecessor of `stage` is complete for `unit`.
    ///
    /// Returns the predecessor's artifact path.
    pub fn require_predecessor(&self, stage: Stage, unit: usize) -> Result<PathBuf, PipelineError> {
        let Some(previous) = stage.predecessor() else {
            return Ok(self.workspace.root().to_path_buf());
        };
        let path = self.artifact(previous, unit);
        if self.is_complete(previous, unit) {
            Ok(path)
        } else {
            Err(PipelineError::PrerequisiteMissing { stage, path })
        }
    }

    /// Latest stage completed for a unit, if any.
    pub fn status(&self, unit: usize) -> Option<Stage> {
        Stage::ALL
            .iter()
            .copied()
            .take_while(|&stage| self.is_complete(stage, unit))
            .last()
    }
}
