//! Per-stage reports returned by the pipeline.

use crate::error::UnitError;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One page unit as written by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUnit {
    /// 1-based, contiguous over the units kept.
    pub index: usize,
    pub path: PathBuf,
    /// Image assets owned by this unit's page.
    pub images: Vec<ImageAsset>,
}

/// A binary resource extracted alongside a page unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub page: usize,
    /// 1-based index within the page.
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentReport {
    pub units: Vec<PageUnit>,
    /// Flowed-format segments dropped because they were blank.
    pub dropped_empty: usize,
}

impl SegmentReport {
    pub fn image_count(&self) -> usize {
        self.units.iter().map(|u| u.images.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateReport {
    pub total_units: usize,
    /// Units translated during this run.
    pub translated: Vec<usize>,
    /// Units whose translation already existed.
    pub skipped: Vec<usize>,
    pub failed: Vec<UnitError>,
    pub duration_ms: u64,
}

impl TranslateReport {
    /// `true` when every unit now has a translation.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub path: PathBuf,
    pub units: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub path: PathBuf,
    pub images_copied: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocReport {
    pub path: PathBuf,
    /// Number of entries in the navigation block; 0 means the HTML was left untouched.
    pub entries: usize,
    /// Headings that received a synthesized anchor.
    pub anchors_added: usize,
}

/// Everything a full (or resumed) run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineReport {
    pub work_dir: PathBuf,
    pub stages_run: Vec<Stage>,
    pub segment: Option<SegmentReport>,
    pub translate: Option<TranslateReport>,
    pub merge: Option<MergeReport>,
    pub render: Option<RenderReport>,
    pub toc: Option<TocReport>,
    pub total_duration_ms: u64,
}
