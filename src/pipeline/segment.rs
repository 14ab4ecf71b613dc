//! Segmenter: split extracted content into numbered page units.
//!
//! Paginated input yields one unit per physical page, each opened with a
//! synthetic `# Page N` heading and followed by links to the page's images.
//! Flowed input is cut before every top-level `# ` heading that is not
//! inside a fenced code block; blank segments are dropped and the kept ones
//! are numbered 1, 2, 3, ... with no gaps.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{ImageAsset, PageUnit, SegmentReport};
use crate::pipeline::extract::{extract, Extracted, ExtractedPage};
use crate::stage::{Stage, StageTracker};
use crate::workspace::{image_file_name, write_atomic, PipelineState, Workspace, IMAGES_DIR};
use image::ImageFormat;
use tracing::{debug, info, warn};

/// Content of one PDF page unit.
///
/// ```text
/// # Page N
///
/// {text}
///
/// ## Images            (only when the page has images)
///
/// ![Image 1](../images/page{NNNN}_img001.png)
/// ```
pub fn render_page_unit(index: usize, text: &str, image_count: usize) -> String {
    let mut unit = format!("# Page {index}\n\n{text}\n\n");
    if image_count > 0 {
        let links: Vec<String> = (1..=image_count)
            .map(|m| {
                format!(
                    "![Image {m}](../{IMAGES_DIR}/{})",
                    image_file_name(index, m)
                )
            })
            .collect();
        unit.push_str("## Images\n\n");
        unit.push_str(&links.join("\n\n"));
        unit.push_str("\n\n");
    }
    unit
}

/// Split a markdown stream before each top-level heading.
///
/// Returns the raw segments, blank ones included, in order; concatenating
/// them gives back `markdown` exactly.
pub fn split_markdown(markdown: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut fence: Option<&str> = None;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None => {
                if trimmed.starts_with("```") {
                    fence = Some("```");
                } else if trimmed.starts_with("~~~") {
                    fence = Some("~~~");
                } else if line.starts_with("# ") && !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
        }
        current.push_str(line);
    }
    if !current.is_empty() || segments.is_empty() {
        segments.push(current);
    }
    segments
}

/// Segment stage: extract the document and write `pages/page{NNNN}.md`
/// (plus image assets for PDFs).
///
/// A finished split is left as it is; replacing it is the job of
/// re-initialisation. Units left behind by an interrupted split are removed
/// and the document is split again. The completion marker is written last.
pub async fn segment(
    state: &PipelineState,
    config: &PipelineConfig,
) -> Result<SegmentReport, PipelineError> {
    let workspace = &state.workspace;
    let tracker = StageTracker::new(workspace);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Split);
    }

    let report = if tracker.split_finished() {
        let existing = workspace.source_units()?;
        info!(
            "{} page units already exist in {}; skipping split",
            existing.len(),
            workspace.pages_dir().display()
        );
        SegmentReport {
            units: existing
                .into_iter()
                .map(|(index, path)| PageUnit {
                    index,
                    path,
                    images: Vec::new(),
                })
                .collect(),
            dropped_empty: 0,
        }
    } else {
        remove_partial_units(workspace)?;
        let extracted = extract(&state.document, workspace.root(), &config.pandoc_path).await?;
        let report = match extracted {
            Extracted::Paged(pages) => {
                let ws = workspace.clone();
                tokio::task::spawn_blocking(move || write_paged_units(&ws, pages))
                    .await
                    .map_err(|e| PipelineError::Internal(format!("Segment task panicked: {}", e)))??
            }
            Extracted::Flowed(markdown) => write_flowed_units(workspace, &markdown)?,
        };
        write_atomic(
            &workspace.split_marker_path(),
            &format!("{}\n", report.units.len()),
        )?;
        report
    };

    if report.units.is_empty() {
        warn!("Document produced no page units");
    } else {
        info!(
            "Split into {} page units ({} images)",
            report.units.len(),
            report.image_count()
        );
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Split);
    }
    Ok(report)
}

/// Delete source units of a split that never wrote its marker.
fn remove_partial_units(workspace: &Workspace) -> Result<(), PipelineError> {
    let stale = workspace.source_units()?;
    if stale.is_empty() {
        return Ok(());
    }
    warn!(
        "Found {} units from an unfinished split in {}; splitting again",
        stale.len(),
        workspace.pages_dir().display()
    );
    for (_, path) in stale {
        std::fs::remove_file(&path).map_err(|e| PipelineError::io(&path, e))?;
    }
    Ok(())
}

/// Write one unit per page, images first so a unit never links a missing file.
pub fn write_paged_units(
    workspace: &Workspace,
    pages: Vec<ExtractedPage>,
) -> Result<SegmentReport, PipelineError> {
    let mut units = Vec::with_capacity(pages.len());
    for (i, page) in pages.into_iter().enumerate() {
        let index = i + 1;

        let mut images = Vec::with_capacity(page.images.len());
        for (m, image) in page.images.iter().enumerate() {
            let path = workspace.image_path(index, m + 1);
            image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| PipelineError::ConversionFailed {
                    path: path.clone(),
                    detail: format!("cannot write page {index} image {}: {e}", m + 1),
                })?;
            images.push(ImageAsset {
                page: index,
                index: m + 1,
                path,
            });
        }

        let path = workspace.page_path(index);
        write_atomic(&path, &render_page_unit(index, &page.text, images.len()))?;
        debug!("Created {}", path.display());
        units.push(PageUnit {
            index,
            path,
            images,
        });
    }

    Ok(SegmentReport {
        units,
        dropped_empty: 0,
    })
}

/// Write the non-blank segments of a markdown stream as contiguous units.
pub fn write_flowed_units(
    workspace: &Workspace,
    markdown: &str,
) -> Result<SegmentReport, PipelineError> {
    let segments = split_markdown(markdown);
    let total = segments.len();

    let mut units = Vec::new();
    for segment in segments.into_iter().filter(|s| !s.trim().is_empty()) {
        let index = units.len() + 1;
        let path = workspace.page_path(index);
        write_atomic(&path, &segment)?;
        debug!("Created {}", path.display());
        units.push(PageUnit {
            index,
            path,
            images: Vec::new(),
        });
    }

    Ok(SegmentReport {
        dropped_empty: total - units.len(),
        units,
    })
}
