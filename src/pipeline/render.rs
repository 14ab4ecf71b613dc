//! HTML rendering of the merged document.
//!
//! The [`Renderer`] trait is the seam; [`PandocRenderer`] is the only
//! production implementation and shells out to pandoc. The stage function
//! [`render_html`] owns everything renderer-independent: the prerequisite
//! check and copying `images/` next to the HTML so relative links resolve.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::RenderReport;
use crate::stage::{Stage, StageTracker};
use crate::workspace::{PipelineState, IMAGES_DIR};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Turns the merged markdown into a standalone HTML document.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    /// Render `markdown` into `html`, overwriting it.
    async fn render(&self, markdown: &Path, html: &Path) -> Result<(), PipelineError>;
}

/// Renders with the pandoc executable.
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    pandoc: PathBuf,
    template: Option<PathBuf>,
    css: Option<PathBuf>,
    title: String,
}

impl PandocRenderer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            pandoc: config.pandoc_path.clone(),
            template: config.template.clone(),
            css: config.css.clone(),
            title: config.title.clone(),
        }
    }

    /// First line of `pandoc --version`, or `None` when pandoc cannot run.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.pandoc).arg("--version").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(str::to_string)
    }

    fn args(&self, markdown: &Path, html: &Path) -> Vec<String> {
        let mut args = vec![
            markdown.display().to_string(),
            "-o".to_string(),
            html.display().to_string(),
            "--standalone".to_string(),
            "--self-contained".to_string(),
            "--metadata".to_string(),
            format!("title={}", self.title),
        ];
        if let Some(dir) = html.parent().filter(|p| !p.as_os_str().is_empty()) {
            args.push(format!("--resource-path={}", dir.display()));
        }
        if let Some(ref template) = self.template {
            args.push("--template".to_string());
            args.push(template.display().to_string());
        }
        if let Some(ref css) = self.css {
            args.push("--css".to_string());
            args.push(css.display().to_string());
        }
        args
    }
}

#[async_trait]
impl Renderer for PandocRenderer {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn render(&self, markdown: &Path, html: &Path) -> Result<(), PipelineError> {
        let version = self.version().await.ok_or_else(|| PipelineError::RenderFailed {
            path: markdown.to_path_buf(),
            detail: format!(
                "'{}' is not installed or not in PATH (see https://pandoc.org/installing.html)",
                self.pandoc.display()
            ),
        })?;
        debug!("Using {}", version);

        let args = self.args(markdown, html);
        let output = Command::new(&self.pandoc)
            .args(&args)
            .output()
            .await
            .map_err(|e| PipelineError::RenderFailed {
                path: markdown.to_path_buf(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PipelineError::RenderFailed {
                path: markdown.to_path_buf(),
                detail: format!(
                    "pandoc exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

/// Render stage: `output/output.md` → `output/output.html`.
///
/// Always re-renders; the merged document may have changed since the last run.
pub async fn render_html(
    state: &PipelineState,
    renderer: &dyn Renderer,
    config: &PipelineConfig,
) -> Result<RenderReport, PipelineError> {
    let workspace = &state.workspace;
    let tracker = StageTracker::new(workspace);
    let markdown = tracker.require_predecessor(Stage::Rendered, 0)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Rendered);
    }

    let images_copied = copy_images(
        &workspace.images_dir(),
        &workspace.output_dir().join(IMAGES_DIR),
    )?;
    if images_copied > 0 {
        info!("Copied {} images next to the HTML output", images_copied);
    }

    let html = tracker.artifact(Stage::Rendered, 0);
    info!("Rendering {} with {}", markdown.display(), renderer.name());
    renderer.render(&markdown, &html).await?;
    info!("HTML file created: {}", html.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Rendered);
    }
    Ok(RenderReport {
        path: html,
        images_copied,
    })
}

/// Replace `dest` with a copy of `src`. Returns the number of files copied;
/// an empty or missing `src` copies nothing and leaves `dest` alone.
fn copy_images(src: &Path, dest: &Path) -> Result<usize, PipelineError> {
    let has_entries = std::fs::read_dir(src)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !has_entries {
        return Ok(0);
    }
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|e| PipelineError::io(dest, e))?;
    }
    copy_dir(src, dest)
}

fn copy_dir(src: &Path, dest: &Path) -> Result<usize, PipelineError> {
    std::fs::create_dir_all(dest).map_err(|e| PipelineError::io(dest, e))?;
    let mut copied = 0;
    for entry in std::fs::read_dir(src).map_err(|e| PipelineError::io(src, e))? {
        let entry = entry.map_err(|e| PipelineError::io(src, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copied += copy_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| PipelineError::io(&from, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
