//! Document-conversion collaborators.
//!
//! PDFs are read page by page through pdfium (text plus embedded images);
//! docx and epub go through pandoc into a single markdown stream; markdown
//! is read as-is. Nothing here writes page units; that is the segmenter's
//! job.

use crate::document::{Document, DocumentFormat};
use crate::error::PipelineError;
use crate::workspace::IMAGES_DIR;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One physical page of a paginated document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub text: String,
    /// Embedded images in page order.
    pub images: Vec<DynamicImage>,
}

/// Content handed to the segmenter.
#[derive(Debug, Clone)]
pub enum Extracted {
    /// One entry per physical page.
    Paged(Vec<ExtractedPage>),
    /// A single markdown stream.
    Flowed(String),
}

/// Extract `document` into pages or a markdown stream.
///
/// Media pandoc pulls out of docx/epub containers lands in `images/` under
/// `work_dir`.
pub async fn extract(
    document: &Document,
    work_dir: &Path,
    pandoc: &Path,
) -> Result<Extracted, PipelineError> {
    match document.format {
        DocumentFormat::Pdf => extract_pdf(&document.path).await.map(Extracted::Paged),
        DocumentFormat::Docx | DocumentFormat::Epub => {
            pandoc_to_markdown(pandoc, document, work_dir)
                .await
                .map(Extracted::Flowed)
        }
        DocumentFormat::Markdown => {
            let bytes = tokio::fs::read(&document.path)
                .await
                .map_err(|e| PipelineError::io(&document.path, e))?;
            String::from_utf8(bytes)
                .map(Extracted::Flowed)
                .map_err(|e| PipelineError::ConversionFailed {
                    path: document.path.clone(),
                    detail: format!("markdown input is not valid UTF-8: {e}"),
                })
        }
    }
}

/// Read text and images of every page. Runs inside `spawn_blocking`.
pub async fn extract_pdf(pdf_path: &Path) -> Result<Vec<ExtractedPage>, PipelineError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_pdf_blocking(&path))
        .await
        .map_err(|e| PipelineError::Internal(format!("PDF extraction task panicked: {}", e)))?
}

/// `PDFIUM_LIB_PATH` (a library file) wins over the system library.
fn bind_pdfium() -> Result<Pdfium, String> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(lib) if !lib.is_empty() => Pdfium::bind_to_library(PathBuf::from(lib)),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| format!("cannot load the pdfium library: {e:?}"))?;
    Ok(Pdfium::new(bindings))
}

fn extract_pdf_blocking(pdf_path: &Path) -> Result<Vec<ExtractedPage>, PipelineError> {
    let conversion_failed = |detail: String| PipelineError::ConversionFailed {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium().map_err(conversion_failed)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| conversion_failed(format!("{:?}", e)))?;

    let pages = document.pages();
    info!("Processing {} pages from PDF", pages.len());

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| conversion_failed(format!("page {}: {:?}", idx + 1, e)))?
            .all();

        let mut images = Vec::new();
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            match image_object.get_raw_image() {
                Ok(image) => images.push(image),
                Err(e) => warn!("Page {}: skipping undecodable image: {:?}", idx + 1, e),
            }
        }

        debug!(
            "Page {}: {} chars, {} images",
            idx + 1,
            text.len(),
            images.len()
        );
        results.push(ExtractedPage { text, images });
    }

    Ok(results)
}

/// Convert a docx/epub to markdown with pandoc.
///
/// pandoc runs inside `work_dir` so extracted media is linked as
/// `images/media/...`, a path that still resolves once the images are
/// copied next to the rendered HTML.
pub async fn pandoc_to_markdown(
    pandoc: &Path,
    document: &Document,
    work_dir: &Path,
) -> Result<String, PipelineError> {
    let input =
        std::path::absolute(&document.path).map_err(|e| PipelineError::io(&document.path, e))?;
    let output = Command::new(pandoc)
        .current_dir(work_dir)
        .arg(&input)
        .arg("-f")
        .arg(document.format.pandoc_name())
        .arg("-t")
        .arg("markdown")
        .arg(format!("--extract-media={IMAGES_DIR}"))
        .output()
        .await
        .map_err(|e| PipelineError::ConversionFailed {
            path: document.path.clone(),
            detail: format!("cannot run '{}': {}", pandoc.display(), e),
        })?;

    if !output.status.success() {
        return Err(PipelineError::ConversionFailed {
            path: document.path.clone(),
            detail: format!(
                "pandoc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    info!("Converted {} to markdown", document.format);
    String::from_utf8(output.stdout).map_err(|e| PipelineError::ConversionFailed {
        path: document.path.clone(),
        detail: format!("pandoc produced invalid UTF-8: {e}"),
    })
}
