//! Source documents and their formats.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Language sentinel meaning "let the translator detect it".
pub const AUTO_LANGUAGE: &str = "auto";

/// Input formats the segmenter knows how to split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Paginated: one unit per physical page.
    Pdf,
    /// Flowed: converted to markdown by an external tool, split at `# ` headings.
    Docx,
    /// Flowed, same as docx.
    Epub,
    /// Flowed, read as-is.
    Markdown,
}

impl DocumentFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "epub" => Ok(DocumentFormat::Epub),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            _ => Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    /// `true` for formats that carry physical pages.
    pub fn is_paginated(self) -> bool {
        matches!(self, DocumentFormat::Pdf)
    }

    /// Format name as pandoc spells it.
    pub fn pandoc_name(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Epub => "epub",
            DocumentFormat::Markdown => "markdown",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pandoc_name())
    }
}

/// The source input. Immutable once the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
    /// Source language code, or [`AUTO_LANGUAGE`].
    pub source_lang: String,
    /// Target language code or provider-recognised name.
    pub target_lang: String,
}

impl Document {
    /// Describe a source file, detecting its format from the extension.
    ///
    /// An empty or missing source language becomes [`AUTO_LANGUAGE`].
    pub fn new(
        path: impl Into<PathBuf>,
        source_lang: Option<&str>,
        target_lang: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let path = path.into();
        let format = DocumentFormat::from_path(&path)?;
        let source_lang = match source_lang.map(str::trim) {
            Some(lang) if !lang.is_empty() => lang.to_string(),
            _ => AUTO_LANGUAGE.to_string(),
        };
        Ok(Self {
            path,
            format,
            source_lang,
            target_lang: target_lang.into(),
        })
    }
}
