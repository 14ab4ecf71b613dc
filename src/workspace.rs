//! Working-directory layout, the `config.txt` store, and pipeline state.
//!
//! Every stage reads the previous stage's output from, and writes its own
//! output to, a single working directory:
//!
//! ```text
//! <stem>_temp/
//! ├── config.txt                     INPUT_FILE / INPUT_LANG / OUTPUT_LANG / TEMP_DIR
//! ├── pages/page0001.md              source units (segment)
//! ├── pages/.split-complete          written once every unit exists
//! ├── images/page0001_img001.png     image assets (segment)
//! └── output/
//!     ├── output_page0001.md         translated units (translate)
//!     ├── output.md                  merged document (merge)
//!     └── output.html                rendered document, TOC inserted in place
//! ```
//!
//! [`PipelineState`] is built once from `config.txt` and handed to every
//! stage by reference; no stage re-reads the config on its own.

use crate::document::{Document, DocumentFormat};
use crate::error::PipelineError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_FILE: &str = "config.txt";
pub const PAGES_DIR: &str = "pages";
pub const IMAGES_DIR: &str = "images";
pub const OUTPUT_DIR: &str = "output";
pub const MERGED_FILE: &str = "output.md";
pub const HTML_FILE: &str = "output.html";
pub const TRANSLATED_PREFIX: &str = "output_";
/// Written into `pages/` after the last source unit.
pub const SPLIT_MARKER: &str = ".split-complete";

pub const KEY_INPUT_FILE: &str = "INPUT_FILE";
pub const KEY_INPUT_LANG: &str = "INPUT_LANG";
pub const KEY_OUTPUT_LANG: &str = "OUTPUT_LANG";
pub const KEY_TEMP_DIR: &str = "TEMP_DIR";

static RE_PAGE_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page(\d+)\.md$").unwrap());
static RE_TRANSLATED_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^output_page(\d+)\.md$").unwrap());

// ── Layout ───────────────────────────────────────────────────────────────

/// Deterministic paths inside a working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default working directory for an input: `<parent>/<stem>_temp`.
    pub fn for_input(input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        Self::new(parent.join(format!("{stem}_temp")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(PAGES_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// `pages/page{NNNN}.md` for a 1-based unit index.
    pub fn page_path(&self, index: usize) -> PathBuf {
        self.pages_dir().join(page_file_name(index))
    }

    pub fn split_marker_path(&self) -> PathBuf {
        self.pages_dir().join(SPLIT_MARKER)
    }

    /// `images/page{NNNN}_img{MMM}.png`.
    pub fn image_path(&self, page: usize, image: usize) -> PathBuf {
        self.images_dir().join(image_file_name(page, image))
    }

    /// `output/output_page{NNNN}.md` for a 1-based unit index.
    pub fn translated_path(&self, index: usize) -> PathBuf {
        self.output_dir()
            .join(format!("{TRANSLATED_PREFIX}{}", page_file_name(index)))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.output_dir().join(MERGED_FILE)
    }

    pub fn html_path(&self) -> PathBuf {
        self.output_dir().join(HTML_FILE)
    }

    /// Source units on disk, in natural order.
    pub fn source_units(&self) -> Result<Vec<(usize, PathBuf)>, PipelineError> {
        list_units(&self.pages_dir(), &RE_PAGE_FILE)
    }

    /// Translated units on disk, in natural order.
    pub fn translated_units(&self) -> Result<Vec<(usize, PathBuf)>, PipelineError> {
        list_units(&self.output_dir(), &RE_TRANSLATED_FILE)
    }

    fn create_dirs(&self) -> Result<(), PipelineError> {
        for dir in [self.pages_dir(), self.images_dir(), self.output_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        }
        Ok(())
    }
}

/// `page{NNNN}.md`: zero-padded so lexical order matches numeric order.
pub fn page_file_name(index: usize) -> String {
    format!("page{index:04}.md")
}

/// `page{NNNN}_img{MMM}.png`.
pub fn image_file_name(page: usize, image: usize) -> String {
    format!("page{page:04}_img{image:03}.png")
}

fn list_units(dir: &Path, pattern: &Regex) -> Result<Vec<(usize, PathBuf)>, PipelineError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut units = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| PipelineError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(caps) = pattern.captures(&name) else {
            continue;
        };
        match caps[1].parse::<usize>() {
            Ok(index) => units.push((index, entry.path())),
            Err(_) => warn!("Ignoring unit with unparseable index: {}", name),
        }
    }

    units.sort_by(|(_, a), (_, b)| {
        crate::pipeline::merge::natural_cmp(&a.to_string_lossy(), &b.to_string_lossy())
    });
    Ok(units)
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
///
/// A reader never observes a half-written artifact.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), PipelineError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| PipelineError::io(parent, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| PipelineError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

// ── Config store ─────────────────────────────────────────────────────────

/// Flat `KEY=VALUE` record persisted as `config.txt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    entries: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse newline-delimited `KEY=VALUE` pairs. Blank lines are ignored;
    /// the value is everything after the first `=`.
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let mut entries = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "line {}: expected KEY=VALUE, got '{}'",
                    lineno + 1,
                    line
                ))
            })?;
            entries.insert(key.trim().to_string(), value.to_string());
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::parse(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        write_atomic(path, &self.render())
    }

    /// One `KEY=VALUE` line per entry, keys in sorted order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    fn require(&self, key: &str, path: &Path) -> Result<&str, PipelineError> {
        self.get(key).ok_or_else(|| PipelineError::ConfigMissingKey {
            path: path.to_path_buf(),
            key: key.to_string(),
        })
    }
}

// ── Pipeline state ───────────────────────────────────────────────────────

/// Immutable record of the document and its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    pub document: Document,
    pub workspace: Workspace,
}

impl PipelineState {
    /// Load the state of an already-initialised working directory.
    pub fn load(work_dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let workspace = Workspace::new(work_dir);
        let path = workspace.config_path();
        if !path.exists() {
            return Err(PipelineError::PrerequisiteMissing {
                stage: crate::stage::Stage::Split,
                path,
            });
        }
        let config = ConfigFile::load(&path)?;

        let input = config.require(KEY_INPUT_FILE, &path)?;
        let source_lang = config.require(KEY_INPUT_LANG, &path)?;
        let target_lang = config.require(KEY_OUTPUT_LANG, &path)?;
        let document = Document::new(input, Some(source_lang), target_lang)?;

        debug!("Loaded pipeline state from {}", path.display());
        Ok(Self {
            document,
            workspace,
        })
    }

    /// The `config.txt` record for this state.
    pub fn to_config(&self) -> ConfigFile {
        let mut config = ConfigFile::new();
        config.set(KEY_INPUT_FILE, self.document.path.to_string_lossy());
        config.set(KEY_INPUT_LANG, self.document.source_lang.as_str());
        config.set(KEY_OUTPUT_LANG, self.document.target_lang.as_str());
        config.set(KEY_TEMP_DIR, self.workspace.root().to_string_lossy());
        config
    }

    pub fn format(&self) -> DocumentFormat {
        self.document.format
    }
}

/// What to do when the working directory already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingWorkspace {
    /// Fail with [`PipelineError::WorkspaceExists`].
    #[default]
    Refuse,
    /// Keep existing units; only `config.txt` is rewritten.
    Reuse,
    /// Delete the directory and start over.
    Replace,
}

/// Create the working directory, its sub-directories and `config.txt`.
///
/// `work_dir` defaults to [`Workspace::for_input`].
pub fn initialize(
    document: Document,
    work_dir: Option<PathBuf>,
    existing: ExistingWorkspace,
) -> Result<PipelineState, PipelineError> {
    if !document.path.is_file() {
        return Err(PipelineError::InputNotFound {
            path: document.path.clone(),
        });
    }

    let workspace = work_dir
        .map(Workspace::new)
        .unwrap_or_else(|| Workspace::for_input(&document.path));
    let root = workspace.root().to_path_buf();

    if root.exists() {
        match existing {
            ExistingWorkspace::Refuse => {
                return Err(PipelineError::WorkspaceExists { path: root });
            }
            ExistingWorkspace::Reuse => {
                info!("Using existing working directory: {}", root.display());
            }
            ExistingWorkspace::Replace => {
                warn!("Removing existing working directory: {}", root.display());
                std::fs::remove_dir_all(&root).map_err(|e| PipelineError::io(&root, e))?;
            }
        }
    }

    workspace.create_dirs()?;

    let state = PipelineState {
        document,
        workspace,
    };
    let config_path = state.workspace.config_path();
    state.to_config().save(&config_path)?;
    info!("Configuration saved to: {}", config_path.display());

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, "# Title\n").unwrap();
        p
    }

    #[test]
    fn layout_names_are_zero_padded() {
        let ws = Workspace::new("/w");
        assert_eq!(ws.page_path(7), PathBuf::from("/w/pages/page0007.md"));
        assert_eq!(ws.image_path(12, 3), PathBuf::from("/w/images/page0012_img003.png"));
        assert_eq!(
            ws.translated_path(7),
            PathBuf::from("/w/output/output_page0007.md")
        );
        assert_eq!(ws.merged_path(), PathBuf::from("/w/output/output.md"));
        assert_eq!(ws.html_path(), PathBuf::from("/w/output/output.html"));
    }

    #[test]
    fn default_workspace_sits_next_to_input() {
        let ws = Workspace::for_input(Path::new("/books/novel.epub"));
        assert_eq!(ws.root(), Path::new("/books/novel_temp"));
    }

    #[test]
    fn config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = ConfigFile::new();
        config.set(KEY_INPUT_LANG, "en");
        config.set(KEY_OUTPUT_LANG, "zh");
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.entries().len(), 2);
        assert_eq!(loaded.get(KEY_INPUT_LANG), Some("en"));
        assert_eq!(loaded.get(KEY_OUTPUT_LANG), Some("zh"));
        assert_eq!(loaded, config);
    }

    #[test]
    fn config_value_may_contain_equals() {
        let config = ConfigFile::parse("INPUT_FILE=/tmp/a=b.pdf\n\nOUTPUT_LANG=zh\n").unwrap();
        assert_eq!(config.get(KEY_INPUT_FILE), Some("/tmp/a=b.pdf"));
        assert_eq!(config.get(KEY_OUTPUT_LANG), Some("zh"));
    }

    #[test]
    fn config_rejects_line_without_equals() {
        let err = ConfigFile::parse("INPUT_FILE=/a.pdf\ngarbage\n").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref m) if m.contains("line 2")));
    }

    #[test]
    fn initialize_creates_layout_and_config() {
        let dir = TempDir::new().unwrap();
        let input = touch(dir.path(), "book.md");
        let doc = Document::new(&input, None, "zh").unwrap();

        let state = initialize(doc, None, ExistingWorkspace::Refuse).unwrap();
        let ws = &state.workspace;
        assert_eq!(ws.root(), dir.path().join("book_temp"));
        assert!(ws.pages_dir().is_dir());
        assert!(ws.images_dir().is_dir());
        assert!(ws.output_dir().is_dir());

        let config = ConfigFile::load(&ws.config_path()).unwrap();
        assert_eq!(config.get(KEY_INPUT_LANG), Some("auto"));
        assert_eq!(config.get(KEY_OUTPUT_LANG), Some("zh"));
        assert_eq!(config.get(KEY_INPUT_FILE), Some(input.to_string_lossy().as_ref()));

        let reloaded = PipelineState::load(ws.root()).unwrap();
        assert_eq!(reloaded, state);
    }

    #[test]
    fn initialize_refuses_existing_directory_without_confirmation() {
        let dir = TempDir::new().unwrap();
        let input = touch(dir.path(), "book.md");
        let doc = Document::new(&input, None, "zh").unwrap();

        let state = initialize(doc.clone(), None, ExistingWorkspace::Refuse).unwrap();
        std::fs::write(state.workspace.page_path(1), "kept").unwrap();

        let err = initialize(doc.clone(), None, ExistingWorkspace::Refuse).unwrap_err();
        assert!(matches!(err, PipelineError::WorkspaceExists { .. }));

        initialize(doc.clone(), None, ExistingWorkspace::Reuse).unwrap();
        assert!(state.workspace.page_path(1).exists());

        initialize(doc, None, ExistingWorkspace::Replace).unwrap();
        assert!(!state.workspace.page_path(1).exists());
        assert!(state.workspace.pages_dir().is_dir());
    }

    #[test]
    fn initialize_requires_input() {
        let dir = TempDir::new().unwrap();
        let doc = Document::new(dir.path().join("missing.pdf"), None, "zh").unwrap();
        let err = initialize(doc, None, ExistingWorkspace::Refuse).unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound { .. }));
    }

    #[test]
    fn units_are_listed_in_natural_order() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        std::fs::create_dir_all(ws.pages_dir()).unwrap();
        for name in ["page10.md", "page2.md", "page1.md", "notes.txt", "temp_full.md"] {
            std::fs::write(ws.pages_dir().join(name), "x").unwrap();
        }
        let indices: Vec<usize> = ws.source_units().unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2, 10]);
    }

    #[test]
    fn directories_named_like_units_are_ignored() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        std::fs::create_dir_all(ws.pages_dir().join("page0002.md")).unwrap();
        std::fs::write(ws.page_path(1), "x").unwrap();
        let units = ws.source_units().unwrap();
        assert_eq!(units, vec![(1, ws.page_path(1))]);
    }

    #[test]
    fn missing_unit_directory_lists_nothing() {
        let ws = Workspace::new("/definitely/not/here");
        assert!(ws.translated_units().unwrap().is_empty());
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output").join("output.md");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("output.md")]);
    }
}
