//! In-process configuration for a pipeline run.
//!
//! Two layers exist. `config.txt` in the working directory (see
//! [`crate::workspace::ConfigFile`]) holds what must survive between runs:
//! input path and languages. [`PipelineConfig`] holds everything else: which
//! translator to use, LLM knobs, renderer paths, progress reporting.
//!
//! Build it via [`PipelineConfig::builder()`] and rely on the defaults for
//! the fields you don't care about.

use crate::error::PipelineError;
use crate::pipeline::render::Renderer;
use crate::progress::ProgressCallback;
use crate::translator::Translator;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a pipeline run.
///
/// # Example
/// ```rust
/// use ebook_translate::{PipelineConfig, TranslatorMode};
///
/// let config = PipelineConfig::builder()
///     .translator_mode(TranslatorMode::Api)
///     .model("gpt-4.1-mini")
///     .api_timeout_secs(45)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Which translator variant to build when `translator` is None. Default: Manual.
    pub translator_mode: TranslatorMode,

    /// Pre-constructed translator. Takes precedence over `translator_mode`.
    pub translator: Option<Arc<dyn Translator>>,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Low enough to keep repeated runs of the same unit consistent.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per unit. Default: 4000.
    pub max_tokens: usize,

    /// Per-unit translation timeout in seconds. Default: 30.
    ///
    /// A unit that times out is reported as failed and left untranslated;
    /// there is no automatic retry.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Line that ends manual input for a unit. EOF ends it too. Default: `.end`.
    pub manual_end_marker: String,

    /// Line that abandons the current unit in manual mode. Default: `.skip`.
    pub manual_skip_marker: String,

    /// pandoc executable, used for docx/epub conversion and by the default
    /// renderer. Default: `pandoc`.
    pub pandoc_path: PathBuf,

    /// Pre-constructed HTML renderer. If None, pandoc renders.
    pub renderer: Option<Arc<dyn Renderer>>,

    /// HTML template passed to pandoc, if any.
    pub template: Option<PathBuf>,

    /// Stylesheet passed to pandoc, if any.
    pub css: Option<PathBuf>,

    /// Document title in the rendered HTML. Default: "Translated Ebook".
    pub title: String,

    /// Heading above the generated table of contents. Default: "Table of Contents".
    pub toc_title: String,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            translator_mode: TranslatorMode::default(),
            translator: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 4000,
            api_timeout_secs: 30,
            system_prompt: None,
            manual_end_marker: ".end".to_string(),
            manual_skip_marker: ".skip".to_string(),
            pandoc_path: PathBuf::from("pandoc"),
            renderer: None,
            template: None,
            css: None,
            title: "Translated Ebook".to_string(),
            toc_title: "Table of Contents".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("translator_mode", &self.translator_mode)
            .field("translator", &self.translator.as_ref().map(|t| t.name()))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pandoc_path", &self.pandoc_path)
            .field("renderer", &self.renderer.as_ref().map(|r| r.name()))
            .field("template", &self.template)
            .field("css", &self.css)
            .field("title", &self.title)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn translator_mode(mut self, mode: TranslatorMode) -> Self {
        self.config.translator_mode = mode;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn manual_markers(mut self, end: impl Into<String>, skip: impl Into<String>) -> Self {
        self.config.manual_end_marker = end.into();
        self.config.manual_skip_marker = skip.into();
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template = Some(path.into());
        self
    }

    pub fn css(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.css = Some(path.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn toc_title(mut self, title: impl Into<String>) -> Self {
        self.config.toc_title = title.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PipelineError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.manual_end_marker.trim().is_empty() || c.manual_skip_marker.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "manual end/skip markers must not be blank".into(),
            ));
        }
        if c.manual_end_marker == c.manual_skip_marker {
            return Err(PipelineError::InvalidConfig(format!(
                "manual end and skip markers must differ, both are '{}'",
                c.manual_end_marker
            )));
        }
        Ok(self.config)
    }
}

/// Which translator variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranslatorMode {
    /// One LLM request per unit.
    Api,
    /// Operator types the translation on stdin. (default)
    #[default]
    Manual,
}
