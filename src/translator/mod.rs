//! Translator adapters.
//!
//! The translate stage only ever talks to [`Translator`]; which variant sits
//! behind it is decided once, by [`resolve_translator`], from
//! [`crate::config::PipelineConfig`]:
//!
//! 1. a pre-built translator (`config.translator`), used as-is;
//! 2. [`TranslatorMode::Api`] → [`ApiTranslator`], one LLM request per unit;
//! 3. [`TranslatorMode::Manual`] → [`ManualTranslator`] on stdin/stdout.
//!
//! Both variants must hand back markdown with headings, links, image
//! references, lists and tables intact; only prose changes.

pub mod api;
pub mod manual;

pub use api::ApiTranslator;
pub use manual::ManualTranslator;

use crate::config::{PipelineConfig, TranslatorMode};
use crate::error::{PipelineError, TranslatorError};
use async_trait::async_trait;
use std::sync::Arc;

/// Converts markdown text between languages while preserving its markup.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short name for logs ("api", "manual", ...).
    fn name(&self) -> &str;

    /// Translate `content` into `target_lang`.
    ///
    /// `source_lang` is a language code or [`crate::document::AUTO_LANGUAGE`].
    async fn translate(
        &self,
        content: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> Result<String, TranslatorError>;
}

/// Pick the translator for this run.
pub fn resolve_translator(config: &PipelineConfig) -> Result<Arc<dyn Translator>, PipelineError> {
    if let Some(ref translator) = config.translator {
        return Ok(Arc::clone(translator));
    }

    match config.translator_mode {
        TranslatorMode::Api => Ok(Arc::new(ApiTranslator::from_config(config)?)),
        TranslatorMode::Manual => Ok(Arc::new(ManualTranslator::stdio(config))),
    }
}
