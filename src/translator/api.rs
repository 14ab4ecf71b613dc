//! LLM-backed translator: one chat request per page unit.
//!
//! Failures are reported, never retried: a unit that times out or gets a
//! transport error stays untranslated and the next pipeline run asks again.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, TranslatorError};
use crate::pipeline::postprocess::clean_translation;
use crate::prompts::{translation_request, DEFAULT_SYSTEM_PROMPT};
use crate::translator::Translator;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Translator that sends each unit to an LLM provider.
pub struct ApiTranslator {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl ApiTranslator {
    /// Wrap an existing provider with the prompt and limits from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` or the environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Translator for ApiTranslator {
    fn name(&self) -> &str {
        "api"
    }

    async fn translate(
        &self,
        content: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> Result<String, TranslatorError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(translation_request(content, target_lang, source_lang)),
        ];
        let options = self.build_options();

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| TranslatorError::Timeout(self.timeout_secs))?
        .map_err(|e| TranslatorError::RequestFailed(e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        accept_completion(&response.content)
    }
}

/// Clean a completion, rejecting one that carries no text.
fn accept_completion(content: &str) -> Result<String, TranslatorError> {
    let cleaned = clean_translation(content);
    if cleaned.trim().is_empty() {
        return Err(TranslatorError::MalformedResponse(
            "provider returned an empty completion".into(),
        ));
    }
    Ok(cleaned)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is;
/// 2. `config.provider_name` + `config.model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. whatever `ProviderFactory::from_env` detects.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Use manual translation (omit --api) to translate without a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_completion_is_malformed() {
        let err = accept_completion("  \n\u{200B}\n").unwrap_err();
        assert!(matches!(err, TranslatorError::MalformedResponse(_)));
    }

    #[test]
    fn completion_is_cleaned() {
        let out = accept_completion("```markdown\r\n# Titel\r\n\r\nText\r\n```").unwrap();
        assert_eq!(out, "# Titel\n\nText\n");
    }
}
