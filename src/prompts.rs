//! Prompts for LLM-based translation of page units.
//!
//! Callers can override the system prompt via
//! [`crate::config::PipelineConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

use crate::document::AUTO_LANGUAGE;
use isolang::Language;

/// Default system prompt for translating one markdown page unit.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a professional book translator. You translate markdown documents page by page.

Follow these rules precisely:

1. STRUCTURE
   - Keep every markdown construct exactly as it is: headings (#), lists, tables, block quotes, horizontal rules (---)
   - Keep links and image references unchanged, including their URLs and paths
   - Keep code blocks and inline code untranslated

2. CONTENT
   - Translate only the prose
   - Preserve line breaks and paragraph boundaries
   - Do not summarise, shorten, or skip text

3. OUTPUT FORMAT
   - Output ONLY the translated markdown
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary, notes, or explanations"#;

/// Human-readable language name for a prompt.
///
/// Two- and three-letter ISO 639 codes become English names ("zh" →
/// "Chinese"); anything else (e.g. "Simplified Chinese") is passed through.
pub fn language_name(code: &str) -> String {
    let normalized = code.trim().to_lowercase();
    let lang = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized),
        _ => None,
    };
    lang.map(|l| l.to_name().to_string())
        .unwrap_or_else(|| code.trim().to_string())
}

/// Build the user message for one unit.
pub fn translation_request(content: &str, target_lang: &str, source_lang: &str) -> String {
    let target = language_name(target_lang);
    let instruction = if source_lang.trim().is_empty() || source_lang == AUTO_LANGUAGE {
        format!("Translate the following markdown content to {target}.")
    } else {
        format!(
            "Translate the following markdown content from {} to {target}.",
            language_name(source_lang)
        )
    };

    format!(
        "{instruction}\nPreserve all markdown formatting, including headers, links, and image references.\n\
Only translate the text content, keep all markdown syntax unchanged.\n\n\
Content to translate:\n{content}\n\nTranslated content:"
    )
}
