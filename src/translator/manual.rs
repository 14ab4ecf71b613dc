//! Operator-driven translator.
//!
//! Shows the original unit on the terminal and reads the translation back
//! line by line. Input for a unit ends at a line equal to the end marker
//! (default `.end`) or at EOF. A line equal to the skip marker (default
//! `.skip`) abandons the unit; it stays untranslated and is offered again on
//! the next run. Empty input abandons the unit too, so an exhausted stdin
//! never writes blank translations.

use crate::config::PipelineConfig;
use crate::error::TranslatorError;
use crate::prompts::language_name;
use crate::translator::Translator;
use async_trait::async_trait;
use std::io::{BufRead, BufReader, Write};
use std::sync::Mutex;

const RULE_WIDTH: usize = 60;

/// Translator that asks a human for every unit.
pub struct ManualTranslator {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
    end_marker: String,
    skip_marker: String,
}

impl ManualTranslator {
    /// Prompt on stdout, read from stdin.
    pub fn stdio(config: &PipelineConfig) -> Self {
        Self::new(
            BufReader::new(std::io::stdin()),
            std::io::stdout(),
            &config.manual_end_marker,
            &config.manual_skip_marker,
        )
    }

    pub fn new(
        input: impl BufRead + Send + 'static,
        output: impl Write + Send + 'static,
        end_marker: &str,
        skip_marker: &str,
    ) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
            output: Mutex::new(Box::new(output)),
            end_marker: end_marker.to_string(),
            skip_marker: skip_marker.to_string(),
        }
    }

    fn show_original(&self, content: &str, target_lang: &str) -> std::io::Result<()> {
        let mut out = self
            .output
            .lock()
            .map_err(|_| std::io::Error::other("terminal output lock poisoned"))?;
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(out, "\n{rule}")?;
        writeln!(out, "Manual translation into {}", language_name(target_lang))?;
        writeln!(out, "{rule}")?;
        writeln!(out, "{}", content.trim_end())?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "Type the translation. Finish with a line '{}' (or EOF); '{}' skips this page.",
            self.end_marker, self.skip_marker
        )?;
        out.flush()
    }

    fn read_translation(&self) -> Result<String, TranslatorError> {
        let mut input = self
            .input
            .lock()
            .map_err(|_| TranslatorError::RequestFailed("terminal input lock poisoned".into()))?;

        let mut lines = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = input
                .read_line(&mut line)
                .map_err(|e| TranslatorError::RequestFailed(format!("reading input: {e}")))?;
            if n == 0 {
                break;
            }
            let text = line.trim_end_matches(['\n', '\r']);
            if text.trim() == self.end_marker {
                break;
            }
            if text.trim() == self.skip_marker {
                return Err(TranslatorError::Abandoned);
            }
            lines.push(text.to_string());
        }

        let translation = lines.join("\n");
        if translation.trim().is_empty() {
            return Err(TranslatorError::Abandoned);
        }
        Ok(translation)
    }
}

#[async_trait]
impl Translator for ManualTranslator {
    fn name(&self) -> &str {
        "manual"
    }

    async fn translate(
        &self,
        content: &str,
        target_lang: &str,
        _source_lang: &str,
    ) -> Result<String, TranslatorError> {
        self.show_original(content, target_lang)
            .map_err(|e| TranslatorError::RequestFailed(format!("writing prompt: {e}")))?;
        self.read_translation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn translator(input: &str) -> (ManualTranslator, SharedBuf) {
        let out = SharedBuf::default();
        let t = ManualTranslator::new(Cursor::new(input.to_string()), out.clone(), ".end", ".skip");
        (t, out)
    }

    #[tokio::test]
    async fn reads_until_end_marker() {
        let (t, out) = translator("# 标题\n\n正文\n.end\n# 下一页\n.end\n");
        let first = t.translate("# Title\n\nBody", "zh", "auto").await.unwrap();
        assert_eq!(first, "# 标题\n\n正文");
        let second = t.translate("# Next", "zh", "auto").await.unwrap();
        assert_eq!(second, "# 下一页");

        let shown = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(shown.contains("# Title\n\nBody"));
        assert!(shown.contains("Chinese"));
    }

    #[tokio::test]
    async fn eof_ends_input() {
        let (t, _) = translator("第一行\n第二行");
        assert_eq!(t.translate("x", "zh", "en").await.unwrap(), "第一行\n第二行");
    }

    #[tokio::test]
    async fn skip_marker_abandons_unit_only() {
        let (t, _) = translator("half done\n.skip\n好\n.end\n");
        assert!(matches!(
            t.translate("a", "zh", "en").await,
            Err(TranslatorError::Abandoned)
        ));
        assert_eq!(t.translate("b", "zh", "en").await.unwrap(), "好");
    }

    #[tokio::test]
    async fn empty_input_is_abandoned() {
        let (t, _) = translator("");
        assert!(matches!(
            t.translate("a", "zh", "en").await,
            Err(TranslatorError::Abandoned)
        ));
    }
}
