//! Post-processing: deterministic cleanup of LLM-translated markdown.
//!
//! Even well-prompted models wrap their answer in ```` ```markdown ```` fences,
//! echo the "Translated content:" label from the request, or leak zero-width
//! characters. These rules undo that without touching the markup the model
//! was asked to preserve.
//!
//! ## Rule Order
//!
//! Normalise line endings first so the fence and label patterns only have
//! to match `\n`; strip the label before the fences because models put it
//! outside the fence.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to a raw translation.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip an echoed "Translated content:" label
/// 3. Strip outer markdown fences
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 5. Ensure the text ends with exactly one newline
pub fn clean_translation(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_echoed_label(&s);
    let s = strip_markdown_fences(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip echoed prompt label ────────────────────────────────────────

static RE_ECHOED_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*translated content:[ \t]*\n?").unwrap());

fn strip_echoed_label(input: &str) -> String {
    RE_ECHOED_LABEL.replace(input, "").to_string()
}

// ── Rule 3: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Ensure text ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
