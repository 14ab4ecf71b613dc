//! Table-of-contents injection into the rendered HTML.
//!
//! Two streaming passes over the document with `lol_html`:
//!
//! 1. collect every `h1`..`h6` in document order (level, text, existing id)
//!    and note whether `<html>`, `<head>` and `<body>` are present;
//! 2. give id-less headings a synthesized anchor, prepend the navigation
//!    block to `<body>` and append the TOC styles to `<head>`.
//!
//! A document without headings is returned byte-identical. Existing ids are
//! never touched. Injecting twice duplicates the block, so the stage entry
//! point [`insert_toc`] refuses to run on a document that already has one.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::TocReport;
use crate::stage::{Stage, StageTracker};
use crate::workspace::{write_atomic, PipelineState};
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use tracing::{debug, info};

/// `id` of the injected navigation block. Namespaced so it cannot collide
/// with the ids pandoc derives from heading text.
pub const TOC_ELEMENT_ID: &str = "ebook-translate-toc";

/// Attribute that marks the injected block; pandoc never emits it.
pub const TOC_MARKER_ATTR: &str = "data-ebook-toc";

const TOC_STYLES: &str = r#"
<style>
#ebook-translate-toc {
    background-color: #f9f9f9;
    border: 1px solid #ddd;
    border-radius: 5px;
    padding: 20px;
    margin: 20px 0;
}

#ebook-translate-toc h2 {
    margin-top: 0;
    color: #333;
    border-bottom: 2px solid #007acc;
    padding-bottom: 5px;
}

#ebook-translate-toc ul {
    list-style-type: none;
    padding-left: 0;
}

#ebook-translate-toc li {
    margin: 5px 0;
    padding-left: 20px;
}

#ebook-translate-toc a {
    text-decoration: none;
    color: #007acc;
}

#ebook-translate-toc a:hover {
    text-decoration: underline;
    color: #005fa3;
}
</style>
"#;

static RE_SLUG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static RE_SLUG_COLLAPSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());
static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// One heading of the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingNode {
    /// 1..=6
    pub level: u8,
    /// Visible text as it appears in the HTML source (entities kept).
    pub text: String,
    pub anchor: String,
    /// `true` when `anchor` was generated here rather than read from the document.
    pub synthesized: bool,
}

/// Result of [`build_toc`].
#[derive(Debug, Clone)]
pub struct TocOutcome {
    pub html: String,
    pub headings: Vec<HeadingNode>,
}

impl TocOutcome {
    pub fn anchors_added(&self) -> usize {
        self.headings.iter().filter(|h| h.synthesized).count()
    }
}

#[derive(Debug, Default)]
struct RawHeading {
    level: u8,
    id: Option<String>,
    text: String,
}

#[derive(Debug, Default)]
struct Landmarks {
    html: Cell<bool>,
    head: Cell<bool>,
    body: Cell<bool>,
}

/// Slug for a heading: lowercase, drop everything but word characters,
/// whitespace and hyphens, collapse whitespace/hyphen runs into one hyphen.
pub fn anchor_slug(text: &str) -> String {
    let lower = decode_entities(text.trim()).to_lowercase();
    let stripped = RE_SLUG_STRIP.replace_all(&lower, "");
    RE_SLUG_COLLAPSE.replace_all(&stripped, "-").into_owned()
}

/// `heading-{position}-{slug}`; `position` is 1-based over all headings.
pub fn synthesize_anchor(position: usize, text: &str) -> String {
    format!("heading-{position}-{}", anchor_slug(text))
}

/// Navigation block: one `<li>` per heading, indented two spaces per level below 1.
pub fn render_toc_block(headings: &[HeadingNode], title: &str) -> String {
    let mut block = format!(
        "<div id=\"{TOC_ELEMENT_ID}\" {TOC_MARKER_ATTR}>\n<h2>{}</h2>\n<ul>\n",
        escape_html(title)
    );
    for heading in headings {
        let indent = "  ".repeat(usize::from(heading.level.saturating_sub(1)));
        block.push_str(&format!(
            "{indent}<li><a href=\"#{}\">{}</a></li>\n",
            escape_attr(&heading.anchor),
            heading.text.trim()
        ));
    }
    block.push_str("</ul>\n</div>\n");
    block
}

/// Inject a table of contents into `html`.
///
/// Returns the input unchanged (and no headings) when the document has no
/// `h1`..`h6` element.
pub fn build_toc(html: &str, title: &str) -> Result<TocOutcome, RewritingError> {
    let (raw, landmarks) = collect_headings(html)?;
    if raw.is_empty() {
        return Ok(TocOutcome {
            html: html.to_string(),
            headings: Vec::new(),
        });
    }

    let headings = assign_anchors(raw);
    let toc = render_toc_block(&headings, title);
    let new_ids: Vec<Option<&str>> = headings
        .iter()
        .map(|h| h.synthesized.then_some(h.anchor.as_str()))
        .collect();

    let position = Cell::new(0usize);
    let mut handlers = Vec::new();
    for level in 1..=6u8 {
        let (position, new_ids) = (&position, &new_ids);
        handlers.push(element!(format!("h{level}"), move |el| {
            let i = position.get();
            position.set(i + 1);
            if let Some(Some(id)) = new_ids.get(i) {
                el.set_attribute("id", id)?;
            }
            Ok(())
        }));
    }
    if landmarks.head.get() {
        handlers.push(element!("head", |el| {
            el.append(TOC_STYLES, ContentType::Html);
            Ok(())
        }));
    } else if landmarks.html.get() {
        handlers.push(element!("html", |el| {
            el.prepend(&format!("<head>{TOC_STYLES}</head>"), ContentType::Html);
            Ok(())
        }));
    }
    if landmarks.body.get() {
        let toc = &toc;
        handlers.push(element!("body", move |el| {
            el.prepend(toc, ContentType::Html);
            Ok(())
        }));
    }

    let mut rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )?;

    if !landmarks.body.get() {
        rewritten = insert_at_content_start(&rewritten, &toc);
    }
    if !landmarks.head.get() && !landmarks.html.get() {
        rewritten = insert_at_content_start(&rewritten, TOC_STYLES);
    }

    Ok(TocOutcome {
        html: rewritten,
        headings,
    })
}

/// Stage entry point: inject the TOC into `output/output.html` in place.
///
/// Skips (and leaves the file alone) when the document already carries a
/// navigation block or has no headings.
pub fn insert_toc(state: &PipelineState, config: &PipelineConfig) -> Result<TocReport, PipelineError> {
    let tracker = StageTracker::new(&state.workspace);
    let path = tracker.require_predecessor(Stage::TocInserted, 0)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::TocInserted);
    }

    let report = if tracker.is_complete(Stage::TocInserted, 0) {
        info!("Table of contents already present in {}", path.display());
        TocReport {
            path,
            entries: 0,
            anchors_added: 0,
        }
    } else {
        let html = std::fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
        let outcome = build_toc(&html, &config.toc_title).map_err(|e| PipelineError::TocFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;

        if outcome.headings.is_empty() {
            info!("No headings found in {}; leaving it unchanged", path.display());
        } else {
            write_atomic(&path, &outcome.html)?;
            info!(
                "Inserted table of contents with {} entries into {}",
                outcome.headings.len(),
                path.display()
            );
        }
        TocReport {
            entries: outcome.headings.len(),
            anchors_added: outcome.anchors_added(),
            path,
        }
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::TocInserted);
    }
    Ok(report)
}

/// `true` when `html` already carries an injected navigation block.
pub fn has_toc_block(html: &str) -> Result<bool, RewritingError> {
    let found = Cell::new(false);
    let selector = format!("[{TOC_MARKER_ATTR}]");
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(selector, |_| {
                found.set(true);
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(found.get())
}

fn collect_headings(html: &str) -> Result<(Vec<RawHeading>, Landmarks), RewritingError> {
    let headings: RefCell<Vec<RawHeading>> = RefCell::new(Vec::new());
    let landmarks = Landmarks::default();

    let mut handlers = Vec::new();
    for level in 1..=6u8 {
        let headings = &headings;
        handlers.push(element!(format!("h{level}"), move |el| {
            let id = el.get_attribute("id").filter(|id| !id.trim().is_empty());
            headings.borrow_mut().push(RawHeading {
                level,
                id,
                text: String::new(),
            });
            Ok(())
        }));
        handlers.push(text!(format!("h{level}"), move |chunk| {
            if let Some(last) = headings.borrow_mut().last_mut() {
                last.text.push_str(chunk.as_str());
            }
            Ok(())
        }));
    }
    {
        let landmarks = &landmarks;
        handlers.push(element!("html", move |_| {
            landmarks.html.set(true);
            Ok(())
        }));
        handlers.push(element!("head", move |_| {
            landmarks.head.set(true);
            Ok(())
        }));
        handlers.push(element!("body", move |_| {
            landmarks.body.set(true);
            Ok(())
        }));
    }

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )?;

    let headings = headings.into_inner();
    debug!("Collected {} headings", headings.len());
    Ok((headings, landmarks))
}

fn assign_anchors(raw: Vec<RawHeading>) -> Vec<HeadingNode> {
    let mut taken: HashSet<String> = raw.iter().filter_map(|h| h.id.clone()).collect();
    raw.into_iter()
        .enumerate()
        .map(|(i, heading)| match heading.id {
            Some(anchor) => HeadingNode {
                level: heading.level,
                text: heading.text.trim().to_string(),
                anchor,
                synthesized: false,
            },
            None => {
                let base = synthesize_anchor(i + 1, &heading.text);
                let mut anchor = base.clone();
                let mut n = 2;
                while taken.contains(&anchor) {
                    anchor = format!("{base}-{n}");
                    n += 1;
                }
                taken.insert(anchor.clone());
                HeadingNode {
                    level: heading.level,
                    text: heading.text.trim().to_string(),
                    anchor,
                    synthesized: true,
                }
            }
        })
        .collect()
}

/// Insert `block` at the very start of the document, after a doctype if any.
fn insert_at_content_start(html: &str, block: &str) -> String {
    let at = doctype_end(html).unwrap_or(0);
    format!("{}{}{}", &html[..at], block, &html[at..])
}

fn doctype_end(html: &str) -> Option<usize> {
    let offset = html.len() - html.trim_start().len();
    let rest = &html[offset..];
    let is_doctype = rest
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
    if !is_doctype {
        return None;
    }
    rest.find('>').map(|end| offset + end + 1)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Attribute values come back from `lol_html` with entities still encoded.
fn escape_attr(value: &str) -> String {
    escape_html(&decode_entities(value)).replace('"', "&quot;")
}

fn decode_entities(text: &str) -> String {
    RE_ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
