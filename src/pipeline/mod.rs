//! Pipeline stages.
//!
//! Each submodule implements one step and reads only what the previous
//! step left in the working directory.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ segment ──▶ translate ──▶ merge ──▶ render ──▶ toc
//!          (pdfium /    (pages/)    (output_     (output   (output   (in place)
//!           pandoc)                  page*.md)    .md)      .html)
//! ```
//!
//! 1. [`extract`]   - per-page text and images for PDFs, one markdown stream
//!    for everything else
//! 2. [`segment`]   - numbered page units under `pages/`
//! 3. [`translate`] - one translator call per unit, skipping finished ones
//! 4. [`merge`]     - natural-order concatenation with `---` separators
//! 5. [`render`]    - markdown to standalone HTML
//! 6. [`toc`]       - heading anchors plus a navigation block
//!
//! [`postprocess`] cleans LLM output before the translate stage writes it.

pub mod extract;
pub mod merge;
pub mod postprocess;
pub mod render;
pub mod segment;
pub mod toc;
pub mod translate;
