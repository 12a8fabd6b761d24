//! Pipeline stages for URL-to-note import.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the orchestration in [`crate::import`] stays short.
//!
//! ## Data Flow
//!
//! ```text
//! detect ──▶ html | pdf ──▶ prompt ──▶ llm ──▶ frontmatter ──▶ writer
//! (HEAD)     (extract)      (render)   (retry)  (validate)     (persist)
//! ```
//!
//! 1. [`detect`]: choose the extractor from the URL shape or a HEAD probe
//! 2. [`html`] / [`pdf`]: produce an [`crate::output::ExtractedContent`];
//!    pdfium runs in `spawn_blocking`
//! 3. [`prompt`]: render the note template
//! 4. [`llm`]: call the model with classification and exponential backoff
//! 5. [`frontmatter`]: validate the YAML header, with bounded repairs
//! 6. [`writer`]: persist the note without overwriting anything
//!
//! [`fetch`] and [`text`] hold the HTTP and text helpers the stages share.

pub mod detect;
pub mod fetch;
pub mod frontmatter;
pub mod html;
pub mod llm;
pub mod pdf;
pub mod prompt;
pub mod text;
pub mod writer;
