//! # url2vault
//!
//! Turn web articles and PDFs into structured Markdown notes with an LLM.
//!
//! Give it a URL (or a list of them) and it decides whether the target is an
//! HTML page or a PDF, extracts the readable text and metadata, asks a model
//! to write an Obsidian-style note with YAML frontmatter, validates that
//! frontmatter, and writes the note into a vault directory.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Detect     URL shape (.pdf, format=pdf) or HEAD Content-Type
//!  ├─ 2. Extract    HTML readability scoring | PDF text via pdfium
//!  ├─ 3. Prompt     note template + metadata + default tags
//!  ├─ 4. Model      retry with backoff on 429/5xx, fail fast on 401/quota
//!  ├─ 5. Validate   YAML frontmatter must parse as a mapping
//!  └─ 6. Write      <title>.md in the output directory, never overwriting
//! ```
//!
//! Batches run the same pipeline one URL at a time with a delay in between,
//! and collect failures into a [`BatchResult`] (plus an optional report file).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use url2vault::{import_to_file, ImportConfig, ImportContext, ImportOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ImportConfig::builder()
//!         .output_dir("vault/inbox")
//!         .default_tags("news, drones")
//!         .build()?;
//!     let ctx = ImportContext::new(&config)?;
//!
//!     match import_to_file(&ctx, "https://example.com/article", &config).await? {
//!         ImportOutcome::Imported(note) => println!("wrote {:?}", note.path),
//!         ImportOutcome::Blocked(b) => eprintln!("download blocked: {}", b.reason),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `url2vault` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! url2vault = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod import;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod tags;
pub mod urls;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{import_batch, run_batch};
pub use config::{ImportConfig, ImportConfigBuilder, PdfMode};
pub use error::{ImportError, ModelError, ParseInputError};
pub use import::{extract, import_bytes, import_to_file, import_url, save_note, ImportContext};
pub use output::{
    BatchError, BatchResult, BlockedImport, ContentKind, ExtractedContent, ExtractedFields,
    ImageRef, ImportOutcome, ImportedNote, LinkRef, PdfContent,
};
pub use pipeline::frontmatter::ensure_frontmatter_present;
pub use pipeline::prompt::build_prompt;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{ModelProvider, ModelRequest};
pub use tags::{normalize_tags, TagInput};
pub use urls::{parse_url_input, ParsedUrlInput, UrlEntry};
