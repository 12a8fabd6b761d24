//! Single-item import: URL (or supplied bytes) → validated note.
//!
//! ## Flow
//!
//! ```text
//! import_url ─▶ detect ─▶ extract ─▶ build_prompt ─▶ invoke ─▶ validate
//!                              │
//!                              └─ 401/403 or bad PDF signature ─▶ ImportOutcome::Blocked
//! ```
//!
//! A blocked download is not an error here: the caller gets
//! [`ImportOutcome::Blocked`] and may ask the user for the document, then
//! call [`import_bytes`] with it.

use crate::config::{ImportConfig, PdfMode};
use crate::error::ImportError;
use crate::output::{BlockedImport, ContentKind, ExtractedContent, ImportOutcome, ImportedNote};
use crate::pipeline::frontmatter::{ensure_frontmatter_present, frontmatter_title};
use crate::pipeline::pdf::{PdfOptions, PDF_SIGNATURE};
use crate::pipeline::{detect, fetch, html, llm, pdf, prompt, writer};
use crate::provider::ProviderCache;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

/// Title used when neither the note nor the extraction provides one.
pub const FALLBACK_TITLE: &str = "article";

/// Shared state for a run: one HTTP client and the provider cache.
///
/// Create one per session (or per batch) and pass it to every import so
/// connections and provider clients are reused.
#[derive(Debug)]
pub struct ImportContext {
    client: Client,
    providers: ProviderCache,
}

impl ImportContext {
    pub fn new(config: &ImportConfig) -> Result<Self, ImportError> {
        Ok(Self {
            client: fetch::build_client(config)?,
            providers: ProviderCache::new(),
        })
    }
}

/// Detect and extract `url` without calling a model.
pub async fn extract(
    ctx: &ImportContext,
    url: &str,
    config: &ImportConfig,
) -> Result<ExtractedContent, ImportError> {
    let detection = detect::detect(&ctx.client, url).await;
    let content = if detection.is_pdf {
        pdf::extract_pdf(&ctx.client, url, &PdfOptions::from_config(config)).await?
    } else {
        html::extract_html(&ctx.client, url, config.max_chars).await?
    };

    if content.text().trim().is_empty() {
        warn!(%url, kind = %content.kind(), "extraction produced no text; continuing with metadata only");
    }
    Ok(content)
}

/// Import one URL into a validated note (not yet written to disk).
///
/// # Errors
/// Any fatal fetch, extraction, model or validation error. Download blockage
/// is reported as `Ok(ImportOutcome::Blocked)` instead.
pub async fn import_url(
    ctx: &ImportContext,
    url: &str,
    config: &ImportConfig,
) -> Result<ImportOutcome, ImportError> {
    info!("Importing {}", url);
    let content = match extract(ctx, url, config).await {
        Ok(content) => content,
        Err(e) if e.is_download_blocked() => {
            warn!(%url, error = %e, "download blocked");
            return Ok(ImportOutcome::Blocked(BlockedImport {
                url: url.to_string(),
                reason: e.to_string(),
            }));
        }
        Err(e) => return Err(e),
    };

    let note = note_from_content(ctx, url, &content, config).await?;
    Ok(ImportOutcome::Imported(note))
}

/// Manual recovery: import a document the user downloaded themselves.
///
/// Bytes starting with `%PDF-` go to the PDF extractor, anything else is
/// parsed as HTML. `url` is the document's original address.
pub async fn import_bytes(
    ctx: &ImportContext,
    url: &str,
    bytes: Vec<u8>,
    filename: Option<&str>,
    config: &ImportConfig,
) -> Result<ImportedNote, ImportError> {
    let content = if bytes.starts_with(PDF_SIGNATURE) {
        pdf::extract_pdf_bytes(bytes, url, filename, &PdfOptions::from_config(config)).await?
    } else {
        let page_url = Url::parse(url)
            .map_err(|e| ImportError::InvalidConfig(format!("invalid source URL '{url}': {e}")))?;
        html::extract_from_html(&String::from_utf8_lossy(&bytes), &page_url, config.max_chars)
    };
    note_from_content(ctx, url, &content, config).await
}

/// Import `url` and write the note into `config.output_dir`.
///
/// A blocked download is returned as [`ImportOutcome::Blocked`] untouched.
pub async fn import_to_file(
    ctx: &ImportContext,
    url: &str,
    config: &ImportConfig,
) -> Result<ImportOutcome, ImportError> {
    match import_url(ctx, url, config).await? {
        ImportOutcome::Imported(note) => Ok(ImportOutcome::Imported(save_note(note, config).await?)),
        blocked => Ok(blocked),
    }
}

/// Import and save `url`, treating a blocked download as a failure.
///
/// This is the per-item pipeline of a batch run.
pub async fn import_and_save(
    ctx: &ImportContext,
    url: &str,
    config: &ImportConfig,
) -> Result<ImportedNote, ImportError> {
    match import_to_file(ctx, url, config).await? {
        ImportOutcome::Imported(note) => Ok(note),
        ImportOutcome::Blocked(b) => Err(ImportError::Blocked {
            url: b.url,
            reason: b.reason,
        }),
    }
}

/// Write `note` into `config.output_dir`, recording the path used.
pub async fn save_note(mut note: ImportedNote, config: &ImportConfig) -> Result<ImportedNote, ImportError> {
    let path = writer::write_note(&config.output_dir, &note.title, &note.markdown).await?;
    note.path = Some(path);
    Ok(note)
}

async fn note_from_content(
    ctx: &ImportContext,
    url: &str,
    content: &ExtractedContent,
    config: &ImportConfig,
) -> Result<ImportedNote, ImportError> {
    let provider = ctx.providers.get_or_create(config)?;
    let prompt = prompt::build_prompt(url, content, config.default_tags.as_str(), config.template());

    let raw = match (content.kind(), config.pdf_mode) {
        (ContentKind::Pdf, PdfMode::NativeVision) => {
            llm::invoke_vision(provider.as_ref(), config, &prompt, url, content.raw_pdf_bytes()).await?
        }
        _ => llm::invoke_text(provider.as_ref(), config, &prompt).await?,
    };

    let markdown = ensure_frontmatter_present(&raw)?;
    // Frontmatter title, then the extracted page title, then FALLBACK_TITLE.
    // The file name comes from this via `writer::sanitize_filename`, which
    // turns reserved path characters into spaces rather than dropping them.
    let title = frontmatter_title(&markdown)
        .or_else(|| Some(content.title().trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    info!(%url, %title, chars = markdown.len(), "note ready");
    Ok(ImportedNote {
        url: url.to_string(),
        kind: content.kind(),
        title,
        markdown,
        path: None,
    })
}
