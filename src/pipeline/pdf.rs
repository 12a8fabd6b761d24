//! PDF extraction: page text and document metadata via pdfium.
//!
//! The buffer is checked for the `%PDF-` signature before pdfium is touched,
//! so an HTML error page served under a `.pdf` URL fails fast with
//! [`ImportError::InvalidPdf`] (which the front end treats as a blocked
//! download). pdfium calls run inside `spawn_blocking`: the library is
//! synchronous and CPU-bound.
//!
//! Metadata is best-effort. A missing title falls back to a guess from the
//! file name; dates that do not look like `D:YYYYMMDD...` are left empty.

use crate::config::{ImportConfig, PdfMode};
use crate::error::ImportError;
use crate::output::{ExtractedContent, ExtractedFields, PdfContent};
use crate::pipeline::fetch;
use crate::pipeline::text::{collapse_whitespace, source_guess, split_authors, truncate_text};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Every PDF starts with these five bytes.
pub const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";

/// Environment variable naming an explicit libpdfium to bind.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

static RE_PDF_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^D:(\d{4})(\d{2})(\d{2})").unwrap());

/// Knobs for one PDF extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOptions {
    pub max_chars: usize,
    /// Stop after this many pages; `None` reads them all.
    pub max_pages: Option<usize>,
    /// Keep the raw bytes on the result for a native-vision model call.
    pub keep_bytes: bool,
}

impl PdfOptions {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            max_pages: config.pdf_max_pages,
            keep_bytes: config.pdf_mode == PdfMode::NativeVision,
        }
    }
}

/// Download `url` and extract it as a PDF.
///
/// # Errors
/// - [`ImportError::FetchFailed`] / [`ImportError::Network`] from the download
/// - [`ImportError::InvalidPdf`] when the body is not a PDF
/// - [`ImportError::PdfParse`] / [`ImportError::PdfiumUnavailable`] from pdfium
pub async fn extract_pdf(
    client: &Client,
    url: &str,
    opts: &PdfOptions,
) -> Result<ExtractedContent, ImportError> {
    let fetched = fetch::fetch_bytes(client, url).await?;
    let filename = fetched
        .final_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::to_string);
    extract_pdf_bytes(fetched.bytes, fetched.final_url.as_str(), filename.as_deref(), opts).await
}

/// Extract a PDF the caller already holds (manual recovery, local file).
///
/// `url` is the document's origin, used for `source_guess`; `filename` feeds
/// the title fallback.
pub async fn extract_pdf_bytes(
    bytes: Vec<u8>,
    url: &str,
    filename: Option<&str>,
    opts: &PdfOptions,
) -> Result<ExtractedContent, ImportError> {
    check_signature(&bytes)?;

    let max_pages = opts.max_pages;
    let (bytes, parsed) = tokio::task::spawn_blocking(move || {
        let parsed = parse_blocking(&bytes, max_pages);
        (bytes, parsed)
    })
    .await
    .map_err(|e| ImportError::Internal(format!("PDF task panicked: {e}")))?;
    let parsed = parsed?;

    info!(
        pages = parsed.page_count,
        read = parsed.pages_read,
        "PDF parsed"
    );

    let text = assemble_pdf_text(
        &parsed.text,
        parsed.pages_read,
        parsed.page_count,
        opts.max_chars,
    );

    let title = parsed
        .title
        .or_else(|| filename.map(title_from_filename))
        .unwrap_or_default();

    let fields = ExtractedFields {
        title,
        authors: parsed
            .author
            .map(|a| split_authors(&a))
            .unwrap_or_default(),
        published: parsed
            .creation_date
            .map(|d| parse_pdf_date(&d))
            .unwrap_or_default(),
        text,
        source_guess: Url::parse(url).map(|u| source_guess(&u)).unwrap_or_default(),
        links: Vec::new(),
        images: Vec::new(),
    };

    Ok(ExtractedContent::Pdf(PdfContent {
        fields,
        page_count: parsed.page_count,
        raw_bytes: opts.keep_bytes.then_some(bytes),
    }))
}

/// Truncate page text to `max_chars` and disclose a page cap.
///
/// When fewer pages were read than the document has, the
/// `[PDF truncated: ...]` note goes after the character truncation, with its
/// length reserved from the budget, so it survives a char cap as well and the
/// result stays within `max_chars` plus the truncation marker.
pub fn assemble_pdf_text(
    text: &str,
    pages_read: usize,
    page_count: usize,
    max_chars: usize,
) -> String {
    if pages_read >= page_count {
        return truncate_text(text, max_chars);
    }

    let note = format!("\n\n[PDF truncated: extracted the first {pages_read} of {page_count} pages]");
    let budget = max_chars.saturating_sub(note.chars().count());
    let mut out = truncate_text(text, budget);
    out.push_str(&note);
    out
}

/// Reject buffers that do not begin with [`PDF_SIGNATURE`].
pub fn check_signature(bytes: &[u8]) -> Result<(), ImportError> {
    if bytes.starts_with(PDF_SIGNATURE) {
        Ok(())
    } else {
        Err(ImportError::InvalidPdf {
            magic: bytes.iter().take(PDF_SIGNATURE.len()).copied().collect(),
        })
    }
}

/// `D:20240115093000+01'00'` → `2024-01-15`; anything else → empty.
pub fn parse_pdf_date(raw: &str) -> String {
    RE_PDF_DATE
        .captures(raw.trim())
        .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
        .unwrap_or_default()
}

/// `Annual_Report-2023%20final.pdf` → `Annual Report 2023 final`.
pub fn title_from_filename(filename: &str) -> String {
    let decoded = urlencoding::decode(filename)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| filename.to_string());
    let stem = match decoded.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("pdf") => stem.to_string(),
        _ => decoded,
    };
    collapse_whitespace(&stem.replace(['_', '-', '+'], " "))
}

// ── pdfium ───────────────────────────────────────────────────────────────

struct ParsedPdf {
    text: String,
    page_count: usize,
    pages_read: usize,
    title: Option<String>,
    author: Option<String>,
    creation_date: Option<String>,
}

/// Bind libpdfium: `PDFIUM_LIB_PATH` first, then the working directory, then
/// the system library search path.
fn bind_pdfium() -> Result<Pdfium, ImportError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            let lib = if Path::new(&path).is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                PathBuf::from(path)
            };
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ImportError::PdfiumUnavailable(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

fn parse_blocking(bytes: &[u8], max_pages: Option<usize>) -> Result<ParsedPdf, ImportError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ImportError::PdfParse {
            detail: format!("{e:?}"),
        })?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let pages = document.pages();
    let page_count = pages.len() as usize;
    let limit = max_pages.map_or(page_count, |m| m.min(page_count));

    let mut chunks = Vec::with_capacity(limit);
    for (idx, page) in pages.iter().take(limit).enumerate() {
        match page.text() {
            Ok(page_text) => {
                let text = page_text.all();
                let text = text.trim();
                debug!(page = idx + 1, chars = text.chars().count(), "page text extracted");
                if !text.is_empty() {
                    chunks.push(text.to_string());
                }
            }
            Err(e) => warn!(page = idx + 1, error = ?e, "page text unavailable; skipping"),
        }
    }

    Ok(ParsedPdf {
        text: chunks.join("\n\n"),
        page_count,
        pages_read: limit,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::TRUNCATION_MARKER;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn opts() -> PdfOptions {
        PdfOptions {
            max_chars: 1000,
            max_pages: None,
            keep_bytes: false,
        }
    }

    #[test]
    fn signature_accepts_pdf_header() {
        assert!(check_signature(b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn signature_rejects_anything_else() {
        let err = check_signature(b"<!DOCTYPE html><html>").unwrap_err();
        match err {
            ImportError::InvalidPdf { magic } => assert_eq!(magic, b"<!DOC".to_vec()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_signature(b"%PDF").is_err());
        assert!(check_signature(b"").is_err());
        assert!(check_signature(b" %PDF-1.4").is_err());
    }

    #[tokio::test]
    async fn invalid_bytes_fail_before_pdfium() {
        let err = extract_pdf_bytes(b"GIF89a....".to_vec(), "https://x.com/a.pdf", None, &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidPdf { .. }));
        assert!(err.is_download_blocked());
    }

    #[tokio::test]
    async fn html_served_as_pdf_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Access denied</html>"))
            .mount(&server)
            .await;

        let client = fetch::build_client(&ImportConfig::default()).unwrap();
        let err = extract_pdf(&client, &format!("{}/paper.pdf", server.uri()), &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidPdf { .. }));
    }

    #[test]
    fn pdf_dates() {
        assert_eq!(parse_pdf_date("D:20240115093000+01'00'"), "2024-01-15");
        assert_eq!(parse_pdf_date("D:19991231"), "1999-12-31");
        assert_eq!(parse_pdf_date("2024-01-15"), "");
        assert_eq!(parse_pdf_date("D:2024"), "");
        assert_eq!(parse_pdf_date(""), "");
    }

    #[test]
    fn filename_titles() {
        assert_eq!(
            title_from_filename("Annual_Report-2023%20final.pdf"),
            "Annual Report 2023 final"
        );
        assert_eq!(title_from_filename("notes.PDF"), "notes");
        assert_eq!(title_from_filename("v1.2_spec"), "v1.2 spec");
    }

    const PAGE_NOTE: &str = "[PDF truncated: extracted the first 10 of 50 pages]";

    #[test]
    fn page_cap_is_disclosed() {
        let text = assemble_pdf_text("Page one.\n\nPage two.", 10, 50, 40_000);
        assert!(text.starts_with("Page one."));
        assert!(text.ends_with(PAGE_NOTE));
        assert!(!text.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn no_note_when_every_page_was_read() {
        let text = assemble_pdf_text("All pages.", 3, 3, 40_000);
        assert_eq!(text, "All pages.");

        let long = "x".repeat(100);
        let text = assemble_pdf_text(&long, 3, 3, 40);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert!(!text.contains("[PDF truncated"));
    }

    #[test]
    fn page_note_survives_char_cap() {
        let long = "word ".repeat(10_000);
        let text = assemble_pdf_text(&long, 10, 50, 40_000);

        assert!(text.ends_with(PAGE_NOTE), "page-cap note lost");
        assert!(text.contains(TRUNCATION_MARKER));
        assert!(text.chars().count() <= 40_000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn options_follow_pdf_mode() {
        let mut config = ImportConfig::default();
        assert!(!PdfOptions::from_config(&config).keep_bytes);
        config.pdf_mode = PdfMode::NativeVision;
        config.pdf_max_pages = Some(3);
        let o = PdfOptions::from_config(&config);
        assert!(o.keep_bytes);
        assert_eq!(o.max_pages, Some(3));
    }
}
