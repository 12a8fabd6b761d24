//! Output types: extracted content, imported notes, and batch results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Discriminant of [`ExtractedContent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Pdf,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Html => f.write_str("html"),
            ContentKind::Pdf => f.write_str("pdf"),
        }
    }
}

/// An anchor found in the article body, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub text: String,
    pub href: String,
}

/// An image found in the article body, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub alt: String,
    pub src: String,
}

/// Fields shared by every kind of extracted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub title: String,
    pub authors: Vec<String>,
    /// Free-form publication date; empty when unknown.
    pub published: String,
    /// Readable text, truncated to the configured maximum.
    pub text: String,
    /// Hostname of the source without a leading `www.`.
    pub source_guess: String,
    pub links: Vec<LinkRef>,
    pub images: Vec<ImageRef>,
}

/// PDF-specific extraction result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfContent {
    #[serde(flatten)]
    pub fields: ExtractedFields,
    pub page_count: usize,
    /// The original document, kept only for native-vision model calls.
    #[serde(skip)]
    pub raw_bytes: Option<Vec<u8>>,
}

/// Readable content and metadata recovered from a URL.
///
/// Produced once by an extractor and only read afterwards. Serialises with a
/// `kind` discriminant of `"html"` or `"pdf"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExtractedContent {
    #[serde(rename = "html")]
    Article(ExtractedFields),
    #[serde(rename = "pdf")]
    Pdf(PdfContent),
}

impl ExtractedContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            ExtractedContent::Article(_) => ContentKind::Html,
            ExtractedContent::Pdf(_) => ContentKind::Pdf,
        }
    }

    /// The fields common to both kinds.
    pub fn fields(&self) -> &ExtractedFields {
        match self {
            ExtractedContent::Article(fields) => fields,
            ExtractedContent::Pdf(pdf) => &pdf.fields,
        }
    }

    pub fn title(&self) -> &str {
        &self.fields().title
    }

    pub fn text(&self) -> &str {
        &self.fields().text
    }

    /// Raw PDF bytes, when they were retained for native-vision mode.
    pub fn raw_pdf_bytes(&self) -> Option<&[u8]> {
        match self {
            ExtractedContent::Pdf(pdf) => pdf.raw_bytes.as_deref(),
            ExtractedContent::Article(_) => None,
        }
    }
}

/// A validated note produced by one import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedNote {
    pub url: String,
    pub kind: ContentKind,
    /// Title used for the file name.
    pub title: String,
    /// The validated note text (frontmatter + body).
    pub markdown: String,
    /// Where the note was written, when it was persisted.
    pub path: Option<PathBuf>,
}

/// A download the site refused; the user can supply the document instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedImport {
    pub url: String,
    pub reason: String,
}

/// Result of a single-URL import.
///
/// Download blockage is a distinct outcome rather than an error so that any
/// front end can offer the manual-recovery path (see
/// [`crate::import::import_bytes`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImportOutcome {
    Imported(ImportedNote),
    Blocked(BlockedImport),
}

/// One failed batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub url: String,
    pub message: String,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Number of entries handed to the batch.
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Failures in input order.
    pub errors: Vec<BatchError>,
    /// Error report written after the run, if any.
    pub report_path: Option<PathBuf>,
}

impl BatchResult {
    /// Entries that were actually attempted.
    pub fn attempted(&self) -> usize {
        self.success_count + self.failed_count
    }

    /// True when stop-on-error ended the run before every entry was tried.
    pub fn stopped_early(&self) -> bool {
        self.attempted() < self.total
    }
}
