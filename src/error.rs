//! Error types for the url2vault library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * **Fatal for one unit of work** ([`ImportError`]): a single import (or a
//!   single batch item) cannot proceed. Returned as `Err(ImportError)` from the
//!   `import_*` entry points and recorded per item by the batch orchestrator.
//!
//! * **Provider-level** ([`ModelError`]): what a [`crate::provider::ModelProvider`]
//!   reports. It carries the raw HTTP status and provider error code so the
//!   retry controller can classify it; callers only ever see it translated into
//!   an [`ImportError`].
//!
//! * **Non-fatal** ([`ParseInputError`]): one malformed row of a URL list or
//!   CSV. Collected next to the valid entries, never thrown.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Provider code the OpenAI-style APIs return once the account is out of credit.
pub const QUOTA_EXHAUSTED_CODE: &str = "insufficient_quota";

/// All fatal errors for a single import.
#[derive(Debug, Error)]
pub enum ImportError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The server answered with a non-success status.
    #[error("Failed to fetch '{url}': HTTP {status}")]
    FetchFailed { url: String, status: u16 },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Network error fetching '{url}': {reason}\nCheck your internet connection.")]
    Network { url: String, reason: String },

    /// The automated download was refused; the document must be supplied by hand.
    #[error("Download of '{url}' was blocked ({reason}).\nDownload it in a browser and import the file instead.")]
    Blocked { url: String, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The buffer does not start with the `%PDF-` signature.
    #[error("Not a valid PDF: first bytes {magic:?}")]
    InvalidPdf { magic: Vec<u8> },

    /// pdfium could not open or read the document.
    #[error("PDF could not be parsed: {detail}")]
    PdfParse { detail: String },

    /// No pdfium library could be bound.
    #[error(
        "Failed to bind to a pdfium library: {0}\n\
Install libpdfium or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumUnavailable(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// HTTP 401 from the model provider; retrying cannot help.
    #[error("Authentication error from provider '{provider}': {detail}\nCheck your API key.")]
    AuthError { provider: String, detail: String },

    /// The provider reported an exhausted quota; retrying cannot help.
    #[error("Quota exhausted for provider '{provider}': {detail}\nCheck your plan and billing details.")]
    QuotaExceeded { provider: String, detail: String },

    /// HTTP 429 that survived every retry.
    #[error("Rate limit exceeded for provider '{provider}': {detail}")]
    RateLimited { provider: String, detail: String },

    /// HTTP 5xx that survived every retry.
    #[error("Provider '{provider}' server error (HTTP {status}): {detail}")]
    ServerError {
        provider: String,
        status: u16,
        detail: String,
    },

    /// Any other provider failure; not retried.
    #[error("LLM API error: {message}")]
    ModelApi { message: String },

    /// Native-vision mode was requested for a model that cannot read files.
    #[error("Model '{model}' does not support native PDF input.\nUse a vision-capable model or switch --pdf-mode to text.")]
    VisionUnsupported { model: String },

    /// Native-vision mode was requested through a backend that cannot carry a PDF.
    #[error("Provider '{provider}' cannot send a PDF file to the model.\nUse --pdf-mode text, a Gemini provider, or an OpenAI-compatible endpoint (--base-url).")]
    PdfInputUnsupported { provider: String },

    /// Native-vision mode was requested but the PDF bytes were not retained.
    #[error("Native-vision mode needs the PDF bytes, but none were retained for '{url}'")]
    MissingPdfBytes { url: String },

    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The model output has no usable YAML frontmatter.
    #[error("Invalid note frontmatter: {0}")]
    Frontmatter(String),

    /// Could not create or write a note or report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    /// Whether the failure looks like a site refusing automated downloads.
    ///
    /// These are the failures a user can work around by downloading the
    /// document in a browser and handing the bytes to
    /// [`crate::import::import_bytes`].
    pub fn is_download_blocked(&self) -> bool {
        matches!(
            self,
            ImportError::FetchFailed {
                status: 401 | 403,
                ..
            } | ImportError::InvalidPdf { .. }
                | ImportError::Blocked { .. }
        )
    }
}

/// A failed model call as reported by a provider backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModelError {
    /// HTTP status of the failed call, when there was a response.
    pub status: Option<u16>,
    /// Provider-specific error code (e.g. `insufficient_quota`).
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A single rejected row of URL input.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("line {line}: {reason} ('{input}')")]
pub struct ParseInputError {
    /// 1-indexed line number in the original text.
    pub line: usize,
    /// The offending value as written.
    pub input: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failed_display() {
        let e = ImportError::FetchFailed {
            url: "https://example.com/a".into(),
            status: 404,
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 404"), "got: {msg}");
        assert!(msg.contains("example.com/a"));
    }

    #[test]
    fn blocked_detection() {
        let forbidden = ImportError::FetchFailed {
            url: "u".into(),
            status: 403,
        };
        let unauthorized = ImportError::FetchFailed {
            url: "u".into(),
            status: 401,
        };
        let missing = ImportError::FetchFailed {
            url: "u".into(),
            status: 404,
        };
        let bad_pdf = ImportError::InvalidPdf {
            magic: b"<htm".to_vec(),
        };
        assert!(forbidden.is_download_blocked());
        assert!(unauthorized.is_download_blocked());
        assert!(bad_pdf.is_download_blocked());
        assert!(!missing.is_download_blocked());
        assert!(!ImportError::Frontmatter("x".into()).is_download_blocked());
    }

    #[test]
    fn auth_error_display() {
        let e = ImportError::AuthError {
            provider: "openai".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn model_error_builder() {
        let e = ModelError::new("slow down").with_status(429).with_code("rate_limit");
        assert_eq!(e.status, Some(429));
        assert_eq!(e.code.as_deref(), Some("rate_limit"));
        assert_eq!(e.to_string(), "slow down");
    }

    #[test]
    fn parse_input_error_display() {
        let e = ParseInputError {
            line: 3,
            input: "ftp://x".into(),
            reason: "unsupported scheme".into(),
        };
        assert_eq!(e.to_string(), "line 3: unsupported scheme ('ftp://x')");
    }
}
