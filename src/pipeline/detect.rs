//! Content-type detection: decide between the HTML and PDF extractors.
//!
//! Cheap signals first: a `.pdf` path suffix or a `format=pdf` query
//! parameter settles it without touching the network. Otherwise a HEAD probe
//! reads the declared `Content-Type`. A failed probe (network error, 405 for
//! HEAD, ...) is not an error here: it defaults to HTML, and the HTML
//! extractor's own fallbacks take over from there.

use crate::pipeline::fetch;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Media type token that marks a PDF.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Detector verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub is_pdf: bool,
    /// Declared or inferred content type; empty when the server sent none.
    pub content_type: String,
}

impl Detection {
    fn pdf() -> Self {
        Self {
            is_pdf: true,
            content_type: PDF_MEDIA_TYPE.to_string(),
        }
    }

    fn html_fallback() -> Self {
        Self {
            is_pdf: false,
            content_type: "text/html".to_string(),
        }
    }
}

/// Classify `url` from its shape alone; `None` when the URL gives no hint.
pub fn detect_from_url(url: &str) -> Option<Detection> {
    let parsed = Url::parse(url).ok()?;
    let path_is_pdf = parsed.path().to_ascii_lowercase().ends_with(".pdf");
    let format_is_pdf = parsed
        .query_pairs()
        .any(|(k, v)| k.eq_ignore_ascii_case("format") && v.eq_ignore_ascii_case("pdf"));

    (path_is_pdf || format_is_pdf).then(Detection::pdf)
}

/// Classify `url` as HTML or PDF, probing the server only when needed.
pub async fn detect(client: &Client, url: &str) -> Detection {
    if let Some(hit) = detect_from_url(url) {
        debug!(%url, "PDF detected from URL shape");
        return hit;
    }

    match fetch::probe_content_type(client, url).await {
        Ok(content_type) => {
            let content_type = content_type.unwrap_or_default();
            let is_pdf = content_type.to_ascii_lowercase().contains(PDF_MEDIA_TYPE);
            debug!(%url, %content_type, is_pdf, "content type probed");
            Detection {
                is_pdf,
                content_type,
            }
        }
        Err(e) => {
            debug!(%url, error = %e, "content-type probe failed; assuming HTML");
            Detection::html_fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        fetch::build_client(&ImportConfig::default()).unwrap()
    }

    #[test]
    fn pdf_suffix_needs_no_network() {
        let d = detect_from_url("https://x.com/doc.pdf").expect("hint");
        assert!(d.is_pdf);
        assert_eq!(d.content_type, PDF_MEDIA_TYPE);
        assert!(detect_from_url("https://x.com/DOC.PDF?dl=1").is_some());
    }

    #[test]
    fn format_query_parameter() {
        assert!(detect_from_url("https://x.com/export?id=4&format=PDF").is_some());
        assert!(detect_from_url("https://x.com/export?format=html").is_none());
        assert!(detect_from_url("https://x.com/pdf-guide").is_none());
    }

    #[tokio::test]
    async fn detect_short_circuits_before_probe() {
        // Unroutable host: any network call would fail and fall back to HTML.
        let d = detect(&client(), "http://127.0.0.1:9/paper.pdf").await;
        assert!(d.is_pdf);
    }

    #[tokio::test]
    async fn detect_uses_head_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf; qs=0.001"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let d = detect(&client(), &format!("{}/download/42", server.uri())).await;
        assert!(d.is_pdf);
    }

    #[tokio::test]
    async fn failed_probe_defaults_to_html() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let d = detect(&client(), &format!("{}/article", server.uri())).await;
        assert!(!d.is_pdf);
    }
}
