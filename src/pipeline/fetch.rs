//! HTTP fetching shared by the detector and both extractors.
//!
//! One `reqwest::Client` is built per [`crate::import::ImportContext`] and
//! reused for every request, so connection pools survive across a batch. All
//! status ≥ 400 responses become [`ImportError::FetchFailed`] carrying the
//! status code, which the single-URL front end uses to spot blocked downloads.

use crate::config::ImportConfig;
use crate::error::ImportError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// A downloaded HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects; relative links resolve against this.
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

/// A downloaded binary document.
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub final_url: Url,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Build the download client from the config's User-Agent and timeout.
pub fn build_client(config: &ImportConfig) -> Result<Client, ImportError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ImportError::Internal(format!("failed to build HTTP client: {e}")))
}

/// GET a page as text.
pub async fn fetch_text(client: &Client, url: &str) -> Result<FetchedPage, ImportError> {
    info!("Fetching page: {}", url);
    let response = send_get(client, url).await?;
    let final_url = response.url().clone();
    let content_type = header_content_type(response.headers());

    let body = response.text().await.map_err(|e| network_error(url, &e))?;
    debug!(bytes = body.len(), %final_url, "page downloaded");

    Ok(FetchedPage {
        final_url,
        content_type,
        body,
    })
}

/// GET a document as raw bytes.
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<FetchedBytes, ImportError> {
    info!("Downloading document: {}", url);
    let response = send_get(client, url).await?;
    let final_url = response.url().clone();
    let content_type = header_content_type(response.headers());

    let bytes = response.bytes().await.map_err(|e| network_error(url, &e))?;
    debug!(bytes = bytes.len(), %final_url, "document downloaded");

    Ok(FetchedBytes {
        final_url,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// HEAD `url` and return its declared content type.
///
/// Errors are returned raw; the detector decides to absorb them.
pub async fn probe_content_type(client: &Client, url: &str) -> Result<Option<String>, ImportError> {
    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| network_error(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::FetchFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(header_content_type(response.headers()))
}

async fn send_get(client: &Client, url: &str) -> Result<reqwest::Response, ImportError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| network_error(url, &e))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(ImportError::FetchFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn header_content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn network_error(url: &str, e: &reqwest::Error) -> ImportError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    ImportError::Network {
        url: url.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        build_client(&ImportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn fetch_text_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .and(header("user-agent", crate::config::DEFAULT_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>ok</body></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/article", server.uri());
        let page = fetch_text(&client(), &url).await.expect("fetch ok");
        assert!(page.body.contains("ok"));
        assert!(page.content_type.unwrap().starts_with("text/html"));
        assert_eq!(page.final_url.as_str(), url);
    }

    #[tokio::test]
    async fn status_400_and_above_fails_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let url = format!("{}/forbidden", server.uri());
        let err = fetch_bytes(&client(), &url).await.unwrap_err();
        assert!(matches!(err, ImportError::FetchFailed { status: 403, .. }));
        assert!(err.is_download_blocked());
    }

    #[tokio::test]
    async fn probe_returns_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/doc"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-type", "application/pdf"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/doc", server.uri());
        let ct = probe_content_type(&client(), &url).await.unwrap();
        assert_eq!(ct.as_deref(), Some("application/pdf"));
    }
}
