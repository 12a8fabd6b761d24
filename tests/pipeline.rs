//! Integration tests for the full import pipeline.
//!
//! Pages are served by a local `wiremock` server and the model is either a
//! scripted in-memory provider or the OpenAI-compatible client pointed at a
//! mock endpoint, so no network access or API key is needed.
//!
//! Run with:
//!   cargo test --test pipeline
//!
//! Library logs are shown with e.g. `RUST_LOG=url2vault=debug`.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use url2vault::{
    import_batch, import_bytes, import_to_file, ContentKind, ImportConfig, ImportContext,
    ImportError, ImportOutcome, ModelError, ModelProvider, ModelRequest, UrlEntry,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const ARTICLE_HTML: &str = r#"<!doctype html>
<html>
<head>
  <title>Drone Roundup | Example News</title>
  <meta property="og:title" content="Drone Roundup">
  <meta name="author" content="Jane Doe">
  <meta property="article:published_time" content="2025-03-14T09:00:00Z">
</head>
<body>
  <nav><a href="/">Home</a> <a href="/world">World</a></nav>
  <article class="post-content">
    <p>Small quadcopters are now the most common reconnaissance tool on the front line, according to field reports.</p>
    <p>Manufacturers have doubled output since last spring, while prices for basic airframes have fallen by a third.</p>
    <p>Analysts expect counter-drone systems to dominate procurement budgets next year, <a href="/analysis">see our analysis</a>.</p>
  </article>
  <footer>Copyright Example News</footer>
</body>
</html>"#;

const NOTE: &str = "---\n\
title: \"Drone Roundup\"\n\
source: \"example.com\"\n\
tags:\n  - drones\n  - news\n\
---\n\
## Summary\n\nQuadcopters dominate reconnaissance.\n";

/// Returns the same note for every call and records each prompt.
struct ScriptedProvider {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(self.reply.clone())
    }
}

/// Route library logs through the test harness's captured output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(dir: &TempDir, provider: Arc<ScriptedProvider>) -> ImportConfig {
    init_tracing();
    ImportConfig::builder()
        .provider(provider)
        .output_dir(dir.path())
        .default_tags("News, drones")
        .batch_delay_ms(0)
        .build()
        .unwrap()
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body.to_string(), "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

// ── Single import ────────────────────────────────────────────────────────────

#[tokio::test]
async fn html_article_becomes_a_note_on_disk() {
    let server = MockServer::start().await;
    serve(&server, "/article", 200, ARTICLE_HTML).await;

    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(NOTE);
    let config = config(&dir, provider.clone());
    let ctx = ImportContext::new(&config).unwrap();

    let url = format!("{}/article", server.uri());
    let outcome = import_to_file(&ctx, &url, &config).await.unwrap();

    let ImportOutcome::Imported(note) = outcome else {
        panic!("expected an imported note, got {outcome:?}");
    };
    assert_eq!(note.kind, ContentKind::Html);
    assert_eq!(note.title, "Drone Roundup");

    let path = note.path.expect("note saved");
    assert_eq!(path, dir.path().join("Drone Roundup.md"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("---\ntitle: \"Drone Roundup\""));
    assert!(written.ends_with("reconnaissance.\n"));

    let prompts = provider.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains(&url));
    assert!(prompt.contains("Jane Doe"));
    assert!(prompt.contains("Manufacturers have doubled output"));
    assert!(!prompt.contains("Copyright Example News"));
    assert!(prompt.contains("- news"));
    assert!(prompt.contains("- drones"));
}

#[tokio::test]
async fn same_title_twice_gets_a_numbered_file() {
    let server = MockServer::start().await;
    serve(&server, "/article", 200, ARTICLE_HTML).await;

    let dir = TempDir::new().unwrap();
    let config = config(&dir, ScriptedProvider::new(NOTE));
    let ctx = ImportContext::new(&config).unwrap();
    let url = format!("{}/article", server.uri());

    import_to_file(&ctx, &url, &config).await.unwrap();
    let second = import_to_file(&ctx, &url, &config).await.unwrap();

    let ImportOutcome::Imported(note) = second else {
        panic!("expected an imported note");
    };
    assert_eq!(note.path.unwrap(), dir.path().join("Drone Roundup (2).md"));
}

#[tokio::test]
async fn forbidden_download_is_blocked_then_recovered_from_bytes() {
    let server = MockServer::start().await;
    serve(&server, "/paywalled", 403, "<h1>Access denied</h1>").await;

    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(NOTE);
    let config = config(&dir, provider.clone());
    let ctx = ImportContext::new(&config).unwrap();
    let url = format!("{}/paywalled", server.uri());

    let outcome = import_to_file(&ctx, &url, &config).await.unwrap();
    let ImportOutcome::Blocked(blocked) = outcome else {
        panic!("expected a blocked outcome");
    };
    assert_eq!(blocked.url, url);
    assert!(blocked.reason.contains("403"), "reason: {}", blocked.reason);
    assert_eq!(provider.calls(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    // The user saved the page by hand.
    let note = import_bytes(&ctx, &url, ARTICLE_HTML.as_bytes().to_vec(), None, &config)
        .await
        .unwrap();
    assert_eq!(note.title, "Drone Roundup");
    assert_eq!(provider.calls(), 1);
    assert!(provider.prompts.lock().unwrap()[0].contains("Small quadcopters"));
}

#[tokio::test]
async fn missing_page_is_a_hard_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = config(&dir, ScriptedProvider::new(NOTE));
    let ctx = ImportContext::new(&config).unwrap();

    let err = import_to_file(&ctx, &format!("{}/gone", server.uri()), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::FetchFailed { status: 404, .. }), "got {err:?}");
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_records_failures_and_writes_report() {
    let server = MockServer::start().await;
    serve(&server, "/article", 200, ARTICLE_HTML).await;

    let dir = TempDir::new().unwrap();
    let config = config(&dir, ScriptedProvider::new(NOTE));
    let ctx = ImportContext::new(&config).unwrap();

    let entries: Vec<UrlEntry> = ["/article", "/gone", "/article"]
        .iter()
        .map(|p| UrlEntry {
            url: format!("{}{p}", server.uri()),
            label: None,
        })
        .collect();

    let result = import_batch(&ctx, &entries, &config).await;

    assert_eq!(result.total, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.errors[0].url, entries[1].url);
    assert!(result.errors[0].message.contains("404"));

    let report = result.report_path.expect("error report");
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains(&entries[1].url));

    assert!(dir.path().join("Drone Roundup.md").exists());
    assert!(dir.path().join("Drone Roundup (2).md").exists());
}

#[tokio::test]
async fn batch_stops_at_first_failure_when_asked() {
    let server = MockServer::start().await;
    serve(&server, "/article", 200, ARTICLE_HTML).await;

    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(NOTE);
    let mut config = config(&dir, provider.clone());
    config.continue_on_error = false;
    config.write_error_report = false;
    let ctx = ImportContext::new(&config).unwrap();

    let entries: Vec<UrlEntry> = ["/gone", "/article"]
        .iter()
        .map(|p| UrlEntry {
            url: format!("{}{p}", server.uri()),
            label: None,
        })
        .collect();

    let result = import_batch(&ctx, &entries, &config).await;
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.success_count, 0);
    assert!(result.stopped_early());
    assert_eq!(provider.calls(), 0);
    assert!(result.report_path.is_none());
}

// ── OpenAI-compatible endpoint ───────────────────────────────────────────────

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn rate_limited_model_is_retried_until_success() {
    let server = MockServer::start().await;
    serve(&server, "/article", 200, ARTICLE_HTML).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": { "message": "Rate limit reached", "type": "rate_limit_exceeded" }
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(NOTE)))
        .expect(1)
        .mount(&server)
        .await;

    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = ImportConfig::builder()
        .base_url(format!("{}/v1", server.uri()))
        .api_key("test-key")
        .model("gpt-4.1-mini")
        .retry_backoff_ms(1)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let ctx = ImportContext::new(&config).unwrap();

    let outcome = import_to_file(&ctx, &format!("{}/article", server.uri()), &config)
        .await
        .unwrap();
    assert!(matches!(outcome, ImportOutcome::Imported(_)));
    assert!(dir.path().join("Drone Roundup.md").exists());
}

#[tokio::test]
async fn invalid_api_key_fails_without_retrying() {
    let server = MockServer::start().await;
    serve(&server, "/article", 200, ARTICLE_HTML).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = ImportConfig::builder()
        .base_url(format!("{}/v1", server.uri()))
        .api_key("wrong")
        .retry_backoff_ms(1)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let ctx = ImportContext::new(&config).unwrap();

    let err = import_to_file(&ctx, &format!("{}/article", server.uri()), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::AuthError { .. }), "got {err:?}");
}
