//! Configuration types for URL imports.
//!
//! Every import and batch knob lives in [`ImportConfig`], built via its
//! [`ImportConfigBuilder`]. One struct means a single value can be cloned into
//! each batch item, logged, and diffed between runs.
//!
//! Persistence of these settings belongs to the host (CLI flags, environment,
//! a settings file); this module only defines the values and their defaults.

use crate::error::ImportError;
use crate::progress::ProgressCallback;
use crate::provider::ModelProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Browser-like User-Agent; several news sites reject obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Default model identifier when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Model-name fragments known to accept PDF file input.
pub const DEFAULT_VISION_MODELS: &[&str] = &[
    "gpt-4o", "gpt-4.1", "gpt-5", "o1", "o3", "o4", "claude", "gemini",
];

/// Configuration for a single import or a batch run.
///
/// Built via [`ImportConfig::builder()`] or using [`ImportConfig::default()`].
///
/// # Example
/// ```rust
/// use url2vault::{ImportConfig, PdfMode};
///
/// let config = ImportConfig::builder()
///     .model("gpt-4.1")
///     .max_chars(20_000)
///     .pdf_mode(PdfMode::NativeVision)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ImportConfig {
    /// Provider name (`openai`, `anthropic`, `gemini`, `ollama`, ...).
    /// If None, the provider is inferred from `base_url` and the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn ModelProvider>>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Base URL of an OpenAI-compatible endpoint, e.g. `http://localhost:11434/v1`.
    pub base_url: Option<String>,

    /// API key. Falls back to `OPENAI_API_KEY` for OpenAI-compatible endpoints.
    pub api_key: Option<String>,

    /// Directory notes and error reports are written to. Default: `.`.
    pub output_dir: PathBuf,

    /// Comma-separated tags suggested to the model for every note.
    pub default_tags: String,

    /// Prompt template override. If None, uses [`crate::prompts::DEFAULT_NOTE_TEMPLATE`].
    pub template: Option<String>,

    /// Maximum characters of extracted text sent to the model. Default: 40 000.
    ///
    /// Long-form pages can run to hundreds of thousands of characters; the
    /// note only needs the substance, and the prompt must fit the context window.
    pub max_chars: usize,

    /// Maximum retry attempts for retriable model failures (429 / 5xx). Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Pause between consecutive batch items in milliseconds. Default: 1500.
    pub batch_delay_ms: u64,

    /// Keep going after a failed batch item. Default: true.
    pub continue_on_error: bool,

    /// Write a Markdown error report after a batch with failures. Default: true.
    pub write_error_report: bool,

    /// Read at most this many PDF pages. Default: None (all pages).
    pub pdf_max_pages: Option<usize>,

    /// How PDFs are handed to the model. Default: [`PdfMode::TextExtraction`].
    pub pdf_mode: PdfMode,

    /// Model-name fragments treated as able to read PDF files natively.
    pub vision_models: Vec<String>,

    /// User-Agent for page and PDF downloads.
    pub user_agent: String,

    /// Timeout for page/PDF downloads and content-type probes in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for a single model call in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Sampling temperature. None leaves the provider default in place.
    pub temperature: Option<f32>,

    /// Optional per-item progress callback for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            provider_name: None,
            provider: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key: None,
            output_dir: PathBuf::from("."),
            default_tags: String::new(),
            template: None,
            max_chars: 40_000,
            max_retries: 3,
            retry_backoff_ms: 500,
            batch_delay_ms: 1500,
            continue_on_error: true,
            write_error_report: true,
            pdf_max_pages: None,
            pdf_mode: PdfMode::default(),
            vision_models: DEFAULT_VISION_MODELS.iter().map(|s| s.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            api_timeout_secs: 180,
            temperature: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ImportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportConfig")
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn ModelProvider>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("output_dir", &self.output_dir)
            .field("default_tags", &self.default_tags)
            .field("max_chars", &self.max_chars)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("continue_on_error", &self.continue_on_error)
            .field("write_error_report", &self.write_error_report)
            .field("pdf_max_pages", &self.pdf_max_pages)
            .field("pdf_mode", &self.pdf_mode)
            .finish()
    }
}

impl ImportConfig {
    /// Create a new builder for `ImportConfig`.
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether the configured model is flagged as able to read PDF files.
    pub fn is_vision_capable(&self) -> bool {
        let model = self.model.to_lowercase();
        self.vision_models
            .iter()
            .any(|fragment| !fragment.is_empty() && model.contains(&fragment.to_lowercase()))
    }

    /// The prompt template in effect.
    pub fn template(&self) -> &str {
        self.template
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_NOTE_TEMPLATE)
    }
}

/// Builder for [`ImportConfig`].
#[derive(Debug)]
pub struct ImportConfigBuilder {
    config: ImportConfig,
}

impl ImportConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn default_tags(mut self, tags: impl Into<String>) -> Self {
        self.config.default_tags = tags.into();
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.config.template = Some(template.into());
        self
    }

    pub fn max_chars(mut self, n: usize) -> Self {
        self.config.max_chars = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.batch_delay_ms = ms;
        self
    }

    pub fn continue_on_error(mut self, v: bool) -> Self {
        self.config.continue_on_error = v;
        self
    }

    pub fn write_error_report(mut self, v: bool) -> Self {
        self.config.write_error_report = v;
        self
    }

    /// Cap PDF extraction at `n` pages; `0` means no cap.
    pub fn pdf_max_pages(mut self, n: usize) -> Self {
        self.config.pdf_max_pages = if n == 0 { None } else { Some(n) };
        self
    }

    pub fn pdf_mode(mut self, mode: PdfMode) -> Self {
        self.config.pdf_mode = mode;
        self
    }

    pub fn vision_models(mut self, models: Vec<String>) -> Self {
        self.config.vision_models = models;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ImportConfig, ImportError> {
        let c = &self.config;
        if c.max_chars == 0 {
            return Err(ImportError::InvalidConfig(
                "max_chars must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ImportError::InvalidConfig("model must not be empty".into()));
        }
        if let Some(ref base) = c.base_url {
            if url::Url::parse(base).is_err() {
                return Err(ImportError::InvalidConfig(format!(
                    "base_url is not a valid URL: {base}"
                )));
            }
        }
        if c.retry_backoff_ms > 60_000 {
            return Err(ImportError::InvalidConfig(format!(
                "retry_backoff_ms must be ≤ 60000, got {}",
                c.retry_backoff_ms
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a PDF reaches the model.
///
/// | Mode | What the model sees |
/// |------|---------------------|
/// | `TextExtraction` | pdfium-extracted text inside the prompt (default, any model) |
/// | `NativeVision` | the prompt plus the original PDF as a file attachment (vision models only) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfMode {
    #[default]
    TextExtraction,
    NativeVision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ImportConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 500);
        assert!(c.continue_on_error);
        assert!(c.write_error_report);
        assert_eq!(c.pdf_mode, PdfMode::TextExtraction);
        assert!(c.pdf_max_pages.is_none());
    }

    #[test]
    fn zero_page_cap_means_unlimited() {
        let c = ImportConfig::builder().pdf_max_pages(0).build().unwrap();
        assert!(c.pdf_max_pages.is_none());
        let c = ImportConfig::builder().pdf_max_pages(12).build().unwrap();
        assert_eq!(c.pdf_max_pages, Some(12));
    }

    #[test]
    fn build_rejects_zero_max_chars() {
        let err = ImportConfig::builder().max_chars(0).build().unwrap_err();
        assert!(matches!(err, ImportError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_bad_base_url() {
        let err = ImportConfig::builder()
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn vision_capability() {
        let c = ImportConfig::builder().model("gpt-4o-mini").build().unwrap();
        assert!(c.is_vision_capable());
        let c = ImportConfig::builder().model("gpt-3.5-turbo").build().unwrap();
        assert!(!c.is_vision_capable());
        let c = ImportConfig::builder()
            .model("my-local-model")
            .vision_models(vec!["local".into()])
            .build()
            .unwrap();
        assert!(c.is_vision_capable());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ImportConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
