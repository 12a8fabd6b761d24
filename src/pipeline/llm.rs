//! Model invocation with error classification and retry.
//!
//! Every call goes through [`with_retry`], an explicit loop over attempts
//! `0..=max_retries`. Each failure is classified once by [`classify`]:
//!
//! | Failure | Class | Behaviour |
//! |---------|-------|-----------|
//! | HTTP 401 | [`ErrorClass::Auth`] | fail now |
//! | code `insufficient_quota` | [`ErrorClass::Quota`] | fail now |
//! | HTTP 429 | [`ErrorClass::RateLimited`] | retry |
//! | HTTP ≥ 500 | [`ErrorClass::Server`] | retry |
//! | anything else | [`ErrorClass::Other`] | fail now |
//!
//! Retriable failures sleep `retry_backoff_ms × 2^attempt` (500 ms → 1 s →
//! 2 s with the defaults). The sleeper is a parameter so tests can record
//! delays instead of waiting for them.

use crate::config::ImportConfig;
use crate::error::{ImportError, ModelError, QUOTA_EXHAUSTED_CODE};
use crate::prompts::NATIVE_PDF_INSTRUCTION;
use crate::provider::{Attachment, ModelProvider, ModelRequest};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt bound and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Sleep before the retry that follows failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// How a failed model call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Auth,
    Quota,
    RateLimited,
    Server,
    Other,
}

impl ErrorClass {
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorClass::RateLimited | ErrorClass::Server)
    }

    /// Translate the provider error into the pipeline's error type.
    pub fn into_import_error(self, provider: &str, err: ModelError) -> ImportError {
        let provider = provider.to_string();
        let detail = err.message;
        match self {
            ErrorClass::Auth => ImportError::AuthError { provider, detail },
            ErrorClass::Quota => ImportError::QuotaExceeded { provider, detail },
            ErrorClass::RateLimited => ImportError::RateLimited { provider, detail },
            ErrorClass::Server => ImportError::ServerError {
                provider,
                status: err.status.unwrap_or(500),
                detail,
            },
            ErrorClass::Other => ImportError::ModelApi {
                message: match err.status {
                    Some(status) => format!("HTTP {status}: {detail}"),
                    None => detail,
                },
            },
        }
    }
}

/// Classify a provider error. Auth beats quota beats the status checks.
pub fn classify(err: &ModelError) -> ErrorClass {
    if err.status == Some(401) {
        return ErrorClass::Auth;
    }
    if err.code.as_deref() == Some(QUOTA_EXHAUSTED_CODE) {
        return ErrorClass::Quota;
    }
    match err.status {
        Some(429) => ErrorClass::RateLimited,
        Some(s) if s >= 500 => ErrorClass::Server,
        _ => ErrorClass::Other,
    }
}

/// Progress of one retried call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based index of the current attempt.
    pub attempt: u32,
    /// Every backoff slept so far, in order.
    pub delays: Vec<Duration>,
}

/// Run `call` until it succeeds, fails fatally, or attempts run out.
///
/// `call` receives the zero-based attempt number; `sleep` is awaited between
/// attempts (pass `tokio::time::sleep` outside tests). The last error is
/// always returned; nothing is swallowed.
pub async fn with_retry<T, F, Fut, S, SFut>(
    policy: RetryPolicy,
    provider: &str,
    mut sleep: S,
    mut call: F,
) -> Result<T, ImportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let mut state = RetryState::default();
    loop {
        let err = match call(state.attempt).await {
            Ok(value) => {
                if state.attempt > 0 {
                    debug!(attempts = state.attempt + 1, "model call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let class = classify(&err);
        if class.is_retriable() && state.attempt < policy.max_retries {
            let delay = policy.delay_for(state.attempt);
            warn!(
                "Model call failed ({:?}): retry {}/{} after {}ms: {}",
                class,
                state.attempt + 1,
                policy.max_retries,
                delay.as_millis(),
                err
            );
            sleep(delay).await;
            state.delays.push(delay);
            state.attempt += 1;
            continue;
        }

        if class.is_retriable() {
            warn!(attempts = state.attempt + 1, "retries exhausted");
        }
        return Err(class.into_import_error(provider, err));
    }
}

/// Text mode: send the prompt alone.
pub async fn invoke_text(
    provider: &dyn ModelProvider,
    config: &ImportConfig,
    prompt: &str,
) -> Result<String, ImportError> {
    let request =
        ModelRequest::text(config.model.clone(), prompt).with_temperature(config.temperature);
    send(provider, config, &request).await
}

/// Native-vision mode: send the prompt with the PDF attached.
///
/// Fails before any network call when the model is not vision-capable, the
/// provider cannot carry a PDF, or no bytes were retained.
pub async fn invoke_vision(
    provider: &dyn ModelProvider,
    config: &ImportConfig,
    prompt: &str,
    url: &str,
    pdf_bytes: Option<&[u8]>,
) -> Result<String, ImportError> {
    if !config.is_vision_capable() {
        return Err(ImportError::VisionUnsupported {
            model: config.model.clone(),
        });
    }
    if !provider.accepts_pdf() {
        return Err(ImportError::PdfInputUnsupported {
            provider: provider.name().to_string(),
        });
    }
    let bytes = pdf_bytes.ok_or_else(|| ImportError::MissingPdfBytes {
        url: url.to_string(),
    })?;

    let filename = url
        .rsplit('/')
        .next()
        .filter(|name| name.to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or("document.pdf");
    let request = ModelRequest::text(
        config.model.clone(),
        format!("{prompt}\n\n{NATIVE_PDF_INSTRUCTION}"),
    )
    .with_attachment(Attachment::pdf(filename, bytes.to_vec()))
    .with_temperature(config.temperature);

    send(provider, config, &request).await
}

async fn send(
    provider: &dyn ModelProvider,
    config: &ImportConfig,
    request: &ModelRequest,
) -> Result<String, ImportError> {
    with_retry(
        RetryPolicy::from_config(config),
        provider.name(),
        tokio::time::sleep,
        |attempt| {
            debug!(attempt, model = %request.model, "calling model");
            provider.complete(request)
        },
    )
    .await
}
