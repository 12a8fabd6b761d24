//! Adapter for any provider built by `edgequake-llm`'s `ProviderFactory`.
//!
//! [`LlmError`] variants map to statuses directly (`AuthError` → 401,
//! `RateLimited` → 429). `ApiError` / `ProviderError` carry only a message,
//! so for those the status and quota code are read from the text.
//! Unrecognised errors become status-less [`ModelError`]s, which the retry
//! controller treats as non-retriable.
//!
//! edgequake sends attachments as image parts. Only the Gemini backends pass
//! an arbitrary MIME type through as inline data, so native PDF input is
//! limited to those; other backends report [`ModelProvider::accepts_pdf`]
//! as false and the invoker fails before calling them.

use super::{ModelProvider, ModelRequest};
use crate::error::{ModelError, QUOTA_EXHAUSTED_CODE};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static RE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([45]\d\d)\b").unwrap());

/// edgequake backend names that forward a PDF attachment as inline data.
pub const PDF_INLINE_BACKENDS: &[&str] = &["gemini", "vertex-ai"];

/// Wraps an `edgequake-llm` provider.
pub struct EdgequakeProvider {
    inner: Arc<dyn LLMProvider>,
    name: String,
}

impl EdgequakeProvider {
    pub fn new(name: impl Into<String>, inner: Arc<dyn LLMProvider>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }
}

impl std::fmt::Debug for EdgequakeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgequakeProvider")
            .field("name", &self.name)
            .finish()
    }
}

/// Map an edgequake error to a [`ModelError`].
pub(crate) fn error_from_llm(err: &LlmError) -> ModelError {
    let message = err.to_string();
    let status = match err {
        LlmError::AuthError(_) => Some(401),
        LlmError::RateLimited(_) => Some(429),
        LlmError::ApiError(_) | LlmError::ProviderError(_) | LlmError::Unknown(_) => {
            return error_from_message(&message);
        }
        _ => None,
    };

    let mut out = ModelError::new(message.as_str());
    if let Some(status) = status {
        out = out.with_status(status);
    }
    if message.to_ascii_lowercase().contains(QUOTA_EXHAUSTED_CODE) {
        out = out.with_code(QUOTA_EXHAUSTED_CODE);
    }
    out
}

/// Recover status and code from an untyped edgequake error message.
pub(crate) fn error_from_message(message: &str) -> ModelError {
    let lower = message.to_ascii_lowercase();

    let status = if lower.contains("unauthorized") || lower.contains("invalid api key") {
        Some(401)
    } else if lower.contains("rate limit") || lower.contains("too many requests") {
        Some(429)
    } else {
        RE_STATUS
            .captures(message)
            .and_then(|c| c[1].parse::<u16>().ok())
    };

    let mut err = ModelError::new(message);
    if let Some(status) = status {
        err = err.with_status(status);
    }
    if lower.contains(QUOTA_EXHAUSTED_CODE) {
        err = err.with_code(QUOTA_EXHAUSTED_CODE);
    }
    err
}

#[async_trait]
impl ModelProvider for EdgequakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts_pdf(&self) -> bool {
        PDF_INLINE_BACKENDS.contains(&self.inner.name())
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        if request.attachment.is_some() && !self.accepts_pdf() {
            return Err(ModelError::new(format!(
                "provider '{}' cannot take file attachments",
                self.inner.name()
            )));
        }
        let message = match &request.attachment {
            Some(file) => ChatMessage::user_with_images(
                request.prompt.as_str(),
                vec![ImageData::new(file.base64(), file.media_type.as_str())],
            ),
            None => ChatMessage::user(request.prompt.as_str()),
        };
        let options = CompletionOptions {
            temperature: request.temperature,
            ..Default::default()
        };

        let response = self
            .inner
            .chat(&[message], Some(&options))
            .await
            .map_err(|e| error_from_llm(&e))?;

        debug!(
            provider = %self.name,
            input_tokens = response.prompt_tokens,
            output_tokens = response.completion_tokens,
            "chat completion"
        );
        Ok(response.content)
    }
}
