//! OpenAI-compatible chat completions over plain `reqwest`.
//!
//! Talking to the REST API directly keeps the HTTP status and the provider's
//! `error.code` intact, which is exactly what retry classification needs.
//! PDFs travel as a `file` content part holding a base64 data URI.

use super::{ModelProvider, ModelRequest};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for `{base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(request: &ModelRequest) -> Value {
        let content = match &request.attachment {
            None => Value::String(request.prompt.clone()),
            Some(file) => json!([
                {
                    "type": "file",
                    "file": {
                        "filename": file.filename,
                        "file_data": file.data_uri(),
                    }
                },
                { "type": "text", "text": request.prompt },
            ]),
        };

        let mut body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": content }],
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChoiceRaw>,
}

#[derive(Deserialize)]
struct ChoiceRaw {
    message: MessageRaw,
}

#[derive(Deserialize)]
struct MessageRaw {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Build a [`ModelError`] from a non-success response body.
fn api_error(status: u16, body: &str) -> ModelError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope
                .error
                .code
                .and_then(|c| match c {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .or(envelope.error.kind);
            let message = envelope
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {status}"));
            let err = ModelError::new(message).with_status(status);
            match code {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        Err(_) => {
            let snippet: String = body.chars().take(300).collect();
            let message = if snippet.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                snippet
            };
            ModelError::new(message).with_status(status)
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let start = Instant::now();
        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&Self::request_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "model request failed");
            ModelError::new(format!("request to {} failed: {e}", self.base_url))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "model API error");
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ModelError::new(format!("unreadable model response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::new("No response content from model"))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "chat completion"
        );
        Ok(content)
    }
}
