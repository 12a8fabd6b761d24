//! Model providers: the seam between the import pipeline and an LLM API.
//!
//! The pipeline only needs "send this prompt (and maybe a file), get text
//! back", expressed by [`ModelProvider`]. Two backends implement it:
//!
//! | Backend | Used for |
//! |---------|----------|
//! | [`OpenAiCompatProvider`] | OpenAI and any `/chat/completions`-compatible endpoint; reports exact HTTP status and error code |
//! | [`EdgequakeProvider`] | every other provider `edgequake-llm` knows (anthropic, gemini, ollama, ...) |
//!
//! Backends report failures as [`ModelError`] so the retry controller can
//! classify them without knowing which API produced them.
//!
//! Construction goes through [`ProviderCache`], which memoises one client per
//! (provider, endpoint, credential, model) for the life of an
//! [`crate::import::ImportContext`].

mod cache;
mod edgequake;
mod openai_compat;

pub use cache::{resolve_provider_spec, ProviderCache, ProviderSpec};
pub use edgequake::EdgequakeProvider;
pub use openai_compat::{OpenAiCompatProvider, DEFAULT_OPENAI_BASE_URL};

use crate::error::ModelError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// A file sent alongside the prompt (native-vision mode).
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn pdf(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            media_type: crate::pipeline::detect::PDF_MEDIA_TYPE.to_string(),
            data,
        }
    }

    /// Base64 payload without any prefix.
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:<media type>;base64,<payload>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64())
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    pub attachment: Option<Attachment>,
    pub temperature: Option<f32>,
}

impl ModelRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            attachment: None,
            temperature: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Anything that can turn a prompt into note text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Whether requests may carry a PDF [`Attachment`].
    fn accepts_pdf(&self) -> bool {
        true
    }

    /// Run one completion and return the model's text output.
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}
