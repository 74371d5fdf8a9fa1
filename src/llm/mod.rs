//! Chat-model abstraction and provider clients.
//!
//! Each provider backend implements [`ChatModel`] with two entry points:
//! a buffered [`ChatModel::complete`] used by the vision extractor, and a
//! token-by-token [`ChatModel::stream_text`] used by the explanation chain.
//! The backends are thin `reqwest` clients speaking each vendor's wire
//! format directly; retry behaviour is layered on top by the resolver so
//! none of them carries its own sleep logic.

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod resolver;
mod sse;

pub use resolver::ModelResolver;

use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

/// A lazily produced, forward-only sequence of response fragments.
///
/// Concatenating every `Ok` item in order reconstructs the full model
/// response. Restarting requires a fresh [`ChatModel::stream_text`] call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Which task a resolved model handle is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Vision/text extraction from a rasterised page.
    Parsing,
    /// Explanation generation.
    Expert,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Parsing => write!(f, "parsing"),
            ModelRole::Expert => write!(f, "expert"),
        }
    }
}

/// A base64 image attachment for a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Base64-encoded image bytes (no data-URI prefix).
    pub data: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl ImageData {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message, optionally carrying image attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub images: Vec<ImageData>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(content: impl Into<String>, images: Vec<ImageData>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
        }
    }
}

/// Errors from a provider backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP request itself failed (DNS, TLS, connection reset).
    #[error("provider request failed: {0}")]
    Network(String),

    /// The provider rejected the request as malformed (HTTP 400).
    /// Resending the same request can never succeed.
    #[error("provider rejected the request: {message}")]
    BadRequest { message: String },

    /// HTTP 429. `retry_after_secs` carries a server-specified delay when
    /// one was sent.
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success HTTP status.
    #[error("provider API error: status {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// The streamed response broke off mid-way.
    #[error("response stream interrupted: {0}")]
    Stream(String),
}

impl LlmError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Request-validation failures and 4xx statuses are deterministic; a
    /// broken stream cannot be resumed, only restarted by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::BadRequest { .. } | LlmError::Stream(_) => false,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Network(_) | LlmError::RateLimited { .. } | LlmError::Parse(_) => true,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Network(e.to_string())
    }
}

/// Classify a non-success HTTP response into an [`LlmError`].
pub(crate) async fn response_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());
    let message = response.text().await.unwrap_or_default();
    match status {
        400 => LlmError::BadRequest { message },
        429 => LlmError::RateLimited {
            retry_after_secs: retry_after,
        },
        _ => LlmError::Api { status, message },
    }
}

/// A chat model bound to one provider, model id and API key.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider identifier, e.g. `"openai"`.
    fn provider(&self) -> &str;

    /// Model identifier, e.g. `"gpt-4o"`.
    fn model(&self) -> &str;

    /// Send the messages and return the full response text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Send the messages and return the response as a token stream.
    async fn stream_text(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError>;
}
