//! Error types for the pagetutor library.
//!
//! Two tiers reflect two distinct failure layers:
//!
//! * [`ExplainError`] — a request-fatal error: the upload cannot be parsed,
//!   no usable model is configured, or the pipeline failed outright. Returned
//!   from the top-level parsing and orchestration entry points.
//!
//! * [`crate::llm::LlmError`] — a provider-level error (HTTP failure, rate
//!   limit, malformed request). Carried inside [`ExplainError::Llm`] once it
//!   becomes fatal for the request; before that, the vision extractor's retry
//!   policy consumes the retryable ones.
//!
//! The split lets retry logic reason about provider errors without ever
//! seeing configuration or PDF errors, which are never retryable.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::llm::{LlmError, ModelRole};

/// All request-fatal errors returned by the pagetutor library.
#[derive(Debug, Error)]
pub enum ExplainError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No provider has ever been stored.
    #[error("No LLM provider configured. Store one via /add-llm-keys first.")]
    ProviderNotConfigured,

    /// A provider was stored but is not in the allow-list.
    #[error("Provider '{provider}' is not supported. Use one of: openai, anthropic, gemini.")]
    ProviderNotAllowed { provider: String },

    /// Neither a stored key nor the `{PROVIDER}_API_KEY` env var is present.
    #[error("Missing API key for provider '{provider}'.")]
    MissingApiKey { provider: String },

    /// No model id stored for the requested role; there is no implicit default.
    #[error("Missing {role} model for provider '{provider}'. Set it via /add-llm-keys.")]
    MissingModel { role: ModelRole, provider: String },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// The uploaded bytes could not be opened as a PDF.
    #[error("Uploaded file is not a readable PDF: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium failed to rasterise a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// pdfium failed to extract text from a specific page.
    #[error("Text extraction failed for page {page}: {detail}")]
    PageTextFailed { page: usize, detail: String },

    /// The PDF opened fine but contains no pages.
    #[error("Document has no pages")]
    EmptyDocument,

    /// A rendered page could not be PNG-encoded for the vision request.
    #[error("Image encoding failed: {detail}")]
    ImageEncodingFailed { detail: String },

    // ── Downstream errors ─────────────────────────────────────────────────
    /// Provider call failed fatally (after any retries).
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The OS credential store could not be reached.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Reading or writing the conversation history file failed.
    #[error("Conversation history I/O failed: {source}")]
    HistoryIo {
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked blocking task, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExplainError {
    /// Whether this error is the caller's fault (maps to a 400-class response)
    /// rather than a server-side failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ExplainError::Internal(_) | ExplainError::HistoryIo { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_names_the_role() {
        let e = ExplainError::MissingModel {
            role: ModelRole::Parsing,
            provider: "openai".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("parsing"), "got: {msg}");
        assert!(msg.contains("openai"));
    }

    #[test]
    fn provider_not_allowed_lists_alternatives() {
        let e = ExplainError::ProviderNotAllowed {
            provider: "mistral".into(),
        };
        assert!(e.to_string().contains("openai, anthropic, gemini"));
    }

    #[test]
    fn internal_is_not_client_error() {
        assert!(!ExplainError::Internal("boom".into()).is_client_error());
        assert!(ExplainError::EmptyDocument.is_client_error());
    }
}
