//! Resolve stored credentials into a ready-to-invoke chat model handle.
//!
//! Resolution happens per request — handles are not pooled or cached, so a
//! credential change via `/add-llm-keys` takes effect on the next call
//! without any invalidation machinery.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use super::anthropic::AnthropicChat;
use super::gemini::GeminiChat;
use super::openai::OpenAiChat;
use super::{ChatMessage, ChatModel, LlmError, ModelRole, TokenStream};
use crate::config::ALLOWED_PROVIDERS;
use crate::credentials::CredentialStore;
use crate::error::ExplainError;

/// Base unit for the handle-level retry backoff: 500 ms → 1 s → 2 s.
const HANDLE_RETRY_BACKOFF_MS: u64 = 500;

/// Builds chat-model handles from the credential store.
#[derive(Clone)]
pub struct ModelResolver {
    credentials: CredentialStore,
    max_retries: u32,
    override_model: Option<Arc<dyn ChatModel>>,
}

impl ModelResolver {
    /// `max_retries` bounds the handle-level retries on transient provider
    /// errors (it does not affect the vision extractor's own policy).
    pub fn new(credentials: CredentialStore, max_retries: u32) -> Self {
        Self {
            credentials,
            max_retries,
            override_model: None,
        }
    }

    /// Replace every resolved handle with a pre-built model.
    ///
    /// This is the mock/dev path: tests and keyless development inject a
    /// [`crate::llm::mock::MockChatModel`] here and skip credential lookup
    /// entirely.
    pub fn with_override(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.override_model = Some(model);
        self
    }

    /// Resolve a handle for `role`, generating at most `max_tokens` per call.
    ///
    /// Fails with a configuration error when the provider is absent or not
    /// allowed, no API key can be found (stored or `{PROVIDER}_API_KEY`),
    /// or no model id is stored for the role. There is no implicit default
    /// model.
    pub fn resolve(
        &self,
        role: ModelRole,
        max_tokens: u32,
    ) -> Result<Arc<dyn ChatModel>, ExplainError> {
        if let Some(model) = &self.override_model {
            return Ok(Arc::clone(model));
        }

        let creds = self.credentials.get_credentials()?;
        if creds.provider.is_empty() {
            return Err(ExplainError::ProviderNotConfigured);
        }
        if !ALLOWED_PROVIDERS.contains(&creds.provider.as_str()) {
            return Err(ExplainError::ProviderNotAllowed {
                provider: creds.provider,
            });
        }

        let api_key = creds
            .api_key
            .clone()
            .or_else(|| env_api_key(&creds.provider))
            .ok_or_else(|| ExplainError::MissingApiKey {
                provider: creds.provider.clone(),
            })?;

        let model_id = match role {
            ModelRole::Parsing => creds.parsing_model.clone(),
            ModelRole::Expert => creds.expert_model.clone(),
        }
        .ok_or_else(|| ExplainError::MissingModel {
            role,
            provider: creds.provider.clone(),
        })?;

        debug!(
            provider = %creds.provider,
            model = %model_id,
            %role,
            key = %mask_key(&api_key),
            "resolved chat model"
        );

        let backend: Arc<dyn ChatModel> = match creds.provider.as_str() {
            "openai" => Arc::new(OpenAiChat::new(api_key, model_id, max_tokens)),
            "anthropic" => Arc::new(AnthropicChat::new(api_key, model_id, max_tokens)),
            "gemini" => Arc::new(GeminiChat::new(api_key, model_id, max_tokens)),
            other => unreachable!("provider '{other}' passed the allow-list"),
        };

        Ok(Arc::new(RetryingChat {
            inner: backend,
            max_retries: self.max_retries,
        }))
    }
}

/// Fallback key lookup: `{PROVIDER}_API_KEY`, upper-cased provider name.
fn env_api_key(provider: &str) -> Option<String> {
    let name = format!("{}_API_KEY", provider.to_uppercase());
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Mask an API key for logging: first four and last four characters only.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// ── Handle-level retry wrapper ────────────────────────────────────────────

/// Decorates a backend with bounded retries on transient errors.
///
/// Each resolved handle retries individual HTTP calls up to `max_retries`
/// extra times with 500 ms / 1 s / … backoff. Only retryable error classes
/// qualify; a `BadRequest` surfaces immediately. For streaming, retries
/// cover establishing the stream — once fragments flow, a break is final.
struct RetryingChat {
    inner: Arc<dyn ChatModel>,
    max_retries: u32,
}

#[async_trait::async_trait]
impl ChatModel for RetryingChat {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(messages).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff =
                        Duration::from_millis(HANDLE_RETRY_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        provider = self.inner.provider(),
                        attempt = attempt + 1,
                        "transient provider error, retrying in {backoff:?}: {e}"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn stream_text(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.stream_text(messages).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff =
                        Duration::from_millis(HANDLE_RETRY_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        provider = self.inner.provider(),
                        attempt = attempt + 1,
                        "transient provider error, retrying in {backoff:?}: {e}"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
