//! Configuration for the explanation pipeline.
//!
//! Every knob lives in one [`AppConfig`] value built via its
//! [`AppConfigBuilder`] and passed by reference into the components that
//! need it. There is no global configuration state: tests construct their
//! own config pointing at a temp directory and an in-memory secret store
//! and nothing leaks between them.

use crate::error::ExplainError;
use crate::retry::RetryPolicy;
use std::path::PathBuf;

/// Providers the resolver will accept. Anything else is rejected with
/// [`ExplainError::ProviderNotAllowed`] before a handle is built.
pub const ALLOWED_PROVIDERS: [&str; 3] = ["openai", "anthropic", "gemini"];

/// Name of the flat history file inside the data directory.
pub const HISTORY_FILE_NAME: &str = "conversation_history.txt";

/// Process-wide configuration, constructed once at startup.
///
/// # Example
/// ```rust
/// use pagetutor::AppConfig;
///
/// let config = AppConfig::builder()
///     .data_dir("/tmp/pagetutor")
///     .max_tokens(2048)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding persisted state (the conversation history file).
    /// Created lazily on first write. Default: `{platform data dir}/pagetutor`.
    pub data_dir: PathBuf,

    /// Service namespace under which credential entries are keyed in the
    /// OS credential store. Default: `"pagetutor"`.
    pub keyring_service: String,

    /// Maximum tokens a resolved model may generate per call. Default: 4096.
    pub max_tokens: u32,

    /// Bounded retry count for transient provider errors inside a resolved
    /// model handle. Default: 2.
    ///
    /// This is distinct from the vision extractor's own retry policy: the
    /// handle-level retries cover individual HTTP calls, the extractor's
    /// policy covers whole extraction attempts.
    pub provider_max_retries: u32,

    /// Retry policy applied by the vision extractor around model calls.
    /// Default: 3 attempts, 2s/4s exponential backoff.
    pub vision_retry: RetryPolicy,

    /// Maximum rendered page dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// Page sizes vary wildly; capping the longest edge keeps memory bounded
    /// and matches the image-size sweet spot for vision models.
    pub max_rendered_pixels: u32,

    /// Frontend origin allowed by CORS, if any. Default: none.
    pub cors_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagetutor");
        Self {
            data_dir,
            keyring_service: "pagetutor".to_string(),
            max_tokens: 4096,
            provider_max_retries: 2,
            vision_retry: RetryPolicy::default(),
            max_rendered_pixels: 2000,
            cors_origin: None,
        }
    }
}

impl AppConfig {
    /// Create a new builder for `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of the conversation history file inside the data directory.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE_NAME)
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn keyring_service(mut self, service: impl Into<String>) -> Self {
        self.config.keyring_service = service.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn provider_max_retries(mut self, n: u32) -> Self {
        self.config.provider_max_retries = n;
        self
    }

    pub fn vision_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.vision_retry = policy;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.cors_origin = Some(origin.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AppConfig, ExplainError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ExplainError::Internal("max_tokens must be ≥ 1".into()));
        }
        if c.vision_retry.max_attempts == 0 {
            return Err(ExplainError::Internal(
                "vision retry needs at least one attempt".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_path_lives_under_data_dir() {
        let config = AppConfig::builder().data_dir("/tmp/pt-test").build().unwrap();
        assert_eq!(
            config.history_path(),
            PathBuf::from("/tmp/pt-test").join(HISTORY_FILE_NAME)
        );
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(AppConfig::builder().vision_retry(policy).build().is_err());
    }
}
