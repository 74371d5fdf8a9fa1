//! # pagetutor
//!
//! Upload a PDF page, extract its text and stream a tutor-style explanation
//! of it from an LLM, with conversation history across follow-up questions.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF page
//!  │
//!  ├─ 1. Parse     structural (pdfium text layer) or vision (rasterise +
//!  │               transcribe with the parsing-role model, retry/backoff)
//!  ├─ 2. Resolve   credentials → provider + model → chat handle
//!  ├─ 3. Chain     pedagogical prompt template + expert model
//!  ├─ 4. Stream    forward fragments to the caller, accumulate the turn
//!  └─ 5. Persist   append (prompt, response) to conversation history
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pagetutor::{AppConfig, CredentialStore, Explainer, HistoryStore, ModelResolver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let credentials = CredentialStore::keyring(&config.keyring_service);
//!     let resolver = ModelResolver::new(credentials, config.provider_max_retries);
//!     let history = HistoryStore::new(config.history_path());
//!     let explainer = Explainer::new(resolver, history, &config);
//!
//!     let mut stream = explainer
//!         .stream_explanation("what does this mean?", "the extracted page text", false)
//!         .await?;
//!     while let Some(fragment) = stream.next().await {
//!         print!("{}", fragment?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The `server` feature (on by default) adds the axum transport layer and
//! the `pagetutor-server` binary; disable it when embedding only the
//! pipeline:
//! ```toml
//! pagetutor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chain;
pub mod config;
pub mod credentials;
pub mod error;
pub mod explain;
pub mod history;
pub mod llm;
pub mod parser;
pub mod prompts;
pub mod retry;

#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chain::{ChainInputs, ExplanationChain};
pub use config::{AppConfig, AppConfigBuilder, ALLOWED_PROVIDERS};
pub use credentials::{CredentialStore, Credentials, SecretStore};
pub use error::ExplainError;
pub use explain::Explainer;
pub use history::HistoryStore;
pub use llm::{ChatModel, LlmError, ModelResolver, ModelRole, TokenStream};
pub use parser::{PageParser, StructuralParser, VisionParser};
pub use retry::RetryPolicy;
