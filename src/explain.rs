//! Streaming orchestrator: drive the chain, forward fragments, commit the
//! turn.
//!
//! Streaming and persistence follow a two-phase contract. The chain is the
//! fragment producer; this module is the only place that both forwards
//! fragments to the caller and accumulates them, which guarantees the
//! history side effect runs exactly when the model stream completed
//! normally and was fully consumed — never for a partial or errored turn.

use futures::stream::{self, StreamExt};
use tracing::{debug, error, warn};

use crate::chain::{ChainInputs, ExplanationChain};
use crate::config::AppConfig;
use crate::error::ExplainError;
use crate::history::HistoryStore;
use crate::llm::{ModelResolver, ModelRole, TokenStream};

/// Orchestrates one explanation request end to end.
#[derive(Clone)]
pub struct Explainer {
    resolver: ModelResolver,
    history: HistoryStore,
    max_tokens: u32,
}

impl Explainer {
    pub fn new(resolver: ModelResolver, history: HistoryStore, config: &AppConfig) -> Self {
        Self {
            resolver,
            history,
            max_tokens: config.max_tokens,
        }
    }

    /// Stream an explanation of `extracted_text` for `prompt`.
    ///
    /// When `follow_up` is false this starts a new conversation: stored
    /// history is cleared first. Otherwise prior history is loaded and fed
    /// into the chain inputs.
    ///
    /// Fragments are yielded in arrival order, unbuffered. Once the model
    /// stream ends normally the full `(prompt, response)` turn is appended
    /// to history. A mid-stream failure is surfaced as the final `Err` item
    /// and nothing is committed.
    pub async fn stream_explanation(
        &self,
        prompt: &str,
        extracted_text: &str,
        follow_up: bool,
    ) -> Result<TokenStream, ExplainError> {
        let conversation_history = if follow_up {
            self.history.read().await?
        } else {
            self.history.clear().await?;
            String::new()
        };

        let model = self.resolver.resolve(ModelRole::Expert, self.max_tokens)?;
        let chain = ExplanationChain::new(model);
        debug!("prompt: {prompt}");

        let inputs = ChainInputs {
            parsed_page: extracted_text,
            prompt,
            conversation_history: &conversation_history,
        };
        let upstream = chain.stream(&inputs).await?;

        struct State {
            upstream: TokenStream,
            collected: String,
            prompt: String,
            history: HistoryStore,
            failed: bool,
        }

        let state = State {
            upstream,
            collected: String::new(),
            prompt: prompt.to_string(),
            history: self.history.clone(),
            failed: false,
        };

        let stream = stream::unfold(state, |mut state| async move {
            if state.failed {
                return None;
            }
            match state.upstream.next().await {
                Some(Ok(fragment)) => {
                    state.collected.push_str(&fragment);
                    Some((Ok(fragment), state))
                }
                Some(Err(e)) => {
                    warn!("model stream failed mid-response: {e}");
                    state.failed = true;
                    Some((Err(e), state))
                }
                None => {
                    debug!("response complete ({} chars)", state.collected.len());
                    if let Err(e) = state.history.append(&state.prompt, &state.collected).await {
                        // The caller already has the full response; losing
                        // the transcript entry must not fail the request.
                        error!("failed to persist conversation turn: {e}");
                    }
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
