//! The explanation chain: prompt template + expert model + text decoding.
//!
//! The chain is a fixed composition — the pedagogical system prompt, one
//! rendered human turn carrying the page text, the user's question and any
//! prior conversation, then the model's streamed plain-text output. It is
//! lazy and single-pass: nothing is sent until [`ExplanationChain::stream`]
//! is awaited, and replaying requires building a fresh stream.

use std::sync::Arc;

use crate::llm::{ChatMessage, ChatModel, LlmError, TokenStream};
use crate::prompts::{expert_human_prompt, EXPERT_SYSTEM_PROMPT};

/// Template variables for one chain invocation.
#[derive(Debug, Clone, Copy)]
pub struct ChainInputs<'a> {
    pub parsed_page: &'a str,
    pub prompt: &'a str,
    pub conversation_history: &'a str,
}

/// A streaming pipeline around the resolved expert model.
pub struct ExplanationChain {
    model: Arc<dyn ChatModel>,
}

impl ExplanationChain {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Render the chain's message sequence for the given inputs.
    pub fn messages(inputs: &ChainInputs<'_>) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(EXPERT_SYSTEM_PROMPT),
            ChatMessage::user(expert_human_prompt(
                inputs.parsed_page,
                inputs.prompt,
                inputs.conversation_history,
            )),
        ]
    }

    /// Invoke the model and stream its response fragments.
    pub async fn stream(&self, inputs: &ChainInputs<'_>) -> Result<TokenStream, LlmError> {
        self.model.stream_text(&Self::messages(inputs)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_comes_first() {
        let messages = ExplanationChain::messages(&ChainInputs {
            parsed_page: "the page",
            prompt: "why?",
            conversation_history: "",
        });
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("college professor"));
        assert!(messages[1].content.contains("the page"));
        assert!(messages[1].content.contains("why?"));
    }

    #[test]
    fn history_is_forwarded_into_the_human_turn() {
        let messages = ExplanationChain::messages(&ChainInputs {
            parsed_page: "p",
            prompt: "q",
            conversation_history: "User: before\n\nAgent: earlier\n\n",
        });
        assert!(messages[1].content.contains("User: before"));
    }
}
