//! Deterministic in-process model for tests and keyless development.
//!
//! The original deployment shape includes a "mock" path so the pipeline can
//! be exercised without provider credentials; wiring one in via
//! [`crate::llm::ModelResolver::with_override`] replaces every resolved
//! handle with this scripted model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use super::{ChatMessage, ChatModel, LlmError, TokenStream};

/// A [`ChatModel`] that replays a scripted response.
///
/// Failure injection:
/// * [`with_upfront_errors`](Self::with_upfront_errors) — each call consumes
///   one queued error before the scripted response becomes reachable, for
///   exercising retry behaviour.
/// * [`with_mid_stream_error`](Self::with_mid_stream_error) — the stream
///   yields the first N fragments and then an error, for exercising
///   incomplete-turn handling.
pub struct MockChatModel {
    chunks: Vec<String>,
    upfront_errors: Mutex<VecDeque<LlmError>>,
    mid_stream_error: Option<(usize, String)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatModel {
    /// A model whose streamed response is the given fragment sequence.
    pub fn streaming<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            upfront_errors: Mutex::new(VecDeque::new()),
            mid_stream_error: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model that replies with one undivided response.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::streaming([text.into()])
    }

    /// Queue errors to be returned, one per call, before any success.
    pub fn with_upfront_errors(self, errors: Vec<LlmError>) -> Self {
        *self.upfront_errors.lock().unwrap() = errors.into();
        self
    }

    /// Make the stream break after `after` fragments.
    pub fn with_mid_stream_error(mut self, after: usize, message: impl Into<String>) -> Self {
        self.mid_stream_error = Some((after, message.into()));
        self
    }

    /// How many times `complete` / `stream_text` were invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The messages passed to the most recent call.
    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.seen.lock().unwrap().last().cloned()
    }

    fn record(&self, messages: &[ChatMessage]) -> Option<LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        self.upfront_errors.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if let Some(err) = self.record(messages) {
            return Err(err);
        }
        Ok(self.chunks.concat())
    }

    async fn stream_text(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        if let Some(err) = self.record(messages) {
            return Err(err);
        }
        let items: Vec<Result<String, LlmError>> = match &self.mid_stream_error {
            Some((after, message)) => {
                let mut items: Vec<Result<String, LlmError>> = self
                    .chunks
                    .iter()
                    .take(*after)
                    .cloned()
                    .map(Ok)
                    .collect();
                items.push(Err(LlmError::Stream(message.clone())));
                items
            }
            None => self.chunks.iter().cloned().map(Ok).collect(),
        };
        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn streams_scripted_fragments_in_order() {
        let model = MockChatModel::streaming(["a", "b", "c"]);
        let mut stream = model.stream_text(&[ChatMessage::user("hi")]).await.unwrap();
        let mut collected = String::new();
        while let Some(item) = stream.next().await {
            collected.push_str(&item.unwrap());
        }
        assert_eq!(collected, "abc");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn upfront_errors_come_before_success() {
        let model = MockChatModel::replying("ok").with_upfront_errors(vec![LlmError::RateLimited {
            retry_after_secs: None,
        }]);
        assert!(model.complete(&[]).await.is_err());
        assert_eq!(model.complete(&[]).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn mid_stream_error_truncates() {
        let model = MockChatModel::streaming(["x", "y", "z"]).with_mid_stream_error(2, "cut");
        let mut stream = model.stream_text(&[]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "x");
        assert_eq!(stream.next().await.unwrap().unwrap(), "y");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
