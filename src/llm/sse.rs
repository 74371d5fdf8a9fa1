//! Server-sent-event decoding shared by the streaming provider backends.
//!
//! All three vendor streaming APIs speak SSE over the response body, but
//! each frames its payloads differently (OpenAI: anonymous `data:` lines
//! with a `[DONE]` sentinel; Anthropic: named events; Gemini: one JSON
//! object per `data:` line). This module handles the transport-level
//! concerns — byte chunks arriving mid-line, `event:`/`data:` pairing —
//! and leaves payload interpretation to a per-provider closure.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use super::{LlmError, TokenStream};

/// One decoded SSE frame: the `data:` payload plus the preceding `event:`
/// name, if the provider sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// What a provider extracted from one frame.
pub(crate) enum Delta {
    /// A text fragment to forward.
    Text(String),
    /// Terminal sentinel; stop consuming the stream.
    Done,
    /// Housekeeping frame with nothing to forward.
    Skip,
}

/// Incremental line-oriented SSE decoder.
///
/// Bytes arrive in arbitrary chunk boundaries; the decoder buffers partial
/// lines and emits complete frames as they close.
#[derive(Default)]
pub(crate) struct FrameDecoder {
    buffer: String,
    event: Option<String>,
}

impl FrameDecoder {
    /// Feed a chunk of response bytes, returning any frames it completed.
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=pos);

            if line.is_empty() {
                // Blank line closes the current event.
                self.event = None;
            } else if let Some(name) = line.strip_prefix("event: ") {
                self.event = Some(name.to_string());
            } else if let Some(data) = line.strip_prefix("data: ") {
                frames.push(SseFrame {
                    event: self.event.clone(),
                    data: data.to_string(),
                });
            }
        }
        frames
    }
}

/// Decode a streaming HTTP response into [`SseFrame`]s.
fn frames(response: reqwest::Response) -> impl Stream<Item = Result<SseFrame, LlmError>> + Send {
    struct State {
        bytes: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
        decoder: FrameDecoder,
        pending: VecDeque<SseFrame>,
        finished: bool,
    }

    let state = State {
        bytes: Box::pin(response.bytes_stream()),
        decoder: FrameDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let text = String::from_utf8_lossy(&chunk).into_owned();
                    state.pending.extend(state.decoder.push(&text));
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(LlmError::Stream(e.to_string())), state));
                }
                None => {
                    state.finished = true;
                    return None;
                }
            }
        }
    })
}

/// Turn a streaming response into a [`TokenStream`] using a per-provider
/// frame interpreter.
pub(crate) fn text_stream<F>(response: reqwest::Response, parse: F) -> TokenStream
where
    F: Fn(&SseFrame) -> Result<Delta, LlmError> + Send + 'static,
{
    let s = frames(response)
        .map(move |frame| frame.and_then(|f| parse(&f)))
        .take_while(|item| futures::future::ready(!matches!(item, Ok(Delta::Done))))
        .filter_map(|item| {
            futures::future::ready(match item {
                Ok(Delta::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        });
    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_lines() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.push("data: hello\n\ndata: world\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "hello");
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[1].data, "world");
    }

    #[test]
    fn pairs_event_with_data() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.push("event: content_block_delta\ndata: {\"x\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(frames[0].data, "{\"x\":1}");
    }

    #[test]
    fn blank_line_resets_event_name() {
        let mut decoder = FrameDecoder::default();
        decoder.push("event: ping\ndata: {}\n\n");
        let frames = decoder.push("data: tail\n");
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn reassembles_split_lines() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push("data: hel").is_empty());
        let frames = decoder.push("lo\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn carriage_returns_are_stripped() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.push("data: hi\r\n");
        assert_eq!(frames[0].data, "hi");
    }
}
