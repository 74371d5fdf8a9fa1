//! Anthropic Messages API backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::sse::{text_stream, Delta, SseFrame};
use super::{response_error, ChatMessage, ChatModel, LlmError, Role, TokenStream};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl AnthropicChat {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The Messages API takes the system prompt as a separate top-level
    /// field, not as a message.
    fn build_body(&self, messages: &[ChatMessage], stream: bool) -> Value {
        let system = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.clone());

        let api_messages: Vec<Value> = messages
            .iter()
            .filter(|m| !matches!(m.role, Role::System))
            .map(message_to_anthropic)
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": self.max_tokens,
            "stream": stream,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        body
    }

    async fn send(&self, body: Value) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %self.model, "Anthropic request to {url}");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(response_error(response).await);
        }
        Ok(response)
    }
}

fn message_to_anthropic(m: &ChatMessage) -> Value {
    let role = match m.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => unreachable!("system messages are filtered out"),
    };
    if m.images.is_empty() {
        return json!({ "role": role, "content": m.content });
    }
    let mut parts = vec![json!({ "type": "text", "text": m.content })];
    for img in &m.images {
        parts.push(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": img.mime_type,
                "data": img.data,
            },
        }));
    }
    json!({ "role": role, "content": parts })
}

fn parse_delta(frame: &SseFrame) -> Result<Delta, LlmError> {
    match frame.event.as_deref() {
        Some("content_block_delta") => {
            let parsed: Value = serde_json::from_str(&frame.data)
                .map_err(|e| LlmError::Parse(format!("bad stream chunk: {e}")))?;
            match parsed["delta"]["text"].as_str() {
                Some(text) if !text.is_empty() => Ok(Delta::Text(text.to_string())),
                _ => Ok(Delta::Skip),
            }
        }
        Some("message_stop") => Ok(Delta::Done),
        Some("error") => {
            let message = serde_json::from_str::<Value>(&frame.data)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or_else(|| frame.data.clone());
            Err(LlmError::Stream(message))
        }
        // message_start, content_block_start/stop, message_delta, ping
        _ => Ok(Delta::Skip),
    }
}

#[async_trait]
impl ChatModel for AnthropicChat {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let response = self.send(self.build_body(messages, false)).await?;
        let resp: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = resp["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing content[0].text".into()))?
            .to_string();
        Ok(content)
    }

    async fn stream_text(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let response = self.send(self.build_body(messages, true)).await?;
        Ok(text_stream(response, parse_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ImageData;

    #[test]
    fn system_message_becomes_top_level_field() {
        let chat = AnthropicChat::new("k".into(), "claude-sonnet-4-20250514".into(), 4096);
        let body = chat.build_body(
            &[ChatMessage::system("be brief"), ChatMessage::user("hi")],
            false,
        );
        assert_eq!(body["system"], "be brief");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn image_message_uses_base64_source() {
        let msg = ChatMessage::user_with_images("look", vec![ImageData::new("QUJD", "image/png")]);
        let body = message_to_anthropic(&msg);
        let parts = body["content"].as_array().unwrap();
        assert_eq!(parts[1]["source"]["media_type"], "image/png");
        assert_eq!(parts[1]["source"]["data"], "QUJD");
    }

    #[test]
    fn text_delta_and_stop_events() {
        let delta = SseFrame {
            event: Some("content_block_delta".into()),
            data: r#"{"delta":{"type":"text_delta","text":"Bon"}}"#.into(),
        };
        match parse_delta(&delta) {
            Ok(Delta::Text(t)) => assert_eq!(t, "Bon"),
            _ => panic!("expected text delta"),
        }
        let stop = SseFrame {
            event: Some("message_stop".into()),
            data: "{}".into(),
        };
        assert!(matches!(parse_delta(&stop), Ok(Delta::Done)));
    }

    #[test]
    fn error_event_interrupts_the_stream() {
        let frame = SseFrame {
            event: Some("error".into()),
            data: r#"{"error":{"message":"overloaded"}}"#.into(),
        };
        match parse_delta(&frame) {
            Err(LlmError::Stream(msg)) => assert_eq!(msg, "overloaded"),
            _ => panic!("expected stream error"),
        }
    }
}
