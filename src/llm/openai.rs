//! OpenAI chat-completions backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::sse::{text_stream, Delta, SseFrame};
use super::{response_error, ChatMessage, ChatModel, LlmError, Role, TokenStream};

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
            base_url: "https://api.openai.com".to_string(),
        }
    }

    /// Point the client at a different endpoint (local stub, proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(&self, messages: &[ChatMessage], stream: bool) -> Value {
        let api_messages: Vec<Value> = messages.iter().map(message_to_openai).collect();
        json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }

    async fn send(&self, body: Value) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, "OpenAI request to {url}");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

fn message_to_openai(m: &ChatMessage) -> Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    if m.images.is_empty() {
        return json!({ "role": role, "content": m.content });
    }
    // Multimodal messages use the content-parts array form, images as
    // base64 data URIs.
    let mut parts = vec![json!({ "type": "text", "text": m.content })];
    for img in &m.images {
        parts.push(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:{};base64,{}", img.mime_type, img.data) },
        }));
    }
    json!({ "role": role, "content": parts })
}

fn parse_delta(frame: &SseFrame) -> Result<Delta, LlmError> {
    if frame.data == "[DONE]" {
        return Ok(Delta::Done);
    }
    let parsed: Value = serde_json::from_str(&frame.data)
        .map_err(|e| LlmError::Parse(format!("bad stream chunk: {e}")))?;
    match parsed["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => Ok(Delta::Text(text.to_string())),
        _ => Ok(Delta::Skip),
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn provider(&self) -> &str {
        "openai"
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
        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".into()))?
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
    fn plain_message_is_a_string_content() {
        let body = message_to_openai(&ChatMessage::user("hello"));
        assert_eq!(body["content"], "hello");
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = ChatMessage::user_with_images(
            "transcribe this",
            vec![ImageData::new("QUJD", "image/png")],
        );
        let body = message_to_openai(&msg);
        let parts = body["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "transcribe this");
        assert_eq!(
            parts[1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn delta_parsing() {
        let frame = |data: &str| SseFrame {
            event: None,
            data: data.to_string(),
        };
        assert!(matches!(parse_delta(&frame("[DONE]")), Ok(Delta::Done)));
        let chunk = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        match parse_delta(&frame(chunk)) {
            Ok(Delta::Text(t)) => assert_eq!(t, "Hi"),
            other => panic!("expected text delta, got {:?}", other.map(|_| ())),
        }
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(matches!(parse_delta(&frame(role_only)), Ok(Delta::Skip)));
    }
}
