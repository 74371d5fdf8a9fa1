//! Google Gemini generateContent backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::sse::{text_stream, Delta, SseFrame};
use super::{response_error, ChatMessage, ChatModel, LlmError, Role, TokenStream};

pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl GeminiChat {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Gemini uses a separate `system_instruction` field (like Anthropic)
    /// and calls the assistant role `model`.
    fn build_body(&self, messages: &[ChatMessage]) -> Value {
        let system = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.clone());

        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| !matches!(m.role, Role::System))
            .map(message_to_gemini)
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": { "maxOutputTokens": self.max_tokens },
        });
        if let Some(system) = system {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    async fn send(&self, body: Value, stream: bool) -> Result<reqwest::Response, LlmError> {
        let verb = if stream {
            "streamGenerateContent?alt=sse&"
        } else {
            "generateContent?"
        };
        let url = format!(
            "{}/v1beta/models/{}:{}key={}",
            self.base_url, self.model, verb, self.api_key,
        );
        debug!(model = %self.model, stream, "Gemini request");
        let response = self
            .client
            .post(&url)
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

fn message_to_gemini(m: &ChatMessage) -> Value {
    let role = match m.role {
        Role::User => "user",
        Role::Assistant => "model",
        Role::System => unreachable!("system messages are filtered out"),
    };
    let mut parts = vec![json!({ "text": m.content })];
    for img in &m.images {
        parts.push(json!({
            "inline_data": { "mime_type": img.mime_type, "data": img.data },
        }));
    }
    json!({ "role": role, "parts": parts })
}

fn parse_delta(frame: &SseFrame) -> Result<Delta, LlmError> {
    let parsed: Value = serde_json::from_str(&frame.data)
        .map_err(|e| LlmError::Parse(format!("bad stream chunk: {e}")))?;
    match parsed["candidates"][0]["content"]["parts"][0]["text"].as_str() {
        Some(text) if !text.is_empty() => Ok(Delta::Text(text.to_string())),
        // Frames carrying only finishReason / usage metadata.
        _ => Ok(Delta::Skip),
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let response = self.send(self.build_body(messages), false).await?;
        let resp: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = resp["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing candidates[0].content.parts[0].text".into()))?
            .to_string();
        Ok(content)
    }

    async fn stream_text(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let response = self.send(self.build_body(messages), true).await?;
        Ok(text_stream(response, parse_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ImageData;

    #[test]
    fn assistant_role_maps_to_model() {
        let chat = GeminiChat::new("k".into(), "gemini-2.0-flash".into(), 4096);
        let body = chat.build_body(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage {
                role: Role::Assistant,
                content: "hello".into(),
                images: vec![],
            },
        ]);
        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "be brief"
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn image_message_uses_inline_data() {
        let msg = ChatMessage::user_with_images("look", vec![ImageData::new("QUJD", "image/png")]);
        let body = message_to_gemini(&msg);
        assert_eq!(body["parts"][1]["inline_data"]["mime_type"], "image/png");
    }

    #[test]
    fn stream_chunks_yield_text() {
        let frame = SseFrame {
            event: None,
            data: r#"{"candidates":[{"content":{"parts":[{"text":"Salut"}]}}]}"#.into(),
        };
        match parse_delta(&frame) {
            Ok(Delta::Text(t)) => assert_eq!(t, "Salut"),
            _ => panic!("expected text delta"),
        }
    }
}
