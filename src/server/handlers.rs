//! Request handlers: credential setup and the explanation stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use super::AppState;
use crate::config::ALLOWED_PROVIDERS;
use crate::error::ExplainError;
use crate::llm::{ModelRole, TokenStream};
use crate::parser::PageParser;

/// Prompt used when the form field is absent.
const DEFAULT_PROMPT: &str = "help me understand this page";

// ── Error mapping ─────────────────────────────────────────────────────────

/// A handler failure: full detail is logged where it occurred, only the
/// sanitized display message crosses the transport boundary.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ExplainError> for ApiError {
    fn from(e: ExplainError) -> Self {
        error!("request failed: {e:?}");
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<crate::credentials::CredentialError> for ApiError {
    fn from(e: crate::credentials::CredentialError) -> Self {
        ApiError::from(ExplainError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

// ── POST /add-llm-keys ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddKeysRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub expert_model: Option<String>,
    #[serde(default)]
    pub parsing_model: Option<String>,
}

/// Store provider credentials, then validate them with an immediate resolve
/// attempt so a bad configuration fails here and not on the first upload.
pub async fn add_llm_keys(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddKeysRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.provider.is_empty() {
        return Err(ApiError::bad_request("provider is required"));
    }
    if !ALLOWED_PROVIDERS.contains(&req.provider.as_str()) {
        return Err(ApiError::bad_request(
            "Provider must be one of: openai, anthropic, gemini.",
        ));
    }
    if req.api_key.is_empty() {
        return Err(ApiError::bad_request("api_key is required"));
    }
    if req.expert_model.as_deref().unwrap_or("").is_empty() {
        return Err(ApiError::bad_request("expert_model is required"));
    }

    state.credentials.set_credentials(
        &req.provider,
        &req.api_key,
        req.expert_model.as_deref(),
        req.parsing_model.as_deref(),
    )?;

    state
        .resolver
        .resolve(ModelRole::Expert, state.config.max_tokens)?;

    Ok(Json(json!({ "status": "ok" })))
}

// ── POST /explain-page ────────────────────────────────────────────────────

struct ExplainForm {
    pdf_bytes: Vec<u8>,
    prompt: String,
    parse_with_llm: bool,
    follow_up: bool,
}

/// Parse the uploaded page, then stream the explanation as SSE.
///
/// Parse and configuration failures happen before any bytes are streamed
/// and return a plain 400 with a human-readable detail. Once streaming has
/// begun, failures are delivered in-band as an `error` event followed by
/// the terminal `done` event.
pub async fn explain_page(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = parse_explain_form(multipart)
        .await
        .map_err(ApiError::bad_request)?;
    debug!("received PDF upload: {} bytes", form.pdf_bytes.len());

    let parser = PageParser::from_flag(form.parse_with_llm, &state.resolver, &state.config)?;
    let extracted_text = parser.produce_text(&form.pdf_bytes).await?;
    debug!("extracted text length: {}", extracted_text.len());

    let tokens = state
        .explainer
        .stream_explanation(&form.prompt, &extracted_text, form.follow_up)
        .await?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    tokio::spawn(forward_stream(tokens, tx));

    let sse = Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default());
    Ok((StatusCode::CREATED, sse).into_response())
}

/// Relay the token stream into SSE frames.
///
/// Every fragment becomes one `data:` event (axum splits embedded newlines
/// into multiple `data:` lines within the frame). A mid-stream failure is
/// surfaced as an `error` event; either way the stream is terminated by
/// `event: done / data: [DONE]`. If the client is gone the relay stops and
/// drops the upstream, which also abandons the uncommitted turn.
async fn forward_stream(mut tokens: TokenStream, tx: mpsc::Sender<Result<Event, Infallible>>) {
    while let Some(item) = tokens.next().await {
        let event = match item {
            Ok(fragment) => Event::default().data(fragment.replace('\r', "")),
            Err(e) => {
                error!("explanation stream failed: {e}");
                Event::default()
                    .event("error")
                    .data(e.to_string().replace('\r', ""))
            }
        };
        if tx.send(Ok(event)).await.is_err() {
            return;
        }
    }
    let _ = tx
        .send(Ok(Event::default().event("done").data("[DONE]")))
        .await;
}

async fn parse_explain_form(mut multipart: Multipart) -> Result<ExplainForm, String> {
    let mut pdf_bytes: Option<Vec<u8>> = None;
    let mut prompt: Option<String> = None;
    let mut parse_with_llm = false;
    let mut follow_up = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form field: {e}"))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "pdf_bytes" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {e}"))?
                    .to_vec();
                if !data.starts_with(b"%PDF-") {
                    return Err("Uploaded file does not appear to be a PDF".to_string());
                }
                pdf_bytes = Some(data);
            }
            "prompt" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read prompt: {e}"))?;
                if !value.is_empty() {
                    prompt = Some(value);
                }
            }
            "parse_with_llm" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read parse_with_llm: {e}"))?;
                parse_with_llm = is_true(&value);
            }
            "follow_up" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read follow_up: {e}"))?;
                follow_up = is_true(&value);
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    Ok(ExplainForm {
        pdf_bytes: pdf_bytes.ok_or("No PDF uploaded")?,
        prompt: prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        parse_with_llm,
        follow_up,
    })
}

fn is_true(value: &str) -> bool {
    matches!(value, "true" | "True" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_form_values() {
        assert!(is_true("true"));
        assert!(is_true("1"));
        assert!(!is_true("false"));
        assert!(!is_true(""));
    }
}
