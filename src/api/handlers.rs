//! HTTP handlers for the mock chat API.

use super::types::*;
use super::AppState;
use crate::error::MockServerError;
use crate::logger::{display_value, format_request_record};
use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const MODEL_ID: &str = "test-model-1";
pub const MODEL_CREATED: i64 = 1686935002;
pub const MODEL_OWNER: &str = "custom";

pub const COMPLETION_ID: &str = "chatcmpl-mock";
pub const FINISH_REASON: &str = "stop";

/// Placeholder shown for a tracked field the request did not include.
pub const NOT_PROVIDED: &str = "未提供";

// ============================================================================
// Models handler
// ============================================================================

pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        object: "list",
        data: vec![ModelInfo {
            id: MODEL_ID,
            object: "model",
            created: MODEL_CREATED,
            owned_by: MODEL_OWNER,
        }],
    })
}

// ============================================================================
// Chat completions helpers
// ============================================================================

/// Parse a request body that must be a JSON object.
///
/// Nesting depth is unbounded; the parser grows its stack on demand instead.
pub fn parse_payload(body: &[u8]) -> Result<Map<String, Value>, MockServerError> {
    match deserialize_unbounded(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(MockServerError::MalformedRequest(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(MockServerError::MalformedRequest(e.to_string())),
    }
}

fn deserialize_unbounded(body: &[u8]) -> Result<Value, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Text of a tracked field, or the "not provided" placeholder.
pub fn field_or_placeholder(body: &Map<String, Value>, field: &str) -> String {
    body.get(field)
        .map(display_value)
        .unwrap_or_else(|| NOT_PROVIDED.to_string())
}

/// Build the synthetic reply for a parsed request body.
pub fn build_chat_response(body: &Map<String, Value>, created: i64) -> ChatCompletionResponse {
    let model = body
        .get("model")
        .cloned()
        .unwrap_or_else(|| Value::String(MODEL_ID.to_string()));

    let content = format!(
        "你好！我已经收到了你的请求。\n- api_key: {}\n- conversation_id: {}",
        field_or_placeholder(body, "api_key"),
        field_or_placeholder(body, "conversation_id")
    );

    ChatCompletionResponse {
        id: COMPLETION_ID.to_string(),
        object: "chat.completion".to_string(),
        created,
        model,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: FINISH_REASON.to_string(),
        }],
        usage: Usage {
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 30,
        },
    }
}

// ============================================================================
// Chat completions handler
// ============================================================================

/// Log the request body, then answer with a synthetic completion.
///
/// The body is read raw so that `Content-Type` is not enforced.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatCompletionResponse>, MockServerError> {
    let payload = parse_payload(&body)?;

    let time = chrono::Local::now().format("%H:%M:%S").to_string();
    state.log.emit(&format_request_record(&payload, &time));

    Ok(Json(build_chat_response(
        &payload,
        chrono::Utc::now().timestamp(),
    )))
}
