//! Messages API payloads.

use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::response::{completion, from_json};

/// The Messages API requires `max_tokens`; used when the caller set none.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct Message<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

pub fn build_messages_request<'a>(
    model: &'a str,
    request: &'a CompletionRequest,
) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: request.system.as_deref(),
        messages: [Message {
            role: "user",
            content: &request.prompt,
        }],
        temperature: request.temperature,
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Parses a Messages API success body, joining all text blocks.
pub fn parse_messages_response(body: &str) -> Result<CompletionResponse, AdapterError> {
    debug!(len = body.len(), "Parsing messages response");

    let response: MessagesResponse = from_json(body)?;
    let texts: Vec<String> = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    let text = (!texts.is_empty()).then(|| texts.concat());
    let usage = response.usage.map(|u| TokenUsage {
        input_tokens: u.input_tokens,
        output_tokens: u.output_tokens,
    });

    completion(text, usage)
}
