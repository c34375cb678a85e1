//! Gemini `generateContent` payloads.

use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{error_message, map_status};
use crate::response::{completion, from_json};

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest<'a> {
    pub contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "GenerationConfig::is_empty")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    pub role: &'static str,
    pub parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction<'a> {
    pub parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct Part<'a> {
    pub text: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.max_output_tokens.is_none() && self.temperature.is_none()
    }
}

pub fn build_generate_request(request: &CompletionRequest) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: [Content {
            role: "user",
            parts: [Part {
                text: &request.prompt,
            }],
        }],
        system_instruction: request.system.as_deref().map(|text| SystemInstruction {
            parts: [Part { text }],
        }),
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
        },
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Parses a `generateContent` success body.
///
/// A prompt blocked by safety filters yields no candidates; that and a
/// candidate stopped for safety without text are reported as invalid
/// responses.
pub fn parse_generate_response(body: &str) -> Result<CompletionResponse, AdapterError> {
    debug!(len = body.len(), "Parsing generateContent response");

    let response: GenerateResponse = from_json(body)?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AdapterError::InvalidResponse(format!(
            "prompt blocked by safety filters: {reason}"
        )));
    }

    let usage = response.usage_metadata.map(|u| TokenUsage {
        input_tokens: u.prompt_token_count,
        output_tokens: u.candidates_token_count,
    });

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(AdapterError::InvalidResponse("no candidates returned".to_string()));
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    let text = texts.concat();

    if text.trim().is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(AdapterError::InvalidResponse(
            "response blocked by safety filters".to_string(),
        ));
    }

    completion(Some(text), usage)
}

/// Maps a Gemini error reply.
///
/// Gemini answers an invalid key with 400 `API_KEY_INVALID` rather than
/// 401, so that case is classified before the common table.
pub fn map_google_error(
    status: u16,
    retry_after: Option<std::time::Duration>,
    body: &str,
) -> AdapterError {
    if status == 400 && body.contains("API_KEY_INVALID") {
        return AdapterError::AuthError(error_message(status, body));
    }
    map_status(status, retry_after, body)
}
