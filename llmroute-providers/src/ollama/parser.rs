//! Ollama `/api/generate` payloads.

use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::response::{completion, from_json};

/// Sampling temperature when the caller set none.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Nucleus sampling cutoff sent with every request.
pub const DEFAULT_TOP_P: f32 = 0.9;

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

pub fn build_generate_request<'a>(
    model: &'a str,
    request: &'a CompletionRequest,
) -> GenerateRequest<'a> {
    GenerateRequest {
        model,
        prompt: &request.prompt,
        system: request.system.as_deref(),
        stream: false,
        options: GenerateOptions {
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: DEFAULT_TOP_P,
            num_predict: request.max_tokens,
        },
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Parses a non-streaming `/api/generate` body.
pub fn parse_generate_response(body: &str) -> Result<CompletionResponse, AdapterError> {
    debug!(len = body.len(), "Parsing Ollama response");

    let response: GenerateResponse = from_json(body)?;
    let usage = match (response.prompt_eval_count, response.eval_count) {
        (None, None) => None,
        (input, output) => Some(TokenUsage {
            input_tokens: input.unwrap_or(0),
            output_tokens: output.unwrap_or(0),
        }),
    };

    completion(response.response, usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_not_streamed() {
        let request = CompletionRequest::new("why is the sky blue?").with_max_tokens(50);
        let body = serde_json::to_value(build_generate_request("llama3.2", &request)).unwrap();

        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 50);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"model": "llama3.2", "response": " Rayleigh scattering. ", "done": true,
            "prompt_eval_count": 26, "eval_count": 5}"#;
        let response = parse_generate_response(body).unwrap();
        assert_eq!(response.text, "Rayleigh scattering.");
        assert_eq!(response.usage.unwrap().input_tokens, 26);
    }

    #[test]
    fn test_missing_response_field() {
        assert!(matches!(
            parse_generate_response(r#"{"done": true}"#),
            Err(AdapterError::InvalidResponse(_))
        ));
    }
}
