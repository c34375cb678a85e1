//! Helpers shared by the response parsers.

use llmroute_core::{AdapterError, CompletionResponse, TokenUsage};
use serde::de::DeserializeOwned;

/// Deserializes a success body, mapping failures to
/// [`AdapterError::InvalidResponse`].
pub(crate) fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, AdapterError> {
    serde_json::from_str(body).map_err(|e| AdapterError::InvalidResponse(format!("Invalid JSON: {e}")))
}

/// Builds a response from extracted text, rejecting missing or blank text.
///
/// Surrounding whitespace is trimmed.
pub(crate) fn completion(
    text: Option<String>,
    usage: Option<TokenUsage>,
) -> Result<CompletionResponse, AdapterError> {
    let text = text
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(AdapterError::InvalidResponse("empty response".to_string()));
    }
    Ok(CompletionResponse { text, usage })
}
