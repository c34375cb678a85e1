//! Anthropic Messages API adapter.

use std::time::Duration;

use async_trait::async_trait;
use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, ProviderAdapter, ProviderKind};
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::parser::{build_messages_request, parse_messages_response};
use crate::error::HttpError;
use crate::http::{insert_header, HttpClient};

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages endpoint path.
const MESSAGES_PATH: &str = "/v1/messages";

/// Adapter for Anthropic's Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicAdapter {
    /// Creates an adapter talking to `base_url`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, HttpError> {
        let base_url = base_url.into();
        Ok(Self {
            client: HttpClient::for_base_url(&base_url)?,
            base_url,
            api_key,
        })
    }

    fn headers(api_key: &str) -> Result<HeaderMap, HttpError> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-api-key", api_key)?;
        insert_header(&mut headers, "anthropic-version", ANTHROPIC_VERSION)?;
        Ok(headers)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request), fields(provider = "anthropic", model = %model))]
    async fn invoke(
        &self,
        model: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::AuthError("no API key for anthropic".to_string()))?;
        let headers = Self::headers(api_key).map_err(|e| e.into_adapter_error(timeout))?;
        let body = build_messages_request(model, request);
        let url = format!("{}{MESSAGES_PATH}", self.base_url);

        let reply = self
            .client
            .post_json(&url, headers, &body, timeout)
            .await
            .map_err(|e| e.into_adapter_error(timeout))?;

        if !reply.is_success() {
            // 529 "overloaded" falls through to a server error.
            debug!(status = reply.status, "Messages request failed");
            return Err(reply.into_error());
        }
        parse_messages_response(&reply.body)
    }
}
