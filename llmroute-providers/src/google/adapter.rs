//! Gemini API adapter.

use std::time::Duration;

use async_trait::async_trait;
use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, ProviderAdapter, ProviderKind};
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::parser::{build_generate_request, map_google_error, parse_generate_response};
use crate::error::HttpError;
use crate::http::{insert_header, HttpClient};

/// Adapter for Google's Generative Language API.
#[derive(Debug, Clone)]
pub struct GoogleAdapter {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleAdapter {
    /// Creates an adapter talking to `base_url`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, HttpError> {
        let base_url = base_url.into();
        Ok(Self {
            client: HttpClient::for_base_url(&base_url)?,
            base_url,
            api_key,
        })
    }

    /// Returns the `generateContent` URL for `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request), fields(provider = "google", model = %model))]
    async fn invoke(
        &self,
        model: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::AuthError("no API key for google".to_string()))?;
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-goog-api-key", api_key)
            .map_err(|e| e.into_adapter_error(timeout))?;
        let body = build_generate_request(request);

        let reply = self
            .client
            .post_json(&self.endpoint(model), headers, &body, timeout)
            .await
            .map_err(|e| e.into_adapter_error(timeout))?;

        if !reply.is_success() {
            debug!(status = reply.status, "generateContent failed");
            return Err(map_google_error(reply.status, reply.retry_after, &reply.body));
        }
        parse_generate_response(&reply.body)
    }
}
