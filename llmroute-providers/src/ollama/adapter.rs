//! Local Ollama adapter.

use std::time::Duration;

use async_trait::async_trait;
use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, ProviderAdapter, ProviderKind};
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::parser::{build_generate_request, parse_generate_response};
use crate::error::HttpError;
use crate::http::HttpClient;

/// Generate endpoint path.
const GENERATE_PATH: &str = "/api/generate";

/// Adapter for an Ollama server. Needs no credentials.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: HttpClient,
    host: String,
}

impl OllamaAdapter {
    /// Creates an adapter talking to `host` (e.g. `http://localhost:11434`).
    pub fn new(host: impl Into<String>) -> Result<Self, HttpError> {
        let host = host.into();
        Ok(Self {
            client: HttpClient::for_base_url(&host)?,
            host,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    #[instrument(skip(self, request), fields(provider = "ollama", model = %model))]
    async fn invoke(
        &self,
        model: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, AdapterError> {
        let body = build_generate_request(model, request);
        let url = format!("{}{GENERATE_PATH}", self.host);

        let reply = self
            .client
            .post_json(&url, HeaderMap::new(), &body, timeout)
            .await
            .map_err(|e| e.into_adapter_error(timeout))?;

        if !reply.is_success() {
            debug!(status = reply.status, "Ollama generate failed");
            return Err(reply.into_error());
        }
        parse_generate_response(&reply.body)
    }
}
