//! Adapter for OpenAI-compatible chat endpoints.

use std::time::Duration;

use async_trait::async_trait;
use llmroute_core::{AdapterError, CompletionRequest, CompletionResponse, ProviderAdapter, ProviderKind};
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::parser::{build_chat_request, parse_chat_response};
use crate::error::HttpError;
use crate::http::{insert_bearer, insert_header, HttpClient};

/// Sent as `HTTP-Referer` to OpenRouter.
const OPENROUTER_REFERER: &str = "https://github.com/janfeddersen/llmroute";

/// Sent as `X-Title` to OpenRouter.
const OPENROUTER_TITLE: &str = "LLM Router";

/// Adapter for OpenAI, Groq, and OpenRouter.
///
/// All three speak the Chat Completions protocol and differ only in the
/// path prefix and, for OpenRouter, two attribution headers.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    kind: ProviderKind,
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiAdapter {
    /// Creates an adapter talking to `base_url`.
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, HttpError> {
        let base_url = base_url.into();
        Ok(Self {
            kind,
            client: HttpClient::for_base_url(&base_url)?,
            base_url,
            api_key,
        })
    }

    /// Returns the full chat completions URL.
    pub fn endpoint(&self) -> String {
        let path = match self.kind {
            ProviderKind::Groq => "/openai/v1/chat/completions",
            ProviderKind::OpenRouter => "/api/v1/chat/completions",
            _ => "/v1/chat/completions",
        };
        format!("{}{path}", self.base_url)
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap, HttpError> {
        let mut headers = HeaderMap::new();
        insert_bearer(&mut headers, api_key)?;
        if self.kind == ProviderKind::OpenRouter {
            insert_header(&mut headers, "http-referer", OPENROUTER_REFERER)?;
            insert_header(&mut headers, "x-title", OPENROUTER_TITLE)?;
        }
        Ok(headers)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request), fields(provider = %self.kind, model = %model))]
    async fn invoke(
        &self,
        model: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::AuthError(format!("no API key for {}", self.kind)))?;
        let headers = self
            .headers(api_key)
            .map_err(|e| e.into_adapter_error(timeout))?;
        let body = build_chat_request(model, request);

        let reply = self
            .client
            .post_json(&self.endpoint(), headers, &body, timeout)
            .await
            .map_err(|e| e.into_adapter_error(timeout))?;

        if !reply.is_success() {
            debug!(status = reply.status, "Chat completion failed");
            return Err(reply.into_error());
        }
        parse_chat_response(&reply.body)
    }
}
