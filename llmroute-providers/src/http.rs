//! HTTP client shared by every adapter.
//!
//! The wrapper adds three things on top of `reqwest`:
//! - Request/response tracing
//! - A host allowlist derived from the provider's base URL, so a
//!   misconfigured model name cannot redirect credentials elsewhere
//! - A per-call timeout and a status-code mapping onto [`AdapterError`]

use std::time::Duration;

use llmroute_core::AdapterError;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::{debug, instrument};
use url::Url;

use crate::error::HttpError;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("llmroute/", env!("CARGO_PKG_VERSION"));

/// Connect timeout; the overall budget is set per call.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest provider error message kept in an [`AdapterError`].
const MAX_ERROR_CHARS: usize = 300;

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and a host allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a client without host restrictions.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built. This only happens when
    /// the TLS backend cannot be initialised, in which case no provider
    /// is reachable anyway.
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to create HTTP client: {e}. \
                    This usually indicates a broken TLS configuration."
                )
            });

        Self {
            inner: client,
            allowed_domains: None,
        }
    }

    /// Creates a client that only talks to the given domains and their
    /// subdomains.
    pub fn with_allowed_domains(domains: Vec<String>) -> Self {
        let mut client = Self::new();
        client.allowed_domains = Some(domains);
        client
    }

    /// Creates a client restricted to the host of `base_url`.
    pub fn for_base_url(base_url: &str) -> Result<Self, HttpError> {
        let parsed = Url::parse(base_url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl(format!("No host in {base_url}")))?;
        Ok(Self::with_allowed_domains(vec![host.to_string()]))
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a POST request with a JSON body and reads the whole reply.
    ///
    /// `timeout` covers connecting, sending, and reading the body.
    #[instrument(skip(self, headers, body), fields(url = %url))]
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
        timeout: Duration,
    ) -> Result<HttpReply, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("POST request with JSON");

        let response = self
            .inner
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");

        HttpReply::read(response).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a header value, rejecting credentials with illegal characters.
pub fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, HttpError> {
    HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name))
}

/// Inserts a header by name.
pub fn insert_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), HttpError> {
    headers.insert(HeaderName::from_static(name), header_value(name, value)?);
    Ok(())
}

/// Inserts `Authorization: Bearer <token>`.
pub fn insert_bearer(headers: &mut HeaderMap, token: &str) -> Result<(), HttpError> {
    headers.insert(
        header::AUTHORIZATION,
        header_value("authorization", &format!("Bearer {token}"))?,
    );
    Ok(())
}

// ============================================================================
// Replies
// ============================================================================

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Parsed `retry-after` header.
    pub retry_after: Option<Duration>,
    /// Raw body.
    pub body: String,
}

impl HttpReply {
    async fn read(response: Response) -> Result<Self, HttpError> {
        let status = response.status().as_u16();
        let retry_after = response.retry_after();
        let body = response.text().await?;
        Ok(Self {
            status,
            retry_after,
            body,
        })
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Maps a non-success reply with the common status table.
    pub fn into_error(self) -> AdapterError {
        map_status(self.status, self.retry_after, &self.body)
    }
}

/// Extension trait for Response handling.
pub trait ResponseExt {
    /// Get the `Retry-After` header as a duration.
    fn retry_after(&self) -> Option<Duration>;
}

impl ResponseExt for Response {
    fn retry_after(&self) -> Option<Duration> {
        self.headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after)
    }
}

/// Parses a `retry-after` value given in (possibly fractional) seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

// ============================================================================
// Status Mapping
// ============================================================================

/// Maps an HTTP error status onto the canonical adapter error.
///
/// 401/403 become [`AdapterError::AuthError`], 429 becomes
/// [`AdapterError::RateLimited`], everything else (5xx, Anthropic's 529,
/// unexpected 4xx) becomes [`AdapterError::ServerError`] with the status.
pub fn map_status(status: u16, retry_after: Option<Duration>, body: &str) -> AdapterError {
    let message = error_message(status, body);
    match status {
        401 | 403 => AdapterError::AuthError(message),
        429 => AdapterError::rate_limited(retry_after, message),
        _ => AdapterError::server(status, message),
    }
}

/// Extracts a readable message from a provider error body.
///
/// Understands the usual `{"error": {"message": ..}}`, `{"error": ".."}`
/// and `{"message": ..}` shapes and falls back to the raw body.
pub fn error_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error").filter(|e| e.is_string()))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        return format!("HTTP {status}");
    }
    truncate(&message, MAX_ERROR_CHARS)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
