//! Adapters against a local HTTP stub.

use std::time::Duration;

use llmroute_core::{AdapterError, CompletionRequest, ProviderAdapter, ProviderKind};
use llmroute_providers::{AnthropicAdapter, GoogleAdapter, OllamaAdapter, OpenAiAdapter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one canned response and hands back the raw request.
async fn stub(status: &str, headers: &[(&str, &str)], body: &str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let mut response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    response.push_str(body);

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(request);
    });
    (base, rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request() -> CompletionRequest {
    CompletionRequest::new("Say hi").with_system("Be brief")
}

#[tokio::test]
async fn test_groq_success() {
    let (base, seen) = stub(
        "200 OK",
        &[],
        r#"{"choices": [{"message": {"content": "hi!"}}], "usage": {"prompt_tokens": 5, "completion_tokens": 2}}"#,
    )
    .await;
    let adapter = OpenAiAdapter::new(ProviderKind::Groq, base, Some("gsk-test".into())).unwrap();

    let response = adapter.invoke("llama-3.1-8b-instant", &request(), TIMEOUT).await.unwrap();
    assert_eq!(response.text, "hi!");
    assert_eq!(response.usage.unwrap().total(), 7);

    let raw = seen.await.unwrap().to_lowercase();
    assert!(raw.starts_with("post /openai/v1/chat/completions"));
    assert!(raw.contains("authorization: bearer gsk-test"));
    assert!(raw.contains(r#""model":"llama-3.1-8b-instant""#));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let (base, _seen) = stub(
        "429 Too Many Requests",
        &[("retry-after", "3")],
        r#"{"error": {"message": "Rate limit reached"}}"#,
    )
    .await;
    let adapter = OpenAiAdapter::new(ProviderKind::OpenAi, base, Some("sk".into())).unwrap();

    let err = adapter.invoke("gpt-4o-mini", &request(), TIMEOUT).await.unwrap_err();
    assert_eq!(
        err,
        AdapterError::rate_limited(Some(Duration::from_secs(3)), "Rate limit reached")
    );
    assert!(!err.trips_breaker());
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let (base, _seen) = stub("401 Unauthorized", &[], r#"{"error": {"message": "Invalid API Key"}}"#).await;
    let adapter = OpenAiAdapter::new(ProviderKind::OpenRouter, base, Some("bad".into())).unwrap();

    let err = adapter.invoke("m", &request(), TIMEOUT).await.unwrap_err();
    assert_eq!(err, AdapterError::AuthError("Invalid API Key".into()));
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let (base, _seen) = stub("503 Service Unavailable", &[], "upstream down").await;
    let adapter = OllamaAdapter::new(base).unwrap();

    let err = adapter.invoke("llama3.2", &request(), TIMEOUT).await.unwrap_err();
    assert_eq!(err, AdapterError::server(503, "upstream down"));
}

#[tokio::test]
async fn test_anthropic_overloaded() {
    let (base, seen) = stub(
        "529 Overloaded",
        &[],
        r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#,
    )
    .await;
    let adapter = AnthropicAdapter::new(base, Some("sk-ant".into())).unwrap();

    let err = adapter.invoke("claude-3-5-haiku-latest", &request(), TIMEOUT).await.unwrap_err();
    assert_eq!(err, AdapterError::server(529, "Overloaded"));

    let raw = seen.await.unwrap().to_lowercase();
    assert!(raw.starts_with("post /v1/messages"));
    assert!(raw.contains("x-api-key: sk-ant"));
    assert!(raw.contains("anthropic-version: 2023-06-01"));
}

#[tokio::test]
async fn test_google_invalid_key() {
    let (base, seen) = stub(
        "400 Bad Request",
        &[],
        r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT", "details": [{"reason": "API_KEY_INVALID"}]}}"#,
    )
    .await;
    let adapter = GoogleAdapter::new(base, Some("AIza-bad".into())).unwrap();

    let err = adapter.invoke("gemini-1.5-flash", &request(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, AdapterError::AuthError(_)));

    let raw = seen.await.unwrap();
    assert!(raw.starts_with("POST /v1beta/models/gemini-1.5-flash:generateContent"));
    assert!(!raw.contains("key=AIza"));
}

#[tokio::test]
async fn test_empty_text_is_invalid_response() {
    let (base, _seen) = stub("200 OK", &[], r#"{"response": "   ", "done": true}"#).await;
    let adapter = OllamaAdapter::new(base).unwrap();

    let err = adapter.invoke("llama3.2", &request(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, AdapterError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });
    let adapter = OllamaAdapter::new(base).unwrap();

    let timeout = Duration::from_millis(200);
    let err = adapter.invoke("llama3.2", &request(), timeout).await.unwrap_err();
    assert_eq!(err, AdapterError::Timeout(timeout));
}

#[tokio::test]
async fn test_connection_refused_is_server_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let adapter = OllamaAdapter::new(base).unwrap();

    let err = adapter.invoke("llama3.2", &request(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, AdapterError::ServerError { status: None, .. }));
    assert!(err.trips_breaker());
}
