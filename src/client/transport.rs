//! HTTP transport for the API Client.
//!
//! A [`Transport`] behaves like a single network call: it resolves with
//! whatever response the server gave, whatever the status. Retrying transient
//! failures is the transport's business, never the caller's. POST and PATCH
//! are replayed only when the connection could not be established.

use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// Bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Methods the server may safely see twice. Anything else is only retried
/// when the connection was never made.
fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

/// [`Transport`] over `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(retry: RetryPolicy) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { client, retry })
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, reqwest::Error> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut attempt = 0;

        loop {
            let outcome = self.send_once(&request).await;
            let can_retry = attempt < self.retry.max_retries;
            let idempotent = is_idempotent(&request.method);

            match outcome {
                Ok(response) if can_retry && idempotent && is_retryable_status(response.status) => {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        status = response.status,
                        attempt = attempt + 1,
                        "Transient HTTP status, retrying"
                    );
                }
                Ok(response) => {
                    debug!(method = %request.method, url = %request.url, status = response.status, "Request completed");
                    return Ok(response);
                }
                Err(e) if can_retry && (e.is_connect() || (idempotent && e.is_timeout())) => {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        error = %e,
                        attempt = attempt + 1,
                        "Network error, retrying"
                    );
                }
                Err(e) => return Err(ClientError::Transport(e.to_string())),
            }

            tokio::time::sleep(self.retry.backoff(attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::any, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    /// Serve a route that fails with `status` for the first `failures` calls
    async fn flaky_server(failures: u32, status: StatusCode) -> (String, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/ping",
            any(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        (status, "nope")
                    } else {
                        (StatusCode::OK, "pong")
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/ping", addr), calls)
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
        assert_eq!(policy.backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::new(Method::POST, "http://x/reminders")
            .header("Authorization", "Bearer t")
            .json(serde_json::json!({"text": "x"}));
        assert_eq!(request.header_value("authorization"), Some("Bearer t"));
        assert!(request.body.is_some());
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (url, calls) = flaky_server(2, StatusCode::SERVICE_UNAVAILABLE).await;
        let transport = HttpTransport::new(fast_retry(3)).unwrap();

        let response = transport.send(HttpRequest::new(Method::GET, url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "pong");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (url, calls) = flaky_server(10, StatusCode::BAD_GATEWAY).await;
        let transport = HttpTransport::new(fast_retry(2)).unwrap();

        let response = transport.send(HttpRequest::new(Method::GET, url)).await.unwrap();
        assert_eq!(response.status, 502);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_post_is_not_replayed_after_server_error() {
        let (url, calls) = flaky_server(1, StatusCode::SERVICE_UNAVAILABLE).await;
        let transport = HttpTransport::new(fast_retry(3)).unwrap();

        let request = HttpRequest::new(Method::POST, url).json(serde_json::json!({"text": "x"}));
        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_is_retried() {
        let (url, calls) = flaky_server(1, StatusCode::SERVICE_UNAVAILABLE).await;
        let transport = HttpTransport::new(fast_retry(3)).unwrap();

        let response = transport.send(HttpRequest::new(Method::DELETE, url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_only_idempotent_methods_replay() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::DELETE));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::PATCH));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (url, calls) = flaky_server(10, StatusCode::UNAUTHORIZED).await;
        let transport = HttpTransport::new(fast_retry(3)).unwrap();

        let response = transport.send(HttpRequest::new(Method::GET, url)).await.unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(fast_retry(1)).unwrap();
        let result = transport
            .send(HttpRequest::new(Method::GET, format!("http://{}/", addr)))
            .await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }
}
