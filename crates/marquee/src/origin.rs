//! HTTP client for the static origin.

use bytes::Bytes;
use futures_util::Stream;
use http::{header::HeaderMap, Method, StatusCode};
use reqwest::Client;

use crate::error::{MarqueeError, MarqueeResult};

/// Build the outbound HTTP client shared by the origin and metadata clients.
///
/// Redirects are followed (up to ten hops). No request timeout is set; the
/// host platform bounds request lifetime.
pub fn http_client() -> MarqueeResult<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .pool_max_idle_per_host(100)
        .user_agent(concat!("marquee/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| MarqueeError::internal(format!("failed to create HTTP client: {e}")))
}

/// Client for the static origin.
#[derive(Debug, Clone)]
pub struct OriginClient {
    client: Client,
    static_origin: String,
}

impl OriginClient {
    /// Create a client for `static_origin` (no trailing slash).
    pub fn new(client: Client, static_origin: impl Into<String>) -> Self {
        Self {
            client,
            static_origin: static_origin.into(),
        }
    }

    /// The origin base URL.
    pub fn static_origin(&self) -> &str {
        &self.static_origin
    }

    /// The absolute URL for a path-and-query target.
    pub fn url_for(&self, target: &str) -> String {
        format!("{}{}", self.static_origin, target)
    }

    /// Send a request to the origin.
    ///
    /// Only the status line and headers are awaited; the body stays unread
    /// until the caller asks for it.
    pub async fn send(&self, request: OriginRequest) -> MarqueeResult<OriginResponse> {
        let url = self.url_for(&request.target);

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MarqueeError::origin(format!("request to {url} failed: {e}")))?;

        Ok(OriginResponse {
            status: response.status(),
            headers: response.headers().clone(),
            inner: response,
        })
    }
}

/// Request sent to the origin.
#[derive(Debug)]
pub struct OriginRequest {
    /// HTTP method.
    pub method: Method,
    /// Path and query, e.g. `/?tab=2`.
    pub target: String,
    /// Headers, already filtered for the origin.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Bytes>,
}

impl OriginRequest {
    /// Create a new origin request.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body. Empty bodies are not sent.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = (!body.is_empty()).then_some(body);
        self
    }
}

/// Response from the origin with an unread body.
#[derive(Debug)]
pub struct OriginResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers as sent by the origin.
    pub headers: HeaderMap,
    inner: reqwest::Response,
}

impl OriginResponse {
    /// Read the whole body.
    pub async fn bytes(self) -> MarqueeResult<Bytes> {
        self.inner
            .bytes()
            .await
            .map_err(|e| MarqueeError::origin(format!("failed to read body: {e}")))
    }

    /// The body as a stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        self.inner.bytes_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let client = OriginClient::new(Client::new(), "https://static.example");
        assert_eq!(client.url_for("/?tab=2"), "https://static.example/?tab=2");
        assert_eq!(client.url_for("/js/app.js"), "https://static.example/js/app.js");
        assert_eq!(client.static_origin(), "https://static.example");
    }

    #[test]
    fn test_empty_body_not_sent() {
        let request = OriginRequest::new(Method::POST, "/x").with_body(Bytes::new());
        assert!(request.body.is_none());

        let request = OriginRequest::new(Method::POST, "/x").with_body(Bytes::from_static(b"a=1"));
        assert_eq!(request.body.as_deref(), Some(&b"a=1"[..]));
    }

    #[test]
    fn test_http_client_builds() {
        assert!(http_client().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_error() {
        let client = OriginClient::new(Client::new(), "http://127.0.0.1:9");
        let err = client
            .send(OriginRequest::new(Method::GET, "/"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.category(), "origin");
    }
}
