//! Throw-away HTTP servers standing in for the static origin and the
//! metadata API.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// The shell document served by the mock origin.
pub const SHELL: &str = "<!DOCTYPE html>\n<html>\n\t<head>\n\t\t<!-- embed start -->\n\t\t<meta property=\"og:title\" content=\"Default\" />\n\t\t<!-- embed end -->\n\t</head>\n\t<body></body>\n</html>\n";

/// A request as seen by a mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

type Handler = dyn Fn(&Recorded) -> Response<Full<Bytes>> + Send + Sync;

/// A mock HTTP server that records every request it receives.
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };

                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        let recorded = recorded.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
                            let request = Recorded {
                                method: parts.method,
                                target: parts
                                    .uri
                                    .path_and_query()
                                    .map_or_else(|| "/".to_string(), ToString::to_string),
                                headers: parts.headers,
                                body,
                            };
                            let response = handler(&request);
                            recorded.lock().push(request);
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last(&self) -> Recorded {
        self.requests.lock().last().cloned().expect("no request recorded")
    }
}

/// Build a response with a content type and body.
pub fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", content_type)
        .body(Full::new(body.into()))
        .unwrap()
}

/// An origin serving the shell at `/` and a script under `/js/`.
pub async fn shell_origin() -> MockServer {
    MockServer::start(|req| {
        if req.target.starts_with("/js/") {
            respond(StatusCode::OK, "application/javascript", "console.log('hi');")
        } else if req.target.starts_with("/image/") {
            respond(StatusCode::OK, "image/png", &[0x89, b'P', b'N', b'G', 0x00, 0xff][..])
        } else if req.target == "/" || req.target.starts_with("/?") {
            let mut response = respond(StatusCode::OK, "text/html; charset=utf-8", SHELL);
            response
                .headers_mut()
                .insert("etag", "\"shell-v1\"".parse().unwrap());
            response
        } else {
            respond(StatusCode::NOT_FOUND, "text/plain", "not found")
        }
    })
    .await
}

/// A metadata API answering every lookup with `body`.
pub async fn metadata_api(body: &'static str) -> MockServer {
    MockServer::start(move |_| respond(StatusCode::OK, "application/json", body)).await
}

/// Canonical metadata with a title and a canonical URL.
pub const WORK_METADATA: &str = r#"{"data": [
    {"type": "property", "name": "og:title", "content": "Hi"},
    {"type": "property", "name": "og:url", "content": "https://x/y"},
    {"type": "name", "name": "description", "content": "A <b>bold</b> \"work\""}
]}"#;

/// A local address nothing listens on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Poll `check` until it returns true or a second elapses.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
