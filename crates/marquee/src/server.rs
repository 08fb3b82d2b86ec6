//! Edge HTTP server.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use marquee_tasks::{SharedSpawner, SpawnerConfig};
use marquee_telemetry::metrics::record_request;
use marquee_telemetry::{render_metrics, InFlightGuard};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::cache::{self, SharedCache};
use crate::config::MarqueeConfig;
use crate::error::{ErrorResponse, MarqueeError, MarqueeResult};
use crate::headers::HEADER_REQUEST_ID;
use crate::health::HealthChecker;
use crate::origin::http_client;
use crate::pipeline::{full_body, EdgeBody, EmbedPipeline, InboundRequest};

/// Prefix of endpoints answered by the edge itself.
pub const INTERNAL_PREFIX: &str = "/_marquee/";

/// How long shutdown waits for background cache writes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Timeout for a single background cache write.
const CACHE_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

struct EdgeState {
    pipeline: EmbedPipeline,
    health: HealthChecker,
    max_body_size: usize,
}

/// The edge server.
pub struct EdgeServer {
    config: Arc<MarqueeConfig>,
    state: Arc<EdgeState>,
    spawner: SharedSpawner,
}

impl EdgeServer {
    /// Create a server with the cache backend described by the config.
    pub fn new(config: MarqueeConfig) -> MarqueeResult<Self> {
        let cache = cache::from_settings(&config.cache);
        Self::with_cache(config, cache)
    }

    /// Create a server with an explicit cache backend.
    pub fn with_cache(config: MarqueeConfig, cache: SharedCache) -> MarqueeResult<Self> {
        let client = http_client()?;
        let spawner = SharedSpawner::with_config(
            SpawnerConfig::new().with_default_timeout(CACHE_WRITE_TIMEOUT),
        );

        let probe_url = format!(
            "{}{}",
            config.edge.static_origin, config.edge.origin_health_path
        );
        let health = HealthChecker::new(probe_url, cache.name(), spawner.clone(), client.clone());
        let pipeline = EmbedPipeline::new(&config, client, cache, spawner.clone());

        let state = Arc::new(EdgeState {
            pipeline,
            health,
            max_body_size: config.edge.max_request_body_size,
        });

        Ok(Self {
            config: Arc::new(config),
            state,
            spawner,
        })
    }

    /// The background task spawner.
    pub fn spawner(&self) -> &SharedSpawner {
        &self.spawner
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> MarqueeResult<TcpListener> {
        let addr = SocketAddr::new(
            self.config
                .edge
                .listen_addr
                .parse()
                .map_err(|e| MarqueeError::config(format!("invalid listen address: {e}")))?,
            self.config.edge.listen_port,
        );

        TcpListener::bind(addr)
            .await
            .map_err(|e| MarqueeError::server(format!("failed to bind {addr}: {e}")))
    }

    /// Bind and serve until Ctrl-C.
    pub async fn run(self) -> MarqueeResult<()> {
        let listener = self.bind().await?;
        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    ///
    /// After shutdown no new connections are accepted and pending
    /// background cache writes are given a grace period to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> MarqueeResult<()> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "marquee edge listening");
        info!(
            static_origin = %self.config.edge.static_origin,
            api_origin = %self.config.edge.api_origin,
            "injecting embed metadata"
        );

        self.state.health.set_ready(true);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown signal received; no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            let state = self.state.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { handle_request(req, state, peer_addr).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(error = %e, "connection error");
                }
            });
        }

        self.state.health.set_ready(false);
        self.spawner.inner().shutdown(SHUTDOWN_GRACE).await;
        Ok(())
    }
}

impl std::fmt::Debug for EdgeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeServer")
            .field("pipeline", &self.state.pipeline)
            .finish_non_exhaustive()
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<EdgeState>,
    peer_addr: SocketAddr,
) -> Result<Response<EdgeBody>, Infallible> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = Uuid::now_v7().to_string();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        peer = %peer_addr,
    );

    async move {
        if path.starts_with(INTERNAL_PREFIX) {
            return Ok(handle_internal_endpoint(&path, &state.health, &request_id).await);
        }

        let _in_flight = InFlightGuard::new();

        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, state.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let err = MarqueeError::bad_request(format!("failed to read request body: {e}"));
                warn!(error = %err, "rejecting request");
                record_request("error", start.elapsed());
                return Ok(error_response(&err, &request_id));
            }
        };

        let inbound = InboundRequest::new(parts.method, parts.uri)
            .with_headers(parts.headers)
            .with_body(body);

        match state.pipeline.handle(inbound).await {
            Ok(handled) => {
                let duration = start.elapsed();
                record_request(handled.outcome.as_str(), duration);
                info!(
                    outcome = %handled.outcome,
                    status = handled.response.status().as_u16(),
                    duration_ms = %duration.as_millis(),
                    "request completed"
                );
                Ok(handled.response)
            }
            Err(e) => {
                let duration = start.elapsed();
                record_request("error", duration);
                error!(
                    error = %e,
                    category = e.category(),
                    duration_ms = %duration.as_millis(),
                    "request failed"
                );
                Ok(error_response(&e, &request_id))
            }
        }
    }
    .instrument(span)
    .await
}

async fn handle_internal_endpoint(
    path: &str,
    health: &HealthChecker,
    request_id: &str,
) -> Response<EdgeBody> {
    match path {
        "/_marquee/health" => {
            let response = health.liveness();
            let status = if response.status.is_operational() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };

            json_response(status, &response)
        }
        "/_marquee/ready" => {
            let response = health.readiness().await;
            let status = if response.status.is_ready() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };

            json_response(status, &response)
        }
        "/_marquee/metrics" => match render_metrics() {
            Some(text) => {
                let mut response = Response::new(full_body(text));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            None => json_response(
                StatusCode::NOT_FOUND,
                &ErrorResponse::new("not_found", "metrics are disabled").with_request_id(request_id),
            ),
        },
        "/_marquee/version" => {
            let version = serde_json::json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": crate::VERSION,
            });

            json_response(StatusCode::OK, &version)
        }
        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse::new("not_found", format!("unknown internal endpoint: {path}"))
                .with_request_id(request_id),
        ),
    }
}

/// Create a JSON response.
fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<EdgeBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());

    let mut response = Response::new(full_body(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Create an error response for a failed request.
fn error_response(err: &MarqueeError, request_id: &str) -> Response<EdgeBody> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = json_response(status, &ErrorResponse::from(err).with_request_id(request_id));

    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(HEADER_REQUEST_ID.clone(), value);
    }
    response
}
