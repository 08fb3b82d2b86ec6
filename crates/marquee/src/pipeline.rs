//! The request pipeline.
//!
//! ```text
//! classify -> origin -> content-type gate -> edge cache -> metadata
//!          -> inject -> assemble -> respond -> (detached) cache store
//! ```
//!
//! Only a failed origin fetch is an error. Metadata, cache and placeholder
//! problems all degrade to serving the origin's page as-is.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::ACCEPT_ENCODING;
use http::{HeaderMap, Method, Response, StatusCode, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use marquee_tasks::SharedSpawner;
use marquee_telemetry::metrics::{record_cache_lookup, record_cache_write, record_metadata_fetch};
use tracing::{debug, info, warn};

use crate::assemble::{assemble, CacheDirectives};
use crate::cache::{CacheEntry, SharedCache};
use crate::classify::PathClassifier;
use crate::config::MarqueeConfig;
use crate::error::{MarqueeError, MarqueeResult};
use crate::gate::{is_html, is_identity_encoded};
use crate::headers::{filter_for_origin, strip_conditional, strip_hop_by_hop};
use crate::inject::{render_fragment, splice};
use crate::metadata::{MetadataClient, MetadataLookup};
use crate::origin::{OriginClient, OriginRequest, OriginResponse};

/// Response body produced by the pipeline.
pub type EdgeBody = UnsyncBoxBody<Bytes, MarqueeError>;

/// A fully buffered body.
pub fn full_body(bytes: impl Into<Bytes>) -> EdgeBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn streamed_body(origin: OriginResponse) -> EdgeBody {
    let frames = origin
        .into_stream()
        .map_ok(Frame::data)
        .map_err(MarqueeError::from);
    StreamBody::new(frames).boxed_unsync()
}

/// How a request left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Non-HTML response streamed back untouched.
    Passthrough,
    /// Served from the edge cache.
    CacheHit,
    /// Metadata injected into the shell.
    Injected,
    /// Metadata unavailable or empty; origin response returned unchanged.
    NoMetadata,
    /// HTML that could not be rewritten (encoded or not UTF-8).
    NotInjectable,
    /// Non-GET request forwarded to its original target.
    Forwarded,
}

impl Outcome {
    /// Label for metrics and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::CacheHit => "cache_hit",
            Self::Injected => "injected",
            Self::NoMetadata => "no_metadata",
            Self::NotInjectable => "not_injectable",
            Self::Forwarded => "forwarded",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request with its body already read.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URI, origin-form or absolute.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl InboundRequest {
    /// Create a body-less request.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Path and query as received.
    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// The full request URL, used as the edge cache key.
    ///
    /// An absolute request URI is used verbatim. Otherwise the URL is
    /// rebuilt from `public_scheme`, the `Host` header and the path and query.
    pub fn url(&self, public_scheme: &str) -> String {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            return self.uri.to_string();
        }

        let host = self
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");

        format!("{public_scheme}://{host}{}", self.path_and_query())
    }
}

/// The pipeline's answer to one request.
pub struct Handled {
    /// How the request was served.
    pub outcome: Outcome,
    /// The response to write back.
    pub response: Response<EdgeBody>,
}

impl fmt::Debug for Handled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handled")
            .field("outcome", &self.outcome)
            .field("status", &self.response.status())
            .finish_non_exhaustive()
    }
}

/// The embed-injection pipeline.
#[derive(Clone)]
pub struct EmbedPipeline {
    classifier: Arc<PathClassifier>,
    origin: OriginClient,
    metadata: MetadataClient,
    cache: SharedCache,
    spawner: SharedSpawner,
    directives: CacheDirectives,
    oembed_endpoint: String,
    public_scheme: String,
}

impl fmt::Debug for EmbedPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedPipeline")
            .field("origin", &self.origin.static_origin())
            .field("cache", &self.cache.name())
            .field("oembed_endpoint", &self.oembed_endpoint)
            .finish_non_exhaustive()
    }
}

impl EmbedPipeline {
    /// Build a pipeline from validated configuration.
    pub fn new(
        config: &MarqueeConfig,
        client: reqwest::Client,
        cache: SharedCache,
        spawner: SharedSpawner,
    ) -> Self {
        Self {
            classifier: Arc::new(PathClassifier::from_settings(&config.rewrite)),
            origin: OriginClient::new(client.clone(), config.edge.static_origin.clone()),
            metadata: MetadataClient::new(client, config.edge.api_origin.clone()),
            cache,
            spawner,
            directives: CacheDirectives::from_settings(&config.cache),
            oembed_endpoint: config.oembed_endpoint(),
            public_scheme: config.edge.public_scheme.clone(),
        }
    }

    /// The origin client.
    pub fn origin(&self) -> &OriginClient {
        &self.origin
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Returns `MarqueeError::Origin` if the origin cannot be reached or its
    /// HTML body cannot be read.
    pub async fn handle(&self, request: InboundRequest) -> MarqueeResult<Handled> {
        if request.method != Method::GET {
            return self.forward(request).await;
        }

        let path = request.uri.path().to_string();
        let decision = self.classifier.classify(&path);

        // The HTTP client negotiates encoding with the origin and decodes the body.
        let mut headers = filter_for_origin(&request.headers);
        headers.remove(ACCEPT_ENCODING);
        if decision.should_rewrite() {
            strip_conditional(&mut headers);
        }

        let target = decision.effective_target(&path, request.uri.query());
        debug!(target = %target, rewrite = decision.should_rewrite(), "fetching from origin");

        let origin = self
            .origin
            .send(
                OriginRequest::new(Method::GET, target)
                    .with_headers(headers)
                    .with_body(request.body.clone()),
            )
            .await?;

        if !is_html(&origin.headers) {
            return Ok(passthrough(Outcome::Passthrough, origin));
        }

        let cache_key = request.url(&self.public_scheme);
        match self.cache.lookup(&cache_key).await {
            Ok(Some(entry)) => {
                record_cache_lookup("hit");
                debug!(key = %cache_key, cached_at = %entry.cached_at, "edge cache hit");
                return Ok(Handled {
                    outcome: Outcome::CacheHit,
                    response: entry_response(&entry),
                });
            }
            Ok(None) => record_cache_lookup("miss"),
            Err(e) => {
                record_cache_lookup("error");
                warn!(error = %e, key = %cache_key, "edge cache lookup failed; treating as miss");
            }
        }

        if !is_identity_encoded(&origin.headers) {
            debug!("origin HTML is content-encoded; not injecting");
            return Ok(passthrough(Outcome::NotInjectable, origin));
        }

        let lookup = self.metadata.fetch(&path).await;
        record_metadata_fetch(lookup.as_str());
        let Some(properties) = lookup.into_properties() else {
            return Ok(passthrough(Outcome::NoMetadata, origin));
        };

        let status = origin.status;
        let origin_headers = origin.headers.clone();
        let body = origin.bytes().await?;

        let html = match String::from_utf8(body.to_vec()) {
            Ok(html) => html,
            Err(_) => {
                warn!("origin HTML is not valid UTF-8; not injecting");
                let mut headers = origin_headers;
                strip_hop_by_hop(&mut headers);
                return Ok(Handled {
                    outcome: Outcome::NotInjectable,
                    response: build_response(status, headers, full_body(body)),
                });
            }
        };

        let fragment = render_fragment(&properties, &self.oembed_endpoint);
        let injected = match splice(&html, &fragment) {
            Cow::Owned(injected) => injected,
            Cow::Borrowed(unchanged) => {
                debug!("shell document has no embed placeholder");
                unchanged.to_owned()
            }
        };
        let entry = assemble(status, &origin_headers, injected, &self.directives);
        let response = entry_response(&entry);

        self.store_detached(cache_key, entry);

        Ok(Handled {
            outcome: Outcome::Injected,
            response,
        })
    }

    /// Forward a non-GET request to its original target.
    async fn forward(&self, request: InboundRequest) -> MarqueeResult<Handled> {
        let origin = self
            .origin
            .send(
                OriginRequest::new(request.method.clone(), request.path_and_query())
                    .with_headers(filter_for_origin(&request.headers))
                    .with_body(request.body),
            )
            .await?;

        Ok(passthrough(Outcome::Forwarded, origin))
    }

    /// Populate the edge cache without holding up the response.
    fn store_detached(&self, key: String, entry: CacheEntry) {
        let cache = self.cache.clone();

        let spawned = self.spawner.spawn_detached("edge-cache-store", async move {
            match cache.store(key, entry).await {
                Ok(()) => record_cache_write("ok"),
                Err(e) => {
                    record_cache_write("error");
                    warn!(error = %e, "edge cache store failed");
                }
            }
        });

        match spawned {
            Ok(task_id) => debug!(task_id = %task_id, "edge cache store scheduled"),
            Err(e) => {
                record_cache_write("rejected");
                info!(error = %e, "edge cache store not scheduled");
            }
        }
    }
}

fn passthrough(outcome: Outcome, origin: OriginResponse) -> Handled {
    let status = origin.status;
    let mut headers = origin.headers.clone();
    strip_hop_by_hop(&mut headers);

    Handled {
        outcome,
        response: build_response(status, headers, streamed_body(origin)),
    }
}

fn entry_response(entry: &CacheEntry) -> Response<EdgeBody> {
    build_response(entry.status, entry.headers.clone(), full_body(entry.body.clone()))
}

fn build_response(status: StatusCode, headers: HeaderMap, body: EdgeBody) -> Response<EdgeBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
