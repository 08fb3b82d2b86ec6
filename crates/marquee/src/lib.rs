//! Marquee - embed metadata at the edge
//!
//! Marquee sits in front of a static origin serving a single-page
//! application. Every application route is rewritten to the one shell
//! document, and before that document is returned the edge asks a metadata
//! API for the page's Open Graph / oEmbed properties and splices them into
//! a placeholder region. Link previews then reflect the page that was
//! requested, even though every route is served by the same file.
//!
//! # Request flow
//!
//! ```text
//!  client ──► classify ──► origin ──► content-type gate ──► non-HTML: stream back
//!                                             │
//!                                             ▼
//!                                        edge cache ──► hit: cached response
//!                                             │
//!                                             ▼
//!                                metadata API ──► none: origin page as-is
//!                                             │
//!                                             ▼
//!                               inject ──► assemble ──► client
//!                                             │
//!                                             └──► (detached) cache store
//! ```
//!
//! Only an origin failure is visible to the client (`502`). Every
//! enrichment failure degrades to serving the origin's page unchanged.
//!
//! # Example Usage
//!
//! ```bash
//! # Run with a configuration file
//! $ marquee --config /etc/marquee/marquee.toml
//!
//! # Run from the environment alone
//! $ STATIC_ORIGIN=https://static.example API_ORIGIN=https://api.example marquee
//! ```

#![doc(html_root_url = "https://docs.rs/marquee/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assemble;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod gate;
pub mod headers;
pub mod health;
pub mod inject;
pub mod metadata;
pub mod origin;
pub mod pipeline;
pub mod server;

pub use assemble::{assemble, CacheDirectives};
pub use cache::{CacheEntry, DisabledCache, EdgeCache, MemoryCache, SharedCache};
pub use classify::{PathClassifier, RewriteDecision};
pub use config::{MarqueeConfig, MarqueeConfigBuilder};
pub use error::{ErrorResponse, MarqueeError, MarqueeResult};
pub use health::{HealthChecker, HealthStatus, ReadinessStatus};
pub use metadata::{EmbedKind, EmbedProperty, MetadataClient, MetadataLookup};
pub use origin::{OriginClient, OriginRequest, OriginResponse};
pub use pipeline::{EdgeBody, EmbedPipeline, Handled, InboundRequest, Outcome};
pub use server::EdgeServer;

/// Marquee version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
