//! Embed metadata fetched from the metadata API.
//!
//! The canonical response is
//! `{"data": [{"type": "name" | "property", "name": "..", "content": ".."}]}`.
//! An older deployment answered with an object (`{"data": {"title", ..}}`);
//! that shape is recognised only to be reported as legacy and is otherwise
//! treated as no metadata. Every failure degrades to "no metadata".

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Attribute key a property renders under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    /// `<meta name=..>`
    Name,
    /// `<meta property=..>`
    Property,
    /// Any other kind; never rendered.
    #[serde(other)]
    Other,
}

impl EmbedKind {
    /// The attribute key, for renderable kinds.
    pub const fn attribute(self) -> Option<&'static str> {
        match self {
            Self::Name => Some("name"),
            Self::Property => Some("property"),
            Self::Other => None,
        }
    }
}

/// One `<meta>` declaration. `name` and `content` are untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedProperty {
    /// Attribute key.
    #[serde(rename = "type")]
    pub kind: EmbedKind,
    /// Property name, e.g. `og:title`.
    pub name: String,
    /// Property value.
    pub content: String,
}

impl EmbedProperty {
    /// Create a `property` kind declaration.
    pub fn property(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: EmbedKind::Property,
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a `name` kind declaration.
    pub fn name(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: EmbedKind::Name,
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Result of asking the metadata API about one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLookup {
    /// A non-empty, ordered property list.
    Found(Vec<EmbedProperty>),
    /// `data` was an empty list.
    Empty,
    /// Unreachable, not JSON, or `data` missing or not a list.
    Unavailable,
    /// The object-shaped legacy response.
    Legacy,
}

impl MetadataLookup {
    /// Label for the `marquee_metadata_fetches_total` counter.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Found(_) => "ok",
            Self::Empty => "empty",
            Self::Unavailable => "unavailable",
            Self::Legacy => "legacy",
        }
    }

    /// The properties, if any were found.
    pub fn into_properties(self) -> Option<Vec<EmbedProperty>> {
        match self {
            Self::Found(properties) => Some(properties),
            _ => None,
        }
    }

    /// Interpret a metadata API response body.
    ///
    /// The HTTP status is not consulted; only the body decides.
    pub fn from_body(body: &[u8]) -> Self {
        let Ok(envelope) = serde_json::from_slice::<Value>(body) else {
            return Self::Unavailable;
        };

        match envelope.get("data") {
            Some(Value::Array(items)) => {
                let properties: Vec<EmbedProperty> = items
                    .iter()
                    .filter_map(|item| match EmbedProperty::deserialize(item) {
                        Ok(property) => Some(property),
                        Err(e) => {
                            debug!(error = %e, "skipping malformed embed property");
                            None
                        }
                    })
                    .collect();

                if properties.is_empty() {
                    Self::Empty
                } else {
                    Self::Found(properties)
                }
            }
            Some(Value::Object(_)) => Self::Legacy,
            _ => Self::Unavailable,
        }
    }
}

/// Client for the metadata API.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
    api_origin: String,
}

impl MetadataClient {
    /// Create a client for `api_origin` (no trailing slash).
    pub fn new(client: reqwest::Client, api_origin: impl Into<String>) -> Self {
        Self {
            client,
            api_origin: api_origin.into(),
        }
    }

    /// The lookup URL for a logical page path.
    pub fn embed_url(&self, path: &str) -> String {
        format!("{}/embed?url={}", self.api_origin, urlencoding::encode(path))
    }

    /// Fetch the embed properties for a logical page path.
    ///
    /// No retry and no timeout beyond the client's own.
    pub async fn fetch(&self, path: &str) -> MetadataLookup {
        let url = self.embed_url(path);

        let body: Bytes = match self.client.get(&url).send().await {
            Ok(response) => match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, url = %url, "metadata body could not be read");
                    return MetadataLookup::Unavailable;
                }
            },
            Err(e) => {
                warn!(error = %e, url = %url, "metadata API unreachable");
                return MetadataLookup::Unavailable;
            }
        };

        let lookup = MetadataLookup::from_body(&body);
        if lookup == MetadataLookup::Legacy {
            warn!(url = %url, "metadata API answered with the legacy object shape; ignoring");
        }
        lookup
    }
}
