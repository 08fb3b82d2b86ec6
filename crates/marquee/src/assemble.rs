//! Final response assembly for injected documents.

use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use http::StatusCode;

use crate::cache::CacheEntry;
use crate::config::CacheSettings;
use crate::gate::{content_type, DEFAULT_HTML_CONTENT_TYPE};
use crate::headers::{strip_hop_by_hop, HEADER_CACHE_TAG};

/// Shared-cache directives written on every injected response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirectives {
    /// `s-maxage` value.
    pub shared_max_age: Duration,
    /// `Cache-Tag` label.
    pub cache_tag: String,
}

impl CacheDirectives {
    /// Directives from the `[cache]` config section.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            shared_max_age: settings.shared_max_age,
            cache_tag: settings.cache_tag.clone(),
        }
    }

    /// The `Cache-Control` value.
    pub fn cache_control(&self) -> String {
        format!("public, s-maxage={}", self.shared_max_age.as_secs())
    }
}

impl Default for CacheDirectives {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

/// Normalize the origin status for an injected body.
///
/// A `304 Not Modified` carrying a body is invalid and becomes `200 OK`.
pub fn normalize_status(status: StatusCode) -> StatusCode {
    if status == StatusCode::NOT_MODIFIED {
        StatusCode::OK
    } else {
        status
    }
}

/// Build the outgoing response for an injected document.
///
/// Origin headers are kept apart from hop-by-hop headers. `Content-Type`,
/// `Content-Length`, `Cache-Control` and `Cache-Tag` are set by the edge.
pub fn assemble(
    origin_status: StatusCode,
    origin_headers: &HeaderMap,
    body: String,
    directives: &CacheDirectives,
) -> CacheEntry {
    let mut headers = origin_headers.clone();
    strip_hop_by_hop(&mut headers);

    let content_type = content_type(origin_headers)
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_HTML_CONTENT_TYPE));
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    if let Ok(value) = HeaderValue::from_str(&directives.cache_control()) {
        headers.insert(CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&directives.cache_tag) {
        headers.insert(HEADER_CACHE_TAG.clone(), value);
    }

    CacheEntry::new(normalize_status(origin_status), headers, Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=UTF-8"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("5"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert("etag", HeaderValue::from_static("\"shell-v1\""));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers
    }

    #[test]
    fn test_headers_set_by_edge() {
        let entry = assemble(
            StatusCode::OK,
            &origin_headers(),
            "<p>héllo</p>".to_string(),
            &CacheDirectives::default(),
        );

        assert_eq!(entry.status, StatusCode::OK);
        assert_eq!(entry.headers.get(CONTENT_TYPE).unwrap(), "text/html; charset=UTF-8");
        // Byte length, not character count.
        assert_eq!(entry.headers.get(CONTENT_LENGTH).unwrap(), "13");
        assert_eq!(entry.headers.get(CACHE_CONTROL).unwrap(), "public, s-maxage=300");
        assert_eq!(entry.headers.get("cache-tag").unwrap(), "embed-injected");
        assert_eq!(entry.headers.get("etag").unwrap(), "\"shell-v1\"");
        assert!(entry.headers.get("transfer-encoding").is_none());
        assert_eq!(entry.body, Bytes::from("<p>héllo</p>"));
    }

    #[test]
    fn test_default_content_type() {
        let entry = assemble(
            StatusCode::OK,
            &HeaderMap::new(),
            String::new(),
            &CacheDirectives::default(),
        );
        assert_eq!(entry.headers.get(CONTENT_TYPE).unwrap(), DEFAULT_HTML_CONTENT_TYPE);
        assert_eq!(entry.headers.get(CONTENT_LENGTH).unwrap(), "0");
    }

    #[test]
    fn test_not_modified_becomes_ok() {
        let entry = assemble(
            StatusCode::NOT_MODIFIED,
            &origin_headers(),
            "x".to_string(),
            &CacheDirectives::default(),
        );
        assert_eq!(entry.status, StatusCode::OK);

        assert_eq!(normalize_status(StatusCode::NOT_FOUND), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_custom_directives() {
        let directives = CacheDirectives {
            shared_max_age: Duration::from_secs(60),
            cache_tag: "beta-embeds".to_string(),
        };
        assert_eq!(directives.cache_control(), "public, s-maxage=60");

        let entry = assemble(StatusCode::OK, &HeaderMap::new(), "x".into(), &directives);
        assert_eq!(entry.headers.get("cache-tag").unwrap(), "beta-embeds");
    }
}
