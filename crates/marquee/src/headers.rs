//! Header hygiene between the client, the edge and the origin.
//!
//! The edge is transparent apart from three adjustments: hop-by-hop headers
//! never cross it, the outbound request drops `host`/`content-length`
//! (the client library recomputes both), and rewritten requests lose their
//! conditional-GET headers.

use http::header::{HeaderMap, HeaderName, CONNECTION};

/// Header name for request ID.
pub static HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header name for the cache tag on injected responses.
pub static HEADER_CACHE_TAG: HeaderName = HeaderName::from_static("cache-tag");

/// Hop-by-hop headers (RFC 9110 §7.6.1).
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Conditional-GET headers stripped from rewritten requests.
pub static CONDITIONAL_HEADERS: &[&str] = &["if-none-match", "if-modified-since"];

/// Check if a header is hop-by-hop.
pub fn is_hop_by_hop_header(name: &str) -> bool {
    let name_lower = name.to_ascii_lowercase();
    HOP_BY_HOP_HEADERS.contains(&name_lower.as_str())
}

/// Headers to send to the origin for an inbound request.
///
/// Drops hop-by-hop headers, any header the client nominated in
/// `Connection`, and `host`/`content-length`.
pub fn filter_for_origin(headers: &HeaderMap) -> HeaderMap {
    let nominated = connection_nominated(headers);
    let mut filtered = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name_str = name.as_str();
        if is_hop_by_hop_header(name_str)
            || name_str == "host"
            || name_str == "content-length"
            || nominated.iter().any(|n| n == name_str)
        {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }

    filtered
}

/// Remove conditional-GET headers in place.
pub fn strip_conditional(headers: &mut HeaderMap) {
    for name in CONDITIONAL_HEADERS {
        headers.remove(*name);
    }
}

/// Remove hop-by-hop headers from an origin response in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in connection_nominated(headers) {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

fn connection_nominated(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_is_hop_by_hop_header() {
        assert!(is_hop_by_hop_header("Connection"));
        assert!(is_hop_by_hop_header("transfer-encoding"));
        assert!(is_hop_by_hop_header("TE"));
        assert!(!is_hop_by_hop_header("content-type"));
        assert!(!is_hop_by_hop_header("cookie"));
    }

    #[test]
    fn test_filter_for_origin() {
        let headers = map(&[
            ("host", "edge.example"),
            ("content-length", "12"),
            ("connection", "keep-alive, x-drop-me"),
            ("keep-alive", "timeout=5"),
            ("x-drop-me", "1"),
            ("cookie", "session=abc"),
            ("accept", "text/html"),
            ("if-none-match", "\"abc\""),
        ]);

        let filtered = filter_for_origin(&headers);

        assert!(filtered.get("host").is_none());
        assert!(filtered.get("content-length").is_none());
        assert!(filtered.get("connection").is_none());
        assert!(filtered.get("keep-alive").is_none());
        assert!(filtered.get("x-drop-me").is_none());
        assert_eq!(filtered.get("cookie").unwrap(), "session=abc");
        assert_eq!(filtered.get("accept").unwrap(), "text/html");
        assert_eq!(filtered.get("if-none-match").unwrap(), "\"abc\"");
    }

    #[test]
    fn test_filter_keeps_repeated_headers() {
        let headers = map(&[("accept-language", "en"), ("accept-language", "fr")]);
        let filtered = filter_for_origin(&headers);
        assert_eq!(filtered.get_all("accept-language").iter().count(), 2);
    }

    #[test]
    fn test_strip_conditional() {
        let mut headers = map(&[
            ("if-none-match", "\"abc\""),
            ("if-modified-since", "Wed, 21 Oct 2015 07:28:00 GMT"),
            ("accept", "*/*"),
        ]);

        strip_conditional(&mut headers);

        assert!(headers.get("if-none-match").is_none());
        assert!(headers.get("if-modified-since").is_none());
        assert!(headers.get("accept").is_some());
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = map(&[
            ("transfer-encoding", "chunked"),
            ("connection", "close"),
            ("content-type", "image/png"),
            ("etag", "\"v1\""),
        ]);

        strip_hop_by_hop(&mut headers);

        assert!(headers.get("transfer-encoding").is_none());
        assert!(headers.get("connection").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "image/png");
        assert_eq!(headers.get("etag").unwrap(), "\"v1\"");
    }
}
