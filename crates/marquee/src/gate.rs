//! Content-type gate.
//!
//! Only `text/html` origin responses enter the injection path. Everything
//! else is streamed back untouched and never buffered.

use http::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE};

/// Default content type for assembled responses without one.
pub const DEFAULT_HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// The declared `Content-Type`, if present and readable.
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Whether the declared media type contains `text/html`.
pub fn is_html(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
}

/// Whether the body is sent without a content coding.
///
/// A compressed body cannot be spliced as text.
pub fn is_identity_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .all(|coding| coding.is_empty() || coding.eq_ignore_ascii_case("identity"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn with(name: http::header::HeaderName, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(&with(CONTENT_TYPE, "text/html")));
        assert!(is_html(&with(CONTENT_TYPE, "text/html; charset=utf-8")));
        assert!(is_html(&with(CONTENT_TYPE, "Text/HTML")));
        assert!(!is_html(&with(CONTENT_TYPE, "application/json")));
        assert!(!is_html(&with(CONTENT_TYPE, "image/png")));
        assert!(!is_html(&HeaderMap::new()));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(&with(CONTENT_TYPE, "text/css")), Some("text/css"));
        assert_eq!(content_type(&HeaderMap::new()), None);
    }

    #[test]
    fn test_identity_encoding() {
        assert!(is_identity_encoded(&HeaderMap::new()));
        assert!(is_identity_encoded(&with(CONTENT_ENCODING, "identity")));
        assert!(!is_identity_encoded(&with(CONTENT_ENCODING, "gzip")));
        assert!(!is_identity_encoded(&with(CONTENT_ENCODING, "identity, br")));
    }
}
