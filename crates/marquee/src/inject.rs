//! Rendering embed properties into markup and splicing them into the shell.
//!
//! The shell document carries a placeholder region
//! `<!-- embed start -->...<!-- embed end -->`. The first such region is
//! replaced wholesale by the rendered fragment; a document without the pair
//! passes through unchanged.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};

use crate::metadata::{EmbedKind, EmbedProperty};

/// Separator between rendered tags.
const TAG_SEPARATOR: &str = "\n\t\t";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"(?s)<!-- embed start -->.*?<!-- embed end -->").expect("valid regex")
    })
}

/// Escape a string for use inside a double- or single-quoted attribute.
///
/// Existing entities in the input are escaped again, not preserved.
/// Non-breaking spaces and newlines are escaped as well.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            '\n' => escaped.push_str("&NewLine;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Render one property as a `<meta>` tag, if its kind is renderable.
pub fn render_meta(property: &EmbedProperty) -> Option<String> {
    let attribute = property.kind.attribute()?;
    Some(format!(
        r#"<meta {attribute}="{}" content="{}" />"#,
        escape_attribute(&property.name),
        escape_attribute(&property.content),
    ))
}

fn find_property<'a>(properties: &'a [EmbedProperty], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|p| p.kind == EmbedKind::Property && p.name == name)
        .map(|p| p.content.as_str())
}

/// The oEmbed discovery URL for a canonical page URL.
pub fn oembed_href(endpoint: &str, canonical_url: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{endpoint}{separator}url={}",
        urlencoding::encode(canonical_url)
    )
}

/// Render the replacement fragment for the placeholder region.
///
/// Meta tags follow input order. When an `og:url` property with non-empty
/// content exists, an oEmbed discovery `<link>` is appended, titled by
/// `og:title` when that is non-empty too.
pub fn render_fragment(properties: &[EmbedProperty], oembed_endpoint: &str) -> String {
    let mut fragment = properties
        .iter()
        .filter_map(render_meta)
        .collect::<Vec<_>>()
        .join(TAG_SEPARATOR);

    let canonical = find_property(properties, "og:url").filter(|url| !url.is_empty());
    if let Some(canonical) = canonical {
        let href = escape_attribute(&oembed_href(oembed_endpoint, canonical));
        let title = find_property(properties, "og:title")
            .filter(|title| !title.is_empty())
            .map(|title| format!(r#" title="{}""#, escape_attribute(title)))
            .unwrap_or_default();

        fragment.push_str(TAG_SEPARATOR);
        fragment.push_str(&format!(
            r#"<link rel="alternate" type="application/json+oembed" href="{href}"{title} />"#
        ));
    }

    fragment
}

/// Replace the first placeholder region with `fragment`.
///
/// `fragment` is inserted literally; `$` sequences are not expanded.
/// Returns `Cow::Borrowed` when `html` has no placeholder.
pub fn splice<'h>(html: &'h str, fragment: &str) -> Cow<'h, str> {
    placeholder().replacen(html, 1, NoExpand(fragment))
}
