//! Request path classification.
//!
//! Every application route is served by one shell document at `/`. A path
//! is rewritten to that shell unless it matches one of the configured
//! exclusion sets (asset directories, script/style extensions, well-known
//! files), in which case it is fetched from the origin as-is.

use crate::config::RewriteSettings;

/// Whether a request is rewritten to the shell document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteDecision {
    /// Fetch `/` from the origin, keeping the query string.
    Rewrite,
    /// Fetch the original path and query unchanged.
    Passthrough,
}

impl RewriteDecision {
    /// Returns `true` for [`RewriteDecision::Rewrite`].
    pub const fn should_rewrite(self) -> bool {
        matches!(self, Self::Rewrite)
    }

    /// The path and query to request from the origin.
    ///
    /// A rewritten target is `/` followed by the original query verbatim.
    pub fn effective_target(self, path: &str, query: Option<&str>) -> String {
        let path = match self {
            Self::Rewrite => "/",
            Self::Passthrough => path,
        };

        match query {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        }
    }
}

/// Decides rewrites from the request path alone.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    exact: Vec<String>,
}

impl PathClassifier {
    /// Create a classifier from explicit exclusion lists.
    pub fn new(prefixes: Vec<String>, suffixes: Vec<String>, exact: Vec<String>) -> Self {
        Self {
            prefixes,
            suffixes,
            exact,
        }
    }

    /// Create a classifier from the `[rewrite]` config section.
    pub fn from_settings(settings: &RewriteSettings) -> Self {
        Self::new(
            settings.prefix_exclusions.clone(),
            settings.suffix_exclusions.clone(),
            settings.exact_exclusions.clone(),
        )
    }

    /// Check whether `path` matches any exclusion set.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.suffixes.iter().any(|s| path.ends_with(s.as_str()))
            || self.exact.iter().any(|e| e == path)
    }

    /// Classify a request path.
    pub fn classify(&self, path: &str) -> RewriteDecision {
        if self.is_excluded(path) {
            RewriteDecision::Passthrough
        } else {
            RewriteDecision::Rewrite
        }
    }
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::from_settings(&RewriteSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_prefixes() {
        let classifier = PathClassifier::default();
        for path in ["/image/logo.png", "/font/a.woff2", "/lang/en.json", "/beta/", "/js/x"] {
            assert_eq!(classifier.classify(path), RewriteDecision::Passthrough, "{path}");
        }
    }

    #[test]
    fn test_excluded_suffixes() {
        let classifier = PathClassifier::default();
        assert!(classifier.is_excluded("/app.css"));
        assert!(classifier.is_excluded("/deep/nested/bundle.js"));
        assert!(!classifier.is_excluded("/page.json"));
    }

    #[test]
    fn test_excluded_exact() {
        let classifier = PathClassifier::default();
        assert!(classifier.is_excluded("/CNAME"));
        assert!(classifier.is_excluded("/manifest.webmanifest"));
        assert!(!classifier.is_excluded("/CNAME/child"));
        assert!(!classifier.is_excluded("/cname"));
    }

    #[test]
    fn test_application_routes_rewritten() {
        let classifier = PathClassifier::default();
        assert!(classifier.classify("/").should_rewrite());
        assert!(classifier.classify("/board/42").should_rewrite());
        assert!(classifier.classify("/images/not-the-asset-dir").should_rewrite());
    }

    #[test]
    fn test_effective_target() {
        assert_eq!(
            RewriteDecision::Rewrite.effective_target("/board/42", Some("tab=2&x=1")),
            "/?tab=2&x=1"
        );
        assert_eq!(RewriteDecision::Rewrite.effective_target("/board/42", None), "/");
        assert_eq!(
            RewriteDecision::Passthrough.effective_target("/js/app.js", Some("v=3")),
            "/js/app.js?v=3"
        );
        assert_eq!(
            RewriteDecision::Passthrough.effective_target("/CNAME", None),
            "/CNAME"
        );
    }

    #[test]
    fn test_custom_lists_replace_defaults() {
        let classifier = PathClassifier::new(vec!["/assets/".into()], vec![], vec![]);
        assert!(classifier.is_excluded("/assets/a.png"));
        assert!(!classifier.is_excluded("/js/app.js"));
    }
}
