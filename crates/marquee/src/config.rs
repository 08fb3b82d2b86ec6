//! Configuration for the marquee edge.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MarqueeError, MarqueeResult};

/// Edge configuration.
///
/// Loaded from an optional TOML/JSON file, then overlaid with environment
/// variables, then validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarqueeConfig {
    /// Listener and upstream settings.
    pub edge: EdgeSettings,
    /// Which paths are rewritten to the shell document.
    pub rewrite: RewriteSettings,
    /// Edge cache and cache directives.
    pub cache: CacheSettings,
    /// Logging and metrics.
    pub telemetry: TelemetrySettings,
}

impl MarqueeConfig {
    /// Create a new configuration builder.
    pub fn builder() -> MarqueeConfigBuilder {
        MarqueeConfigBuilder::default()
    }

    /// Load configuration from a `.toml` or `.json` file.
    pub fn from_file(path: impl Into<PathBuf>) -> MarqueeResult<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| MarqueeError::config(format!("failed to read config file: {e}")))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| MarqueeError::config(format!("invalid TOML: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| MarqueeError::config(format!("invalid JSON: {e}"))),
            _ => Err(MarqueeError::config(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// `STATIC_ORIGIN` and `API_ORIGIN` keep their deployment names; every
    /// other variable is prefixed with `MARQUEE_`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    #[must_use]
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(origin) = var("STATIC_ORIGIN") {
            self.edge.static_origin = origin;
        }

        if let Some(origin) = var("API_ORIGIN") {
            self.edge.api_origin = origin;
        }

        if let Some(addr) = var("MARQUEE_LISTEN_ADDR") {
            self.edge.listen_addr = addr;
        }

        if let Some(port) = var("MARQUEE_LISTEN_PORT").and_then(|p| p.parse().ok()) {
            self.edge.listen_port = port;
        }

        if let Some(endpoint) = var("MARQUEE_OEMBED_ENDPOINT") {
            self.edge.oembed_endpoint = Some(endpoint);
        }

        if let Some(ttl) = var("MARQUEE_CACHE_TTL").and_then(|t| humantime_serde::parse_duration(&t).ok()) {
            self.cache.ttl = ttl;
        }

        if let Some(enabled) = var("MARQUEE_CACHE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.cache.enabled = enabled;
        }

        if let Some(level) = var("MARQUEE_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }

        if let Some(json) = var("MARQUEE_JSON_LOGS").and_then(|v| parse_bool(&v)) {
            self.telemetry.json_logs = json;
        }

        self
    }

    /// Validate the configuration and normalize origin URLs.
    pub fn validate(mut self) -> MarqueeResult<Self> {
        self.edge.static_origin = normalize_origin("static_origin", &self.edge.static_origin)?;
        self.edge.api_origin = normalize_origin("api_origin", &self.edge.api_origin)?;

        if let Some(endpoint) = &self.edge.oembed_endpoint {
            if !is_http_url(endpoint) {
                return Err(MarqueeError::config(
                    "oembed_endpoint must start with http:// or https://",
                ));
            }
        }

        if self.cache.enabled && self.cache.ttl.is_zero() {
            return Err(MarqueeError::config("cache ttl must be non-zero when the cache is enabled"));
        }

        Ok(self)
    }

    /// The oEmbed discovery endpoint, defaulting to `{api_origin}/oembed`.
    pub fn oembed_endpoint(&self) -> String {
        self.edge
            .oembed_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/oembed", self.edge.api_origin))
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn normalize_origin(field: &str, origin: &str) -> MarqueeResult<String> {
    if origin.is_empty() {
        return Err(MarqueeError::config(format!("{field} is required")));
    }

    if !is_http_url(origin) {
        return Err(MarqueeError::config(format!(
            "{field} must start with http:// or https://"
        )));
    }

    Ok(origin.trim_end_matches('/').to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Listener and upstream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSettings {
    /// Address to bind to.
    pub listen_addr: String,
    /// Port the edge listens on.
    pub listen_port: u16,
    /// Base URL of the static content origin.
    pub static_origin: String,
    /// Base URL of the metadata API.
    pub api_origin: String,
    /// oEmbed discovery endpoint advertised in injected pages.
    pub oembed_endpoint: Option<String>,
    /// Scheme used for cache keys when the request URI carries none.
    pub public_scheme: String,
    /// Path probed on the static origin by the readiness check.
    pub origin_health_path: String,
    /// Maximum inbound request body size in bytes.
    pub max_request_body_size: usize,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8787,
            static_origin: String::new(),
            api_origin: String::new(),
            oembed_endpoint: None,
            public_scheme: "https".to_string(),
            origin_health_path: "/".to_string(),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Rewrite exclusions.
///
/// A path matching any list is forwarded as-is and never rewritten to the
/// shell document. Lists given in a config file replace the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSettings {
    /// Path prefixes (asset and localized-content directories).
    pub prefix_exclusions: Vec<String>,
    /// Path suffixes (script and stylesheet extensions).
    pub suffix_exclusions: Vec<String>,
    /// Exact paths (well-known files).
    pub exact_exclusions: Vec<String>,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }

        Self {
            prefix_exclusions: owned(&["/image/", "/font/", "/style/", "/lang/", "/beta/", "/js/"]),
            suffix_exclusions: owned(&[".css", ".js"]),
            exact_exclusions: owned(&[
                "/env.json",
                "/CNAME",
                "/manifest.webmanifest",
                "/oembed.json",
            ]),
        }
    }
}

/// Edge cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether assembled responses are cached at the edge.
    pub enabled: bool,
    /// Maximum number of cached responses.
    pub max_capacity: u64,
    /// How long a cached response stays valid.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// `s-maxage` advertised to shared caches.
    #[serde(with = "humantime_serde")]
    pub shared_max_age: Duration,
    /// `Cache-Tag` label on injected responses.
    pub cache_tag: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 10_000,
            ttl: Duration::from_secs(300),
            shared_max_age: Duration::from_secs(300),
            cache_tag: "embed-injected".to_string(),
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Service name for logs.
    pub service_name: String,
    /// `EnvFilter` directive.
    pub log_level: String,
    /// JSON log lines instead of pretty output.
    pub json_logs: bool,
    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: "marquee".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
        }
    }
}

/// Builder for `MarqueeConfig`.
#[derive(Debug, Default)]
pub struct MarqueeConfigBuilder {
    config: MarqueeConfig,
}

impl MarqueeConfigBuilder {
    /// Set the listen address.
    #[must_use]
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.edge.listen_addr = addr.into();
        self
    }

    /// Set the listen port.
    #[must_use]
    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.edge.listen_port = port;
        self
    }

    /// Set the static origin.
    #[must_use]
    pub fn static_origin(mut self, url: impl Into<String>) -> Self {
        self.config.edge.static_origin = url.into();
        self
    }

    /// Set the metadata API origin.
    #[must_use]
    pub fn api_origin(mut self, url: impl Into<String>) -> Self {
        self.config.edge.api_origin = url.into();
        self
    }

    /// Set the oEmbed discovery endpoint.
    #[must_use]
    pub fn oembed_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.edge.oembed_endpoint = Some(url.into());
        self
    }

    /// Replace the rewrite exclusions.
    #[must_use]
    pub fn rewrite(mut self, rewrite: RewriteSettings) -> Self {
        self.config.rewrite = rewrite;
        self
    }

    /// Enable or disable the edge cache.
    #[must_use]
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Set the edge cache TTL.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.ttl = ttl;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> MarqueeResult<MarqueeConfig> {
        self.config.validate()
    }
}

/// Duration (de)serialization as `300s`, `5m`, `1h` or `250ms`.
pub(crate) mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let (digits, scale): (&str, fn(u64) -> Duration) = if let Some(n) = s.strip_suffix("ms") {
            (n, Duration::from_millis)
        } else if let Some(n) = s.strip_suffix('s') {
            (n, Duration::from_secs)
        } else if let Some(n) = s.strip_suffix('m') {
            (n, |m| Duration::from_secs(m * 60))
        } else if let Some(n) = s.strip_suffix('h') {
            (n, |h| Duration::from_secs(h * 3600))
        } else {
            (s, Duration::from_secs)
        };

        digits
            .trim()
            .parse::<u64>()
            .map(scale)
            .map_err(|_| format!("invalid duration: {s:?}"))
    }
}
