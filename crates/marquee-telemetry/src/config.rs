//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Settings for logging and metrics, assembled once at startup.
///
/// The service name is stamped onto the logging section when built so the
/// startup line and the subscriber agree on it.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Metrics recorder settings.
    pub metrics: MetricsConfig,

    /// Subscriber settings.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Starts a builder seeded with production defaults.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Name the edge reports itself as.
    pub fn service_name(&self) -> &str {
        &self.logging.service_name
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    service_name: Option<String>,
    metrics: Option<MetricsConfig>,
    logging: Option<LogConfig>,
}

impl TelemetryConfigBuilder {
    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        self.service_name = Some(name.to_string());
        self
    }

    /// Replaces the metrics section.
    #[must_use]
    pub fn metrics(mut self, config: MetricsConfig) -> Self {
        self.metrics = Some(config);
        self
    }

    /// Replaces the logging section.
    #[must_use]
    pub fn logging(mut self, config: LogConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let mut logging = self.logging.unwrap_or_default();
        if let Some(name) = self.service_name {
            logging.service_name = name;
        }

        TelemetryConfig {
            metrics: self.metrics.unwrap_or_default(),
            logging,
        }
    }
}
