//! Observability for the marquee edge.
//!
//! - **Logging**: `tracing-subscriber` registry with an `EnvFilter` and a JSON
//!   (production) or pretty (development) formatter.
//! - **Metrics**: a Prometheus recorder behind the `metrics` facade. The edge
//!   renders it on its own listener at `/_marquee/metrics`, so no separate
//!   exporter port is opened.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `marquee_requests_total` | Counter | `outcome` | Requests by pipeline outcome |
//! | `marquee_request_duration_seconds` | Histogram | `outcome` | End-to-end latency |
//! | `marquee_in_flight_requests` | Gauge | - | Requests being processed |
//! | `marquee_cache_lookups_total` | Counter | `result` | Edge cache hits, misses and errors |
//! | `marquee_cache_writes_total` | Counter | `result` | Background cache writes |
//! | `marquee_metadata_fetches_total` | Counter | `result` | Metadata API outcomes |
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::builder().service_name("marquee").build())?;
//! tracing::info!("telemetry ready");
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::builder()
            .service_name("edge-test")
            .metrics(MetricsConfig { enabled: false })
            .build();

        assert_eq!(config.service_name(), "edge-test");
        assert!(!config.metrics.enabled);
    }
}
