//! Prometheus metrics for the edge pipeline.
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder the `metrics` facade discards the samples.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Installs the global Prometheus recorder.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    describe_metrics();
    Ok(())
}

/// Renders metrics in Prometheus text format, if the recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(
        "marquee_requests_total",
        "Requests handled by the edge, by pipeline outcome"
    );
    describe_histogram!(
        "marquee_request_duration_seconds",
        "End-to-end request duration in seconds"
    );
    describe_gauge!(
        "marquee_in_flight_requests",
        "Requests currently being processed"
    );
    describe_counter!(
        "marquee_cache_lookups_total",
        "Edge cache lookups by result (hit, miss, error)"
    );
    describe_counter!(
        "marquee_cache_writes_total",
        "Background edge cache writes by result (ok, error, rejected)"
    );
    describe_counter!(
        "marquee_metadata_fetches_total",
        "Metadata API fetches by result (ok, empty, unavailable, legacy)"
    );
}

/// Records a finished request.
pub fn record_request(outcome: &'static str, duration: Duration) {
    counter!("marquee_requests_total", "outcome" => outcome).increment(1);
    histogram!("marquee_request_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

/// Records an edge cache lookup result.
pub fn record_cache_lookup(result: &'static str) {
    counter!("marquee_cache_lookups_total", "result" => result).increment(1);
}

/// Records the result of a background cache write.
pub fn record_cache_write(result: &'static str) {
    counter!("marquee_cache_writes_total", "result" => result).increment(1);
}

/// Records a metadata API fetch result.
pub fn record_metadata_fetch(result: &'static str) {
    counter!("marquee_metadata_fetches_total", "result" => result).increment(1);
}

/// Keeps `marquee_in_flight_requests` raised for its lifetime.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("marquee_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("marquee_in_flight_requests").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert!(MetricsConfig::default().enabled);
    }

    #[test]
    fn test_disabled_metrics_is_noop() {
        assert!(init_metrics(&MetricsConfig { enabled: false }).is_ok());
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_request("injected", Duration::from_millis(12));
        record_cache_lookup("miss");
        record_cache_write("ok");
        record_metadata_fetch("unavailable");
        let guard = InFlightGuard::new();
        drop(guard);
    }
}
