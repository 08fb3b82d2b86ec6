//! Liveness and readiness checks for the edge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use marquee_tasks::SharedSpawner;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Timeout for the readiness probe against the origin.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status of the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving normally.
    Healthy,
    /// Serving, but background cache writes are no longer accepted.
    Degraded,
    /// Not serving.
    Unhealthy,
}

impl HealthStatus {
    /// Check if the status indicates the service is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Readiness status of the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// Ready to handle traffic.
    Ready,
    /// Not ready.
    NotReady,
}

impl ReadinessStatus {
    /// Check if the edge is ready.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status.
    pub status: HealthStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Version information.
    pub version: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status.
    pub status: ReadinessStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
}

/// Result of a single check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Time taken for the check in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
            duration_ms: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
            duration_ms: None,
        }
    }

    /// Set the duration.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Health checker for the edge.
#[derive(Debug)]
pub struct HealthChecker {
    start_time: Instant,
    ready: AtomicBool,
    last_origin_check: RwLock<Option<Instant>>,
    origin_healthy: AtomicBool,
    probe_url: String,
    cache_backend: &'static str,
    spawner: SharedSpawner,
    client: reqwest::Client,
}

impl HealthChecker {
    /// Create a checker probing `probe_url` for readiness.
    pub fn new(
        probe_url: impl Into<String>,
        cache_backend: &'static str,
        spawner: SharedSpawner,
        client: reqwest::Client,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            ready: AtomicBool::new(false),
            last_origin_check: RwLock::new(None),
            origin_healthy: AtomicBool::new(false),
            probe_url: probe_url.into(),
            cache_backend,
            spawner,
            client,
        }
    }

    /// Mark the edge as ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if the edge is ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Get the uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Perform a liveness check.
    pub fn liveness(&self) -> HealthResponse {
        let spawner = self.spawner.inner();
        let tasks = if spawner.is_shutdown() {
            CheckResult::fail("background_tasks", "spawner is shut down")
        } else {
            let running = spawner.running_tasks();
            let message = match running.first() {
                Some(oldest) => format!(
                    "{} running, oldest {} for {}s",
                    running.len(),
                    oldest.name,
                    oldest.age().as_secs()
                ),
                None => "idle".to_string(),
            };
            CheckResult::pass("background_tasks").with_message(message)
        };

        let checks = vec![CheckResult::pass("process").with_message("edge is running"), tasks];

        let status = if checks.iter().all(|c| c.passed) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthResponse {
            status,
            checks,
            uptime_seconds: self.uptime().as_secs(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Perform a readiness check.
    pub async fn readiness(&self) -> ReadinessResponse {
        let checks = vec![
            CheckResult::pass("config").with_message("configuration loaded"),
            CheckResult::pass("cache").with_message(format!("backend: {}", self.cache_backend)),
            self.check_origin().await,
        ];

        let status = if checks.iter().all(|c| c.passed) && self.is_ready() {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };

        ReadinessResponse { status, checks }
    }

    /// Probe the static origin.
    ///
    /// Any status below 500 counts as reachable; a missing health path
    /// still proves the origin answers.
    pub async fn check_origin(&self) -> CheckResult {
        let start = Instant::now();
        let result = self
            .client
            .get(&self.probe_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        *self.last_origin_check.write() = Some(Instant::now());

        match result {
            Ok(resp) if !resp.status().is_server_error() => {
                self.origin_healthy.store(true, Ordering::SeqCst);
                CheckResult::pass("origin")
                    .with_message(format!("status {}", resp.status()))
                    .with_duration(start.elapsed())
            }
            Ok(resp) => {
                self.origin_healthy.store(false, Ordering::SeqCst);
                CheckResult::fail("origin", format!("unhealthy status: {}", resp.status()))
                    .with_duration(start.elapsed())
            }
            Err(e) => {
                self.origin_healthy.store(false, Ordering::SeqCst);
                CheckResult::fail("origin", format!("connection failed: {e}"))
            }
        }
    }

    /// Whether the last origin probe succeeded.
    pub fn is_origin_healthy(&self) -> bool {
        self.origin_healthy.load(Ordering::SeqCst)
    }

    /// Time since the last origin probe.
    pub fn since_last_origin_check(&self) -> Option<Duration> {
        let last = *self.last_origin_check.read();
        last.map(|at| at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(probe_url: &str) -> HealthChecker {
        HealthChecker::new(probe_url, "memory", SharedSpawner::new(), reqwest::Client::new())
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus::Healthy.is_operational());
        assert!(HealthStatus::Degraded.is_operational());
        assert!(!HealthStatus::Unhealthy.is_operational());
    }

    #[test]
    fn test_readiness_status_serialization() {
        assert!(ReadinessStatus::Ready.is_ready());
        assert_eq!(
            serde_json::to_string(&ReadinessStatus::NotReady).unwrap(),
            "\"not_ready\""
        );
    }

    #[test]
    fn test_check_result() {
        let fail = CheckResult::fail("origin", "refused");
        assert!(!fail.passed);
        assert_eq!(fail.message.as_deref(), Some("refused"));

        let timed = CheckResult::pass("origin").with_duration(Duration::from_millis(100));
        assert_eq!(timed.duration_ms, Some(100));
    }

    #[test]
    fn test_liveness() {
        let checker = checker("http://127.0.0.1:9/");
        let response = checker.liveness();
        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.version, crate::VERSION);
        assert_eq!(response.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_liveness_reports_running_background_work() {
        let spawner = SharedSpawner::new();
        let checker =
            HealthChecker::new("http://127.0.0.1:9/", "memory", spawner.clone(), reqwest::Client::new());

        assert_eq!(background_message(&checker), "idle");

        spawner
            .spawn_detached("edge-cache-store", std::future::pending::<()>())
            .unwrap();
        let message = background_message(&checker);
        assert!(message.starts_with("1 running, oldest edge-cache-store for"), "{message}");
    }

    fn background_message(checker: &HealthChecker) -> String {
        checker
            .liveness()
            .checks
            .into_iter()
            .find(|c| c.name == "background_tasks")
            .and_then(|c| c.message)
            .unwrap()
    }

    #[tokio::test]
    async fn test_liveness_degraded_after_spawner_shutdown() {
        let spawner = SharedSpawner::new();
        let checker =
            HealthChecker::new("http://127.0.0.1:9/", "memory", spawner.clone(), reqwest::Client::new());

        spawner.inner().shutdown(Duration::from_millis(10)).await;
        assert_eq!(checker.liveness().status, HealthStatus::Degraded);
    }

    #[test]
    fn test_ready_flag() {
        let checker = checker("http://127.0.0.1:9/");
        assert!(!checker.is_ready());
        checker.set_ready(true);
        assert!(checker.is_ready());
    }

    #[tokio::test]
    async fn test_readiness_fails_when_origin_unreachable() {
        let checker = checker("http://127.0.0.1:9/");
        checker.set_ready(true);

        let response = checker.readiness().await;
        assert_eq!(response.status, ReadinessStatus::NotReady);
        assert!(!checker.is_origin_healthy());
        assert!(checker.since_last_origin_check().is_some());
        assert!(response.checks.iter().any(|c| c.name == "origin" && !c.passed));
    }
}
