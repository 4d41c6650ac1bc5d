//! Concurrent health aggregation
//!
//! Every registered probe runs in its own task under a per-probe timeout.
//! A slow or failing probe is folded into a DOWN record; it never hides the
//! results of its siblings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-probe timeout applied when the caller doesn't override it.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    pub fn is_up(self) -> bool {
        self == HealthStatus::Up
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    /// Seconds.
    #[serde(rename = "responseTime")]
    pub response_time: Option<f64>,
}

impl ComponentHealth {
    pub fn up(response_time: f64) -> Self {
        Self {
            status: HealthStatus::Up,
            details: None,
            response_time: Some(response_time),
        }
    }

    pub fn down(error: impl Into<String>, response_time: f64) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), Value::String(error.into()));
        Self {
            status: HealthStatus::Down,
            details: Some(details),
            response_time: Some(response_time),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// `details.error`, if the probe reported one.
    pub fn error(&self) -> Option<&str> {
        self.details.as_ref()?.get("error")?.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(anyhow::anyhow!("unknown environment: {}", other)),
        }
    }
}

/// Full answer to a health request. Rebuilt on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Seconds since process start.
    pub uptime: f64,
    pub checks: BTreeMap<String, ComponentHealth>,
    pub version: String,
    pub environment: Environment,
}

// ============================================================================
// Probes
// ============================================================================

/// One subsystem check. An `Err` is reported as DOWN with the error text.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> anyhow::Result<ComponentHealth>;
}

/// Probe backed by an async closure, handy for ad-hoc checks and tests.
pub struct FnProbe<F>(pub F);

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<ComponentHealth>> + Send,
{
    async fn check(&self) -> anyhow::Result<ComponentHealth> {
        (self.0)().await
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("Timeout after {:?}s", timeout.as_secs_f64())
}

/// Runs every probe concurrently and waits for all of them.
///
/// With `timeout = None` or a zero timeout probes may run indefinitely. A timed-out probe is
/// only abandoned: its task is dropped at the next yield point, and any
/// blocking work it started is not interrupted.
pub async fn gather_health_checks(
    probes: &[(String, Arc<dyn HealthProbe>)],
    timeout: Option<Duration>,
) -> BTreeMap<String, ComponentHealth> {
    let timeout = timeout.filter(|limit| !limit.is_zero());
    let handles: Vec<_> = probes
        .iter()
        .map(|(name, probe)| {
            let probe = Arc::clone(probe);
            let handle = tokio::spawn(async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, probe.check()).await.ok(),
                    None => Some(probe.check().await),
                }
            });
            (name.clone(), handle)
        })
        .collect();

    let mut checks = BTreeMap::new();
    for (name, handle) in handles {
        let record = match handle.await {
            Ok(Some(Ok(record))) => record,
            Ok(Some(Err(e))) => {
                warn!(probe = %name, error = %e, "health probe failed");
                ComponentHealth::down(e.to_string(), 0.0)
            }
            Ok(None) => {
                let limit = timeout.unwrap_or_default();
                warn!(probe = %name, timeout_secs = limit.as_secs_f64(), "health probe timed out");
                ComponentHealth::down(timeout_message(limit), limit.as_secs_f64())
            }
            Err(e) => {
                warn!(probe = %name, error = %e, "health probe task aborted");
                ComponentHealth::down(e.to_string(), 0.0)
            }
        };
        debug!(probe = %name, status = %record.status, "health probe finished");
        checks.insert(name, record);
    }
    checks
}

/// DOWN as soon as any component is DOWN.
pub fn overall_status<'a>(checks: impl IntoIterator<Item = &'a ComponentHealth>) -> HealthStatus {
    if checks.into_iter().any(|c| c.status == HealthStatus::Down) {
        HealthStatus::Down
    } else {
        HealthStatus::Up
    }
}

// ============================================================================
// Service
// ============================================================================

/// Named probes plus the timeout they run under.
pub struct HealthService {
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    timeout: Option<Duration>,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            timeout: Some(DEFAULT_PROBE_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a probe; a later probe with the same name replaces the earlier one.
    pub fn with_probe(mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Self {
        let name = name.into();
        self.probes.retain(|(existing, _)| *existing != name);
        self.probes.push((name, probe));
        self
    }

    pub fn probe_names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(|(name, _)| name.as_str())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn check_health(
        &self,
        version: &str,
        environment: Environment,
        uptime: Duration,
    ) -> HealthReport {
        let checks = gather_health_checks(&self.probes, self.timeout).await;
        let status = overall_status(checks.values());

        HealthReport {
            status,
            uptime: uptime.as_secs_f64(),
            checks,
            version: version.to_string(),
            environment,
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn probe<F, Fut>(f: F) -> Arc<dyn HealthProbe>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<ComponentHealth>> + Send + 'static,
    {
        Arc::new(FnProbe(f))
    }

    fn healthy() -> Arc<dyn HealthProbe> {
        probe(|| async { Ok(ComponentHealth::up(0.01).with_detail("version", "1.2")) })
    }

    fn broken() -> Arc<dyn HealthProbe> {
        probe(|| async { Err(anyhow::anyhow!("connection refused")) })
    }

    fn hanging() -> Arc<dyn HealthProbe> {
        probe(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ComponentHealth::up(3600.0))
        })
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Down).unwrap(), "\"DOWN\"");
        assert_eq!(
            serde_json::to_string(&Environment::Development).unwrap(),
            "\"development\""
        );
    }

    #[test]
    fn test_component_health_json_shape() {
        let json = serde_json::to_value(ComponentHealth::down("boom", 0.0)).unwrap();
        assert_eq!(json["status"], "DOWN");
        assert_eq!(json["details"]["error"], "boom");
        assert_eq!(json["responseTime"], 0.0);
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(timeout_message(Duration::from_secs(5)), "Timeout after 5.0s");
        assert_eq!(timeout_message(Duration::from_millis(250)), "Timeout after 0.25s");
    }

    #[tokio::test]
    async fn test_all_up() {
        let service = HealthService::new()
            .with_probe("camera", healthy())
            .with_probe("stream", healthy());

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::from_secs(12))
            .await;

        assert_eq!(report.status, HealthStatus::Up);
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.uptime, 12.0);
        assert_eq!(report.version, "1.0.0");
        // successful records are returned verbatim
        assert_eq!(
            report.checks["camera"],
            ComponentHealth::up(0.01).with_detail("version", "1.2")
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_complete_report() {
        let service = HealthService::new()
            .with_probe("a", broken())
            .with_probe("b", healthy())
            .with_probe("c", healthy());

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;

        assert_eq!(report.status, HealthStatus::Down);
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.checks["a"].error(), Some("connection refused"));
        assert_eq!(report.checks["a"].response_time, Some(0.0));
        assert!(report.checks["b"].status.is_up());
        assert!(report.checks["c"].status.is_up());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_per_probe() {
        let service = HealthService::new()
            .with_timeout(Some(Duration::from_secs(2)))
            .with_probe("slow", hanging())
            .with_probe("fast", healthy());

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;

        assert_eq!(report.status, HealthStatus::Down);
        let slow = &report.checks["slow"];
        assert_eq!(slow.status, HealthStatus::Down);
        assert_eq!(slow.error(), Some("Timeout after 2.0s"));
        assert_eq!(slow.response_time, Some(2.0));
        assert!(report.checks["fast"].status.is_up());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_concurrently() {
        let slow = || {
            probe(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(ComponentHealth::up(3.0))
            })
        };
        let service = HealthService::new()
            .with_timeout(Some(Duration::from_secs(4)))
            .with_probe("one", slow())
            .with_probe("two", slow());

        // sequential execution would exceed the 4s limit on the second probe
        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;
        assert_eq!(report.status, HealthStatus::Up);
    }

    #[tokio::test]
    async fn test_panicking_probe_reported_down() {
        let service = HealthService::new()
            .with_probe(
                "panics",
                probe(|| async {
                    if true {
                        panic!("probe exploded");
                    }
                    Ok(ComponentHealth::up(0.0))
                }),
            )
            .with_probe("ok", healthy());

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;
        assert_eq!(report.checks["panics"].status, HealthStatus::Down);
        assert!(report.checks["ok"].status.is_up());
    }

    #[tokio::test]
    async fn test_no_timeout_waits_for_completion() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let service = HealthService::new().with_timeout(None).with_probe(
            "slow",
            probe(move || {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(ComponentHealth::up(0.02))
                }
            }),
        );

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;
        assert!(report.status.is_up());
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_means_unbounded() {
        let service = HealthService::new()
            .with_timeout(Some(Duration::ZERO))
            .with_probe(
                "slow",
                probe(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok(ComponentHealth::up(2.0))
                }),
            );

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;
        assert!(report.status.is_up());
        assert_eq!(report.checks["slow"].response_time, Some(2.0));
    }

    #[tokio::test]
    async fn test_duplicate_probe_name_replaced() {
        let service = HealthService::new()
            .with_probe("camera", broken())
            .with_probe("camera", healthy());
        assert_eq!(service.probe_names().collect::<Vec<_>>(), vec!["camera"]);

        let report = service
            .check_health("1.0.0", Environment::Test, Duration::ZERO)
            .await;
        assert!(report.status.is_up());
    }

    #[test]
    fn test_empty_report_is_up() {
        assert_eq!(overall_status(std::iter::empty()), HealthStatus::Up);
    }
}
