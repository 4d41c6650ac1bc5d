use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use common::{HealthReport, HealthStatus};
use onvif_control::MotionOutcome;

/// Gateway metrics on a registry owned by this struct.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    ptz_commands: IntCounterVec,
    health_checks: IntCounterVec,
    probe_duration: HistogramVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ptz_commands = IntCounterVec::new(
            Opts::new("ptz_commands_total", "PTZ commands handled, by outcome"),
            &["command", "outcome"],
        )?;
        let health_checks = IntCounterVec::new(
            Opts::new("health_checks_total", "Health reports served, by overall status"),
            &["status"],
        )?;
        let probe_duration = HistogramVec::new(
            HistogramOpts::new(
                "health_probe_duration_seconds",
                "Response time reported by each health probe",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["probe"],
        )?;

        registry.register(Box::new(ptz_commands.clone()))?;
        registry.register(Box::new(health_checks.clone()))?;
        registry.register(Box::new(probe_duration.clone()))?;

        Ok(Self {
            registry,
            ptz_commands,
            health_checks,
            probe_duration,
        })
    }

    pub fn record_motion(&self, command: &str, outcome: &MotionOutcome) {
        let label = if outcome.performed() {
            "performed"
        } else {
            "skipped"
        };
        self.ptz_commands.with_label_values(&[command, label]).inc();
    }

    pub fn record_command(&self, command: &str, succeeded: bool) {
        let label = if succeeded { "performed" } else { "error" };
        self.ptz_commands.with_label_values(&[command, label]).inc();
    }

    pub fn record_health(&self, report: &HealthReport) {
        self.health_checks
            .with_label_values(&[report.status.as_str()])
            .inc();
        for (probe, record) in &report.checks {
            if let Some(secs) = record.response_time {
                self.probe_duration.with_label_values(&[probe.as_str()]).observe(secs);
            }
        }
    }

    pub fn commands(&self, command: &str, outcome: &str) -> u64 {
        self.ptz_commands
            .with_label_values(&[command, outcome])
            .get()
    }

    pub fn health_checks(&self, status: HealthStatus) -> u64 {
        self.health_checks.with_label_values(&[status.as_str()]).get()
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mfs = self.registry.gather();
        encoder.encode(&mfs, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ComponentHealth, Environment};
    use std::collections::BTreeMap;

    #[test]
    fn test_motion_counters() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_motion("move_pan", &MotionOutcome::Performed);
        metrics.record_motion(
            "move_pan",
            &MotionOutcome::Skipped {
                reason: "PTZ service not available".into(),
            },
        );
        metrics.record_command("set_preset", false);

        assert_eq!(metrics.commands("move_pan", "performed"), 1);
        assert_eq!(metrics.commands("move_pan", "skipped"), 1);
        assert_eq!(metrics.commands("set_preset", "error"), 1);
    }

    #[test]
    fn test_render_includes_health() {
        let metrics = GatewayMetrics::new().unwrap();
        let mut checks = BTreeMap::new();
        checks.insert("camera".to_string(), ComponentHealth::up(0.12));
        metrics.record_health(&HealthReport {
            status: HealthStatus::Up,
            uptime: 1.0,
            checks,
            version: "1.0.0".into(),
            environment: Environment::Test,
        });

        assert_eq!(metrics.health_checks(HealthStatus::Up), 1);
        let text = metrics.render();
        assert!(text.contains("health_checks_total{status=\"UP\"} 1"));
        assert!(text.contains("health_probe_duration_seconds_count{probe=\"camera\"} 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = GatewayMetrics::new().unwrap();
        let b = GatewayMetrics::new().unwrap();
        a.record_command("stop", true);
        assert_eq!(b.commands("stop", "performed"), 0);
    }
}
