use anyhow::{Context, Result};
use common::{HealthReport, HealthService};
use onvif_control::{CameraControl, CameraService, OnvifClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;
use crate::probes::CameraProbe;

/// Long-lived services shared by every request. Built once at start-up and
/// never mutated afterwards.
pub struct SharedServices {
    pub camera: Arc<dyn CameraControl>,
    pub health: HealthService,
    pub metrics: GatewayMetrics,
}

impl SharedServices {
    /// Wires the ONVIF client, camera control and health probes from config.
    /// No network traffic happens here; the camera is contacted lazily.
    pub fn initialize(config: &GatewayConfig) -> Result<Self> {
        let client = OnvifClient::new(config.camera.clone(), config.request_timeout)
            .context("failed to build ONVIF client")?;

        let camera: Arc<dyn CameraControl> = Arc::new(
            CameraService::new(Arc::new(client), config.camera.clone())
                .with_defaults(config.default_velocities)
                .with_settle(config.settle),
        );

        let services = Self::with_camera(camera, config.health_timeout)?;
        info!(
            camera = %config.camera.host(),
            port = config.camera.port(),
            settle_ms = config.settle.as_millis() as u64,
            "shared services initialized"
        );
        Ok(services)
    }

    /// Container around an already-built camera.
    pub fn with_camera(
        camera: Arc<dyn CameraControl>,
        health_timeout: Option<Duration>,
    ) -> Result<Self> {
        let health = HealthService::new()
            .with_timeout(health_timeout)
            .with_probe("camera", Arc::new(CameraProbe::new(Arc::clone(&camera))));

        let metrics = GatewayMetrics::new().context("failed to register metrics")?;

        Ok(Self {
            camera,
            health,
            metrics,
        })
    }

    pub async fn check_health(
        &self,
        config: &GatewayConfig,
        uptime: Duration,
    ) -> HealthReport {
        let report = self
            .health
            .check_health(&config.version, config.environment, uptime)
            .await;
        self.metrics.record_health(&report);
        report
    }

    /// Releases camera resources. Safe to call more than once.
    pub async fn cleanup(&self) {
        // the HTTP connection pool closes when the last handle drops
        info!("shared services cleaned up");
    }
}
