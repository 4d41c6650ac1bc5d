use async_trait::async_trait;
use common::{ComponentHealth, HealthProbe};
use onvif_control::CameraControl;
use std::sync::Arc;
use std::time::Instant;

/// Camera reachability: lists the media profiles over ONVIF.
pub struct CameraProbe {
    camera: Arc<dyn CameraControl>,
}

impl CameraProbe {
    pub fn new(camera: Arc<dyn CameraControl>) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl HealthProbe for CameraProbe {
    async fn check(&self) -> anyhow::Result<ComponentHealth> {
        let started = Instant::now();
        let profiles = self.camera.profile_tokens().await?;
        let elapsed = started.elapsed().as_secs_f64();

        Ok(ComponentHealth::up(elapsed).with_detail("profiles", profiles.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::HealthStatus;
    use onvif_control::{CameraEndpoint, CameraService, MockCameraDevice};

    fn probe(device: MockCameraDevice) -> CameraProbe {
        let endpoint = CameraEndpoint::new("10.0.0.5", 80, "admin", "pw");
        CameraProbe::new(Arc::new(CameraService::new(Arc::new(device), endpoint)))
    }

    #[tokio::test]
    async fn test_reachable_camera_is_up() {
        let record = probe(MockCameraDevice::new()).check().await.unwrap();
        assert_eq!(record.status, HealthStatus::Up);
        assert_eq!(record.details.unwrap()["profiles"], 2);
        assert!(record.response_time.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_camera_errors() {
        let err = probe(MockCameraDevice::new().offline())
            .check()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
