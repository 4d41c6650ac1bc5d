use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::CameraDevice;
use crate::error::{CameraError, Result};

pub const PTZ_SERVICE_MISSING: &str = "PTZ service not available";

/// What the camera can do right now. Never cached: firmware configuration
/// may change between calls.
///
/// A successful `GetConfigurations` marks every axis and home as supported;
/// the protocol calls used here don't discriminate per axis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PtzCapabilities {
    pub ptz_supported: bool,
    pub pan_supported: bool,
    pub tilt_supported: bool,
    pub zoom_supported: bool,
    pub home_position_supported: bool,
    pub error: Option<String>,
}

impl PtzCapabilities {
    fn unsupported(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn service_only(error: impl Into<String>) -> Self {
        Self {
            ptz_supported: true,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn full() -> Self {
        Self {
            ptz_supported: true,
            pan_supported: true,
            tilt_supported: true,
            zoom_supported: true,
            home_position_supported: true,
            error: None,
        }
    }
}

/// Up-front answer to "may motion commands be issued?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtzSupport {
    Supported,
    /// The camera has no PTZ service.
    Unsupported,
    /// The service exists but its configuration could not be confirmed.
    ProbeFailed(String),
}

impl PtzSupport {
    pub fn is_supported(&self) -> bool {
        matches!(self, PtzSupport::Supported)
    }

    /// Human-readable reason when motion is not possible.
    pub fn reason(&self) -> Option<String> {
        match self {
            PtzSupport::Supported => None,
            PtzSupport::Unsupported => Some(PTZ_SERVICE_MISSING.to_string()),
            PtzSupport::ProbeFailed(reason) => Some(reason.clone()),
        }
    }
}

/// Motion gate. Transport failures propagate so an unreachable camera is
/// reported as such instead of as "no PTZ"; everything else becomes data.
pub async fn probe_ptz_support(device: &dyn CameraDevice) -> Result<PtzSupport> {
    if !device.has_ptz_service().await? {
        return Ok(PtzSupport::Unsupported);
    }

    match device.ptz_configurations().await {
        Ok(configs) if configs.is_empty() => Ok(PtzSupport::ProbeFailed(
            "camera reported no PTZ configurations".to_string(),
        )),
        Ok(_) => Ok(PtzSupport::Supported),
        Err(e) if e.is_upstream() => Err(e),
        Err(CameraError::CapabilityAbsent) => Ok(PtzSupport::Unsupported),
        Err(e) => Ok(PtzSupport::ProbeFailed(format!(
            "Failed to get PTZ configurations: {}",
            e
        ))),
    }
}

/// Capability snapshot. Never fails: every problem lands in `error`.
///
/// When the PTZ service exists but `GetConfigurations` fails, the snapshot
/// still reports `ptz_supported = true` with the axes unconfirmed.
pub async fn detect_capabilities(device: &dyn CameraDevice) -> PtzCapabilities {
    match device.has_ptz_service().await {
        Ok(true) => {}
        Ok(false) => return PtzCapabilities::unsupported(PTZ_SERVICE_MISSING),
        Err(e) => {
            debug!(error = %e, "PTZ capability probe failed");
            return PtzCapabilities::unsupported(format!(
                "Error checking PTZ capabilities: {}",
                e
            ));
        }
    }

    match device.ptz_configurations().await {
        Ok(configs) if !configs.is_empty() => PtzCapabilities::full(),
        Ok(_) => PtzCapabilities::service_only("camera reported no PTZ configurations"),
        Err(e) => PtzCapabilities::service_only(format!("Failed to get PTZ configurations: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockCameraDevice};

    #[tokio::test]
    async fn test_full_support() {
        let device = MockCameraDevice::new();
        let caps = detect_capabilities(&device).await;
        assert_eq!(caps, PtzCapabilities::full());
        assert_eq!(probe_ptz_support(&device).await.unwrap(), PtzSupport::Supported);
    }

    #[tokio::test]
    async fn test_missing_ptz_service() {
        let device = MockCameraDevice::new().without_ptz();
        let caps = detect_capabilities(&device).await;
        assert!(!caps.ptz_supported);
        assert!(!caps.pan_supported);
        assert_eq!(caps.error.as_deref(), Some(PTZ_SERVICE_MISSING));

        let support = probe_ptz_support(&device).await.unwrap();
        assert_eq!(support, PtzSupport::Unsupported);
        assert_eq!(support.reason().as_deref(), Some(PTZ_SERVICE_MISSING));

        // the configuration call is never attempted without a service
        assert!(!device.calls().contains(&Call::PtzConfigurations));
    }

    #[tokio::test]
    async fn test_configuration_failure_keeps_service_flag() {
        let device = MockCameraDevice::new().fail_configurations("ter:ActionNotSupported");
        let caps = detect_capabilities(&device).await;
        assert!(caps.ptz_supported);
        assert!(!caps.pan_supported);
        assert!(!caps.home_position_supported);
        let error = caps.error.unwrap();
        assert!(error.starts_with("Failed to get PTZ configurations"));
        assert!(error.contains("ActionNotSupported"));

        assert!(matches!(
            probe_ptz_support(&device).await.unwrap(),
            PtzSupport::ProbeFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_camera() {
        let device = MockCameraDevice::new().offline();
        let caps = detect_capabilities(&device).await;
        assert!(!caps.ptz_supported);
        assert!(caps.error.unwrap().starts_with("Error checking PTZ capabilities"));

        let err = probe_ptz_support(&device).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_empty_configurations() {
        let device = MockCameraDevice::new().with_configurations(Vec::new());
        let caps = detect_capabilities(&device).await;
        assert!(caps.ptz_supported);
        assert!(!caps.zoom_supported);
        assert!(caps.error.is_some());
        assert!(!probe_ptz_support(&device).await.unwrap().is_supported());
    }

    #[tokio::test]
    async fn test_capabilities_are_detected_fresh_each_call() {
        use crate::service::{CameraControl, CameraService};
        use crate::velocity::Velocity;
        use crate::CameraEndpoint;
        use std::sync::Arc;
        use std::time::Duration;

        let device = Arc::new(MockCameraDevice::new());
        let service = CameraService::new(
            device.clone(),
            CameraEndpoint::new("10.0.0.5", 80, "user", "pass"),
        )
        .with_settle(Duration::from_millis(1));
        let velocity = Velocity::new(0.4).unwrap();

        assert!(service.get_ptz_capabilities().await.ptz_supported);
        assert!(service.move_pan(velocity).await.unwrap().performed());

        device.set_ptz_service(false);
        let caps = service.get_ptz_capabilities().await;
        assert!(!caps.ptz_supported);
        assert_eq!(caps.error.as_deref(), Some(PTZ_SERVICE_MISSING));
        assert!(!service.move_pan(velocity).await.unwrap().performed());

        device.set_ptz_service(true);
        assert_eq!(service.get_ptz_capabilities().await, PtzCapabilities::full());
        assert!(service.move_pan(velocity).await.unwrap().performed());

        assert_eq!(device.motion_calls().len(), 4);
    }
}
