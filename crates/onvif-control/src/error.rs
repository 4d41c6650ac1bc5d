use thiserror::Error;

use crate::velocity::VelocityError;

pub type Result<T> = std::result::Result<T, CameraError>;

#[derive(Debug, Error)]
pub enum CameraError {
    /// The camera could not be reached or returned nothing usable.
    #[error("camera unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The camera does not expose a PTZ service.
    #[error("PTZ service not available")]
    CapabilityAbsent,

    #[error("preset '{0}' not found")]
    PresetNotFound(String),

    #[error("preset '{0}' already exists")]
    PresetAlreadyExists(String),

    #[error(transparent)]
    InvalidVelocity(#[from] VelocityError),

    /// The camera answered with a SOAP fault.
    #[error("camera rejected {action}: {reason}")]
    Fault { action: String, reason: String },

    /// The camera answered, but the payload could not be understood.
    #[error("malformed camera response: {0}")]
    Protocol(String),
}

impl CameraError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Transport-level failures: the camera itself is unreachable.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

impl From<reqwest::Error> for CameraError {
    fn from(err: reqwest::Error) -> Self {
        CameraError::UpstreamUnavailable(err.to_string())
    }
}

impl From<quick_xml::Error> for CameraError {
    fn from(err: quick_xml::Error) -> Self {
        CameraError::Protocol(err.to_string())
    }
}
