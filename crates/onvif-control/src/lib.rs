//! ONVIF camera control: SOAP transport, capability detection and the
//! PTZ/stream operations exposed to the gateway.

pub mod capabilities;
pub mod client;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod mock;
pub mod service;
pub mod soap;
pub mod velocity;

pub use capabilities::{detect_capabilities, probe_ptz_support, PtzCapabilities, PtzSupport};
pub use client::{OnvifClient, DEFAULT_REQUEST_TIMEOUT};
pub use device::{CameraDevice, Preset};
pub use endpoint::CameraEndpoint;
pub use error::{CameraError, Result};
pub use mock::MockCameraDevice;
pub use service::{embed_credentials, CameraControl, CameraService, MotionOutcome};
pub use velocity::{DefaultVelocities, Direction, PtzAxis, PtzVector, Velocity, VelocityError};
