use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::velocity::PtzVector;

/// Camera-stored PTZ position. The name is the caller-facing key, the token
/// is whatever the camera assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub token: String,
}

/// Raw protocol operations against one camera.
///
/// Implementations translate each call into exactly one device request and
/// do no policy of their own: capability gating, preset lookups and motion
/// pulses live in [`crate::CameraService`].
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Media profile tokens in the order the camera reports them.
    async fn profile_tokens(&self) -> Result<Vec<String>>;

    async fn stream_uri(&self, profile_token: &str) -> Result<String>;

    async fn snapshot_uri(&self, profile_token: &str) -> Result<String>;

    /// Whether the camera advertises a PTZ service at all.
    ///
    /// `Ok(false)` is the structured "no PTZ" answer; `Err` means the camera
    /// could not be asked.
    async fn has_ptz_service(&self) -> Result<bool>;

    /// Tokens of the PTZ configurations the camera exposes.
    async fn ptz_configurations(&self) -> Result<Vec<String>>;

    async fn continuous_move(&self, profile_token: &str, velocity: PtzVector) -> Result<()>;

    /// Stops pan/tilt and zoom.
    async fn stop(&self, profile_token: &str) -> Result<()>;

    async fn goto_home(&self, profile_token: &str) -> Result<()>;

    async fn presets(&self, profile_token: &str) -> Result<Vec<Preset>>;

    /// Stores the current position under `name`, returning the new token.
    async fn set_preset(&self, profile_token: &str, name: &str) -> Result<String>;

    async fn remove_preset(&self, profile_token: &str, preset_token: &str) -> Result<()>;

    async fn goto_preset(&self, profile_token: &str, preset_token: &str) -> Result<()>;
}
