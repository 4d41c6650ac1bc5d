use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};
use url::Url;

use crate::capabilities::{detect_capabilities, probe_ptz_support, PtzCapabilities, PtzSupport};
use crate::device::{CameraDevice, Preset};
use crate::endpoint::CameraEndpoint;
use crate::error::{CameraError, Result};
use crate::velocity::{DefaultVelocities, Direction, PtzAxis, PtzVector, Velocity};

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Result of a motion-type command.
///
/// Cameras without PTZ get `Skipped` instead of an error so generic control
/// panels keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MotionOutcome {
    Performed,
    Skipped { reason: String },
}

impl MotionOutcome {
    pub fn performed(&self) -> bool {
        matches!(self, MotionOutcome::Performed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            MotionOutcome::Performed => None,
            MotionOutcome::Skipped { reason } => Some(reason),
        }
    }
}

/// Everything the HTTP layer may ask of the camera.
#[async_trait]
pub trait CameraControl: Send + Sync {
    async fn profile_tokens(&self) -> Result<Vec<String>>;

    /// Streaming URI with `user:password@` embedded in the authority.
    async fn resolve_stream_uri(&self) -> Result<String>;

    async fn resolve_snapshot_uri(&self) -> Result<String>;

    async fn get_ptz_capabilities(&self) -> PtzCapabilities;

    async fn move_pan(&self, velocity: Velocity) -> Result<MotionOutcome>;

    async fn move_tilt(&self, velocity: Velocity) -> Result<MotionOutcome>;

    async fn move_zoom(&self, velocity: Velocity) -> Result<MotionOutcome>;

    /// Pulse in a named direction; `None` uses the configured default speed.
    async fn move_direction(
        &self,
        direction: Direction,
        velocity: Option<Velocity>,
    ) -> Result<MotionOutcome>;

    async fn stop(&self) -> Result<MotionOutcome>;

    async fn goto_home_position(&self) -> Result<MotionOutcome>;

    async fn set_preset(&self, name: &str) -> Result<Preset>;

    async fn delete_preset(&self, name: &str) -> Result<()>;

    async fn goto_preset(&self, name: &str) -> Result<()>;

    async fn list_presets(&self) -> Result<Vec<String>>;

    async fn move_left(&self, velocity: Option<Velocity>) -> Result<MotionOutcome> {
        self.move_direction(Direction::Left, velocity).await
    }

    async fn move_right(&self, velocity: Option<Velocity>) -> Result<MotionOutcome> {
        self.move_direction(Direction::Right, velocity).await
    }

    async fn move_up(&self, velocity: Option<Velocity>) -> Result<MotionOutcome> {
        self.move_direction(Direction::Up, velocity).await
    }

    async fn move_down(&self, velocity: Option<Velocity>) -> Result<MotionOutcome> {
        self.move_direction(Direction::Down, velocity).await
    }

    async fn zoom_in(&self, velocity: Option<Velocity>) -> Result<MotionOutcome> {
        self.move_direction(Direction::ZoomIn, velocity).await
    }

    async fn zoom_out(&self, velocity: Option<Velocity>) -> Result<MotionOutcome> {
        self.move_direction(Direction::ZoomOut, velocity).await
    }
}

/// Camera control over any [`CameraDevice`].
///
/// The main profile (first reported) is resolved once and reused by every
/// PTZ and URI call. Motion pulses are queued: the motion lock is held from
/// the start command through the stop command, so concurrent callers each
/// get their full pulse in turn.
pub struct CameraService {
    device: Arc<dyn CameraDevice>,
    endpoint: CameraEndpoint,
    defaults: DefaultVelocities,
    settle: Duration,
    profile_token: OnceCell<String>,
    motion_lock: Arc<Mutex<()>>,
}

impl CameraService {
    pub fn new(device: Arc<dyn CameraDevice>, endpoint: CameraEndpoint) -> Self {
        Self {
            device,
            endpoint,
            defaults: DefaultVelocities::default(),
            settle: DEFAULT_SETTLE,
            profile_token: OnceCell::new(),
            motion_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_defaults(mut self, defaults: DefaultVelocities) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn defaults(&self) -> DefaultVelocities {
        self.defaults
    }

    /// Main profile token, fetched on first use.
    pub async fn main_profile_token(&self) -> Result<&str> {
        let token = self
            .profile_token
            .get_or_try_init(|| async {
                let tokens = self.device.profile_tokens().await?;
                let token = tokens
                    .into_iter()
                    .next()
                    .ok_or_else(|| CameraError::upstream("camera reported no media profiles"))?;
                info!(profile_token = %token, "resolved main media profile");
                Ok::<_, CameraError>(token)
            })
            .await?;
        Ok(token.as_str())
    }

    /// Checks PTZ support, turning a missing capability into a skip.
    async fn motion_gate(&self, command: &str) -> Result<Option<MotionOutcome>> {
        let support = probe_ptz_support(self.device.as_ref()).await?;
        match support {
            PtzSupport::Supported => Ok(None),
            other => {
                let reason = other.reason().unwrap_or_default();
                warn!(
                    command = %command,
                    reason = %reason,
                    "camera does not support PTZ operations or PTZ configuration is missing"
                );
                Ok(Some(MotionOutcome::Skipped { reason }))
            }
        }
    }

    async fn pulse(&self, axis: PtzAxis, velocity: Velocity) -> Result<MotionOutcome> {
        if let Some(skipped) = self.motion_gate(&format!("move_{}", axis)).await? {
            return Ok(skipped);
        }

        let profile = self.main_profile_token().await?.to_string();
        let guard = Arc::clone(&self.motion_lock).lock_owned().await;
        let device = Arc::clone(&self.device);
        let settle = self.settle;

        // detached from the caller: a dropped request still gets its stop
        let pulse = tokio::spawn(async move {
            let _guard = guard;
            debug!(axis = %axis, velocity = %velocity, "starting continuous move");
            device
                .continuous_move(&profile, PtzVector::single_axis(axis, velocity))
                .await?;
            tokio::time::sleep(settle).await;
            device.stop(&profile).await
        });
        pulse
            .await
            .map_err(|e| CameraError::upstream(format!("PTZ pulse task failed: {}", e)))??;

        info!(axis = %axis, velocity = %velocity, settle_ms = self.settle.as_millis() as u64, "PTZ pulse complete");
        Ok(MotionOutcome::Performed)
    }

    async fn find_preset(&self, profile: &str, name: &str) -> Result<Option<Preset>> {
        let presets = self.device.presets(profile).await?;
        Ok(presets.into_iter().find(|p| p.name == name))
    }
}

#[async_trait]
impl CameraControl for CameraService {
    async fn profile_tokens(&self) -> Result<Vec<String>> {
        self.device.profile_tokens().await
    }

    async fn resolve_stream_uri(&self) -> Result<String> {
        let profile = self.main_profile_token().await?;
        let uri = self.device.stream_uri(profile).await?;
        embed_credentials(&uri, self.endpoint.username(), self.endpoint.password())
    }

    async fn resolve_snapshot_uri(&self) -> Result<String> {
        let profile = self.main_profile_token().await?;
        self.device.snapshot_uri(profile).await
    }

    async fn get_ptz_capabilities(&self) -> PtzCapabilities {
        detect_capabilities(self.device.as_ref()).await
    }

    async fn move_pan(&self, velocity: Velocity) -> Result<MotionOutcome> {
        self.pulse(PtzAxis::Pan, velocity).await
    }

    async fn move_tilt(&self, velocity: Velocity) -> Result<MotionOutcome> {
        self.pulse(PtzAxis::Tilt, velocity).await
    }

    async fn move_zoom(&self, velocity: Velocity) -> Result<MotionOutcome> {
        self.pulse(PtzAxis::Zoom, velocity).await
    }

    async fn move_direction(
        &self,
        direction: Direction,
        velocity: Option<Velocity>,
    ) -> Result<MotionOutcome> {
        let axis = direction.axis();
        let speed = velocity.unwrap_or_else(|| self.defaults.for_axis(axis));
        self.pulse(axis, direction.apply(speed)).await
    }

    async fn stop(&self) -> Result<MotionOutcome> {
        if let Some(skipped) = self.motion_gate("stop").await? {
            return Ok(skipped);
        }
        let profile = self.main_profile_token().await?;
        // not behind the motion lock: a stop must be able to cut into a pulse
        self.device.stop(profile).await?;
        info!("PTZ stopped");
        Ok(MotionOutcome::Performed)
    }

    async fn goto_home_position(&self) -> Result<MotionOutcome> {
        if let Some(skipped) = self.motion_gate("goto_home_position").await? {
            return Ok(skipped);
        }
        let profile = self.main_profile_token().await?;
        let _guard = self.motion_lock.lock().await;
        self.device.goto_home(profile).await?;
        info!("PTZ moving to home position");
        Ok(MotionOutcome::Performed)
    }

    async fn set_preset(&self, name: &str) -> Result<Preset> {
        let profile = self.main_profile_token().await?;
        if self.find_preset(profile, name).await?.is_some() {
            return Err(CameraError::PresetAlreadyExists(name.to_string()));
        }

        let token = self.device.set_preset(profile, name).await?;
        info!(preset = %name, token = %token, "preset created");
        Ok(Preset {
            name: name.to_string(),
            token,
        })
    }

    async fn delete_preset(&self, name: &str) -> Result<()> {
        let profile = self.main_profile_token().await?;
        let preset = self
            .find_preset(profile, name)
            .await?
            .ok_or_else(|| CameraError::PresetNotFound(name.to_string()))?;

        self.device.remove_preset(profile, &preset.token).await?;
        info!(preset = %name, token = %preset.token, "preset removed");
        Ok(())
    }

    async fn goto_preset(&self, name: &str) -> Result<()> {
        let profile = self.main_profile_token().await?;
        let preset = self
            .find_preset(profile, name)
            .await?
            .ok_or_else(|| CameraError::PresetNotFound(name.to_string()))?;

        let _guard = self.motion_lock.lock().await;
        self.device.goto_preset(profile, &preset.token).await?;
        info!(preset = %name, "moving to preset");
        Ok(())
    }

    async fn list_presets(&self) -> Result<Vec<String>> {
        let profile = self.main_profile_token().await?;
        let presets = self.device.presets(profile).await?;
        Ok(presets.into_iter().map(|p| p.name).collect())
    }
}

/// Rewrites `uri` so its authority reads `username:password@host[:port]`.
/// Scheme, path, query and fragment are left as they are; credentials the
/// camera already embedded are replaced.
pub fn embed_credentials(uri: &str, username: &str, password: &str) -> Result<String> {
    let mut url = Url::parse(uri)
        .map_err(|e| CameraError::protocol(format!("camera returned invalid URI: {}", e)))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(CameraError::protocol("camera returned a URI without a host"));
    }

    url.set_username(username)
        .and_then(|_| url.set_password(Some(password)))
        .map_err(|_| CameraError::protocol("camera URI cannot carry credentials"))?;

    Ok(url.to_string())
}
