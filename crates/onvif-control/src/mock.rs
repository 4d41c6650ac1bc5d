use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::device::{CameraDevice, Preset};
use crate::error::{CameraError, Result};
use crate::velocity::PtzVector;

/// Every request the mock received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ProfileTokens,
    StreamUri(String),
    SnapshotUri(String),
    HasPtzService,
    PtzConfigurations,
    ContinuousMove(String, PtzVector),
    Stop(String),
    GotoHome(String),
    Presets(String),
    SetPreset(String, String),
    RemovePreset(String),
    GotoPreset(String),
}

impl Call {
    /// Calls that physically move the camera.
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Call::ContinuousMove(..) | Call::Stop(_) | Call::GotoHome(_) | Call::GotoPreset(_)
        )
    }
}

struct MockState {
    online: bool,
    profiles: Vec<String>,
    stream_uri: String,
    snapshot_uri: String,
    ptz_service: bool,
    configurations: std::result::Result<Vec<String>, String>,
    presets: Vec<Preset>,
    next_preset: u32,
    calls: Vec<Call>,
}

/// In-memory camera for tests and local runs without hardware.
pub struct MockCameraDevice {
    state: Mutex<MockState>,
}

impl MockCameraDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                online: true,
                profiles: vec!["Profile_1".to_string(), "Profile_2".to_string()],
                stream_uri: "rtsp://10.0.0.5:554/stream1".to_string(),
                snapshot_uri: "http://10.0.0.5/onvif-http/snapshot?Profile_1".to_string(),
                ptz_service: true,
                configurations: Ok(vec!["PTZConfig_1".to_string()]),
                presets: Vec::new(),
                next_preset: 1,
                calls: Vec::new(),
            }),
        }
    }

    pub fn without_ptz(self) -> Self {
        self.state().ptz_service = false;
        self
    }

    pub fn offline(self) -> Self {
        self.state().online = false;
        self
    }

    pub fn with_profiles(self, profiles: Vec<String>) -> Self {
        self.state().profiles = profiles;
        self
    }

    pub fn with_stream_uri(self, uri: impl Into<String>) -> Self {
        self.state().stream_uri = uri.into();
        self
    }

    pub fn with_snapshot_uri(self, uri: impl Into<String>) -> Self {
        self.state().snapshot_uri = uri.into();
        self
    }

    pub fn with_configurations(self, tokens: Vec<String>) -> Self {
        self.state().configurations = Ok(tokens);
        self
    }

    pub fn fail_configurations(self, reason: impl Into<String>) -> Self {
        self.state().configurations = Err(reason.into());
        self
    }

    pub fn with_presets(self, presets: Vec<Preset>) -> Self {
        self.state().presets = presets;
        self
    }

    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    pub fn set_ptz_service(&self, available: bool) {
        self.state().ptz_service = available;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn motion_calls(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_motion())
            .cloned()
            .collect()
    }

    pub fn stored_presets(&self) -> Vec<Preset> {
        self.state().presets.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not take the other assertions with it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call and fails it when the camera is unreachable.
    fn record(&self, call: Call) -> Result<MutexGuard<'_, MockState>> {
        debug!(?call, "mock camera call");
        let mut state = self.state();
        state.calls.push(call);
        if !state.online {
            return Err(CameraError::upstream("connection refused"));
        }
        Ok(state)
    }

    fn record_ptz(&self, call: Call) -> Result<MutexGuard<'_, MockState>> {
        let state = self.record(call)?;
        if !state.ptz_service {
            return Err(CameraError::CapabilityAbsent);
        }
        Ok(state)
    }
}

impl Default for MockCameraDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for MockCameraDevice {
    async fn profile_tokens(&self) -> Result<Vec<String>> {
        let state = self.record(Call::ProfileTokens)?;
        Ok(state.profiles.clone())
    }

    async fn stream_uri(&self, profile_token: &str) -> Result<String> {
        let state = self.record(Call::StreamUri(profile_token.to_string()))?;
        Ok(state.stream_uri.clone())
    }

    async fn snapshot_uri(&self, profile_token: &str) -> Result<String> {
        let state = self.record(Call::SnapshotUri(profile_token.to_string()))?;
        Ok(state.snapshot_uri.clone())
    }

    async fn has_ptz_service(&self) -> Result<bool> {
        let state = self.record(Call::HasPtzService)?;
        Ok(state.ptz_service)
    }

    async fn ptz_configurations(&self) -> Result<Vec<String>> {
        let state = self.record_ptz(Call::PtzConfigurations)?;
        state.configurations.clone().map_err(|reason| CameraError::Fault {
            action: "GetConfigurations".to_string(),
            reason,
        })
    }

    async fn continuous_move(&self, profile_token: &str, velocity: PtzVector) -> Result<()> {
        self.record_ptz(Call::ContinuousMove(profile_token.to_string(), velocity))?;
        Ok(())
    }

    async fn stop(&self, profile_token: &str) -> Result<()> {
        self.record_ptz(Call::Stop(profile_token.to_string()))?;
        Ok(())
    }

    async fn goto_home(&self, profile_token: &str) -> Result<()> {
        self.record_ptz(Call::GotoHome(profile_token.to_string()))?;
        Ok(())
    }

    async fn presets(&self, profile_token: &str) -> Result<Vec<Preset>> {
        let state = self.record_ptz(Call::Presets(profile_token.to_string()))?;
        Ok(state.presets.clone())
    }

    async fn set_preset(&self, profile_token: &str, name: &str) -> Result<String> {
        let mut state =
            self.record_ptz(Call::SetPreset(profile_token.to_string(), name.to_string()))?;
        let token = format!("Preset_{}", state.next_preset);
        state.next_preset += 1;
        state.presets.push(Preset {
            name: name.to_string(),
            token: token.clone(),
        });
        Ok(token)
    }

    async fn remove_preset(&self, _profile_token: &str, preset_token: &str) -> Result<()> {
        let mut state = self.record_ptz(Call::RemovePreset(preset_token.to_string()))?;
        let before = state.presets.len();
        state.presets.retain(|p| p.token != preset_token);
        if state.presets.len() == before {
            return Err(CameraError::Fault {
                action: "RemovePreset".to_string(),
                reason: format!("no preset with token {}", preset_token),
            });
        }
        Ok(())
    }

    async fn goto_preset(&self, _profile_token: &str, preset_token: &str) -> Result<()> {
        let state = self.record_ptz(Call::GotoPreset(preset_token.to_string()))?;
        if !state.presets.iter().any(|p| p.token == preset_token) {
            return Err(CameraError::Fault {
                action: "GotoPreset".to_string(),
                reason: format!("no preset with token {}", preset_token),
            });
        }
        Ok(())
    }
}
