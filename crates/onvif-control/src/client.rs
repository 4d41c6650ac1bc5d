use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::device::{CameraDevice, Preset};
use crate::endpoint::CameraEndpoint;
use crate::error::{CameraError, Result};
use crate::soap::{self, XmlElement};
use crate::velocity::PtzVector;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Service addresses advertised by the camera in `GetCapabilities`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAddresses {
    pub media: String,
    pub ptz: Option<String>,
}

/// ONVIF client speaking SOAP over HTTP.
///
/// Service addresses are discovered once, on the first call that needs them
/// (or an explicit [`OnvifClient::connect`]), and reused afterwards.
pub struct OnvifClient {
    endpoint: CameraEndpoint,
    http_client: reqwest::Client,
    services: OnceCell<ServiceAddresses>,
}

impl OnvifClient {
    pub fn new(endpoint: CameraEndpoint, request_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            endpoint,
            http_client,
            services: OnceCell::new(),
        })
    }

    pub fn endpoint(&self) -> &CameraEndpoint {
        &self.endpoint
    }

    /// Resolves the service addresses now instead of on first use.
    pub async fn connect(&self) -> Result<&ServiceAddresses> {
        self.services
            .get_or_try_init(|| self.discover_services())
            .await
    }

    async fn discover_services(&self) -> Result<ServiceAddresses> {
        let device_url = self.endpoint.device_service_url();
        let body = r#"<tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities>"#;
        let response = self.call(&device_url, "GetCapabilities", body).await?;
        let services = parse_capabilities(&response, &device_url);

        info!(
            host = %self.endpoint.host(),
            media = %services.media,
            ptz = ?services.ptz,
            "camera services discovered"
        );
        Ok(services)
    }

    async fn media_url(&self) -> Result<String> {
        Ok(self.connect().await?.media.clone())
    }

    async fn ptz_url(&self) -> Result<String> {
        self.connect()
            .await?
            .ptz
            .clone()
            .ok_or(CameraError::CapabilityAbsent)
    }

    async fn call(&self, url: &str, action: &str, body: &str) -> Result<XmlElement> {
        let header = soap::security_header(self.endpoint.username(), self.endpoint.password());
        let envelope = soap::envelope(&header, body);

        debug!(url = %url, action = %action, "sending ONVIF request");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(envelope)
            .send()
            .await
            .map_err(|e| CameraError::upstream(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CameraError::upstream(format!("{} response unreadable: {}", action, e)))?;

        if !status.is_success() {
            // cameras report most errors as a fault inside a 400/500 body
            return match soap::parse_response(action, &text) {
                Err(fault @ CameraError::Fault { .. }) => {
                    warn!(action = %action, status = %status, error = %fault, "ONVIF request faulted");
                    Err(fault)
                }
                _ => Err(CameraError::upstream(format!(
                    "{} failed with HTTP {}",
                    action, status
                ))),
            };
        }

        soap::parse_response(action, &text)
    }
}

#[async_trait]
impl CameraDevice for OnvifClient {
    async fn profile_tokens(&self) -> Result<Vec<String>> {
        let url = self.media_url().await?;
        let response = self
            .call(&url, "GetProfiles", "<trt:GetProfiles/>")
            .await?;
        Ok(parse_profile_tokens(&response))
    }

    async fn stream_uri(&self, profile_token: &str) -> Result<String> {
        let url = self.media_url().await?;
        let body = format!(
            r#"<trt:GetStreamUri>
      <trt:StreamSetup>
        <tt:Stream>RTP-Unicast</tt:Stream>
        <tt:Transport><tt:Protocol>RTSP</tt:Protocol></tt:Transport>
      </trt:StreamSetup>
      <trt:ProfileToken>{}</trt:ProfileToken>
    </trt:GetStreamUri>"#,
            soap::escape(profile_token)
        );
        let response = self.call(&url, "GetStreamUri", &body).await?;
        parse_media_uri(&response, "GetStreamUri")
    }

    async fn snapshot_uri(&self, profile_token: &str) -> Result<String> {
        let url = self.media_url().await?;
        let body = format!(
            "<trt:GetSnapshotUri><trt:ProfileToken>{}</trt:ProfileToken></trt:GetSnapshotUri>",
            soap::escape(profile_token)
        );
        let response = self.call(&url, "GetSnapshotUri", &body).await?;
        parse_media_uri(&response, "GetSnapshotUri")
    }

    async fn has_ptz_service(&self) -> Result<bool> {
        Ok(self.connect().await?.ptz.is_some())
    }

    async fn ptz_configurations(&self) -> Result<Vec<String>> {
        let url = self.ptz_url().await?;
        let response = self
            .call(&url, "GetConfigurations", "<tptz:GetConfigurations/>")
            .await?;
        Ok(response
            .find_all("PTZConfiguration")
            .into_iter()
            .filter_map(|c| c.attr("token"))
            .map(str::to_string)
            .collect())
    }

    async fn continuous_move(&self, profile_token: &str, velocity: PtzVector) -> Result<()> {
        let url = self.ptz_url().await?;
        let body = continuous_move_body(profile_token, velocity);
        self.call(&url, "ContinuousMove", &body).await?;
        Ok(())
    }

    async fn stop(&self, profile_token: &str) -> Result<()> {
        let url = self.ptz_url().await?;
        let body = format!(
            r#"<tptz:Stop>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:PanTilt>true</tptz:PanTilt>
      <tptz:Zoom>true</tptz:Zoom>
    </tptz:Stop>"#,
            soap::escape(profile_token)
        );
        self.call(&url, "Stop", &body).await?;
        Ok(())
    }

    async fn goto_home(&self, profile_token: &str) -> Result<()> {
        let url = self.ptz_url().await?;
        let body = format!(
            "<tptz:GotoHomePosition><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:GotoHomePosition>",
            soap::escape(profile_token)
        );
        self.call(&url, "GotoHomePosition", &body).await?;
        Ok(())
    }

    async fn presets(&self, profile_token: &str) -> Result<Vec<Preset>> {
        let url = self.ptz_url().await?;
        let body = format!(
            "<tptz:GetPresets><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:GetPresets>",
            soap::escape(profile_token)
        );
        let response = self.call(&url, "GetPresets", &body).await?;
        Ok(parse_presets(&response))
    }

    async fn set_preset(&self, profile_token: &str, name: &str) -> Result<String> {
        let url = self.ptz_url().await?;
        let body = format!(
            r#"<tptz:SetPreset>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:PresetName>{}</tptz:PresetName>
    </tptz:SetPreset>"#,
            soap::escape(profile_token),
            soap::escape(name)
        );
        let response = self.call(&url, "SetPreset", &body).await?;
        response
            .find("PresetToken")
            .map(|t| t.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CameraError::protocol("SetPreset response carries no PresetToken"))
    }

    async fn remove_preset(&self, profile_token: &str, preset_token: &str) -> Result<()> {
        let url = self.ptz_url().await?;
        let body = format!(
            r#"<tptz:RemovePreset>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:PresetToken>{}</tptz:PresetToken>
    </tptz:RemovePreset>"#,
            soap::escape(profile_token),
            soap::escape(preset_token)
        );
        self.call(&url, "RemovePreset", &body).await?;
        Ok(())
    }

    async fn goto_preset(&self, profile_token: &str, preset_token: &str) -> Result<()> {
        let url = self.ptz_url().await?;
        let body = format!(
            r#"<tptz:GotoPreset>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:PresetToken>{}</tptz:PresetToken>
    </tptz:GotoPreset>"#,
            soap::escape(profile_token),
            soap::escape(preset_token)
        );
        self.call(&url, "GotoPreset", &body).await?;
        Ok(())
    }
}

fn parse_capabilities(response: &XmlElement, device_url: &str) -> ServiceAddresses {
    let capabilities = response.find("Capabilities").unwrap_or(response);
    let xaddr = |section: &str| {
        capabilities
            .find(section)
            .and_then(|s| s.child_text("XAddr"))
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
    };

    ServiceAddresses {
        // single-endpoint cameras often omit Media and serve it from the device URL
        media: xaddr("Media").unwrap_or_else(|| device_url.to_string()),
        ptz: xaddr("PTZ"),
    }
}

fn parse_profile_tokens(response: &XmlElement) -> Vec<String> {
    response
        .find_all("Profiles")
        .into_iter()
        .filter_map(|p| p.attr("token"))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_media_uri(response: &XmlElement, action: &str) -> Result<String> {
    response
        .find("MediaUri")
        .and_then(|m| m.child("Uri"))
        .or_else(|| response.find("Uri"))
        .map(|u| u.text.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| CameraError::protocol(format!("{} response carries no Uri", action)))
}

fn parse_presets(response: &XmlElement) -> Vec<Preset> {
    response
        .find_all("Preset")
        .into_iter()
        .filter_map(|p| {
            let token = p.attr("token")?.to_string();
            let name = p.child_text("Name").unwrap_or_default().trim().to_string();
            Some(Preset { name, token })
        })
        .collect()
}

fn continuous_move_body(profile_token: &str, velocity: PtzVector) -> String {
    let pan = velocity.pan.value();
    let tilt = velocity.tilt.value();
    let zoom = velocity.zoom.value();

    // cameras without a zoom lens reject a Zoom element, and vice versa
    let mut vector = String::new();
    if pan != 0.0 || tilt != 0.0 || zoom == 0.0 {
        vector.push_str(&format!(r#"<tt:PanTilt x="{}" y="{}"/>"#, pan, tilt));
    }
    if zoom != 0.0 {
        vector.push_str(&format!(r#"<tt:Zoom x="{}"/>"#, zoom));
    }

    format!(
        r#"<tptz:ContinuousMove>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:Velocity>{}</tptz:Velocity>
    </tptz:ContinuousMove>"#,
        soap::escape(profile_token),
        vector
    )
}
