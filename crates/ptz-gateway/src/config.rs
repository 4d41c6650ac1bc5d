use anyhow::{bail, Context, Result};
use common::Environment;
use onvif_control::{CameraEndpoint, DefaultVelocities, Velocity, DEFAULT_REQUEST_TIMEOUT};
use regex::Regex;
use std::{env, net::SocketAddr, str::FromStr, time::Duration};

/// Gateway settings, read once at start-up.
///
/// `Debug` is safe to log: the camera password is redacted by
/// [`CameraEndpoint`].
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub app_name: String,
    pub version: String,
    pub environment: Environment,
    pub cors_origins: Vec<String>,
    /// Empty accepts any `Host` header.
    pub allowed_hosts: Vec<String>,
    pub camera: CameraEndpoint,
    pub request_timeout: Duration,
    pub settle: Duration,
    pub default_velocities: DefaultVelocities,
    /// `None` lets probes run unbounded.
    pub health_timeout: Option<Duration>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't need to touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("GATEWAY_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_addr: SocketAddr = bind.parse().context("invalid GATEWAY_ADDR")?;

        let app_name = lookup("APP_NAME").unwrap_or_else(|| "onvif-ptz-stream-api".to_string());

        let version = lookup("VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        validate_version(&version)?;

        let environment = match lookup("ENVIRONMENT") {
            Some(value) => value.parse::<Environment>().context("invalid ENVIRONMENT")?,
            None => Environment::Development,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| vec!["*".to_string()]);

        let allowed_hosts = lookup("ALLOWED_HOSTS")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let host = lookup("ONVIF_CAMERA_IP_ADDRESS")
            .filter(|h| !h.trim().is_empty())
            .context("ONVIF_CAMERA_IP_ADDRESS environment variable required")?;
        let port: u16 = parse_or(&lookup, "ONVIF_CAMERA_PORT", 80)?;
        let username = lookup("ONVIF_CAMERA_USER").unwrap_or_else(|| "admin".to_string());
        let password = lookup("ONVIF_CAMERA_PASSWORD")
            .context("ONVIF_CAMERA_PASSWORD environment variable required")?;

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            "ONVIF_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        if request_timeout_secs == 0 {
            bail!("ONVIF_REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let settle_ms: u64 = parse_or(&lookup, "PTZ_SETTLE_MS", 500)?;

        let default_velocities = DefaultVelocities {
            pan: velocity_or(&lookup, "PTZ_DEFAULT_PAN_VELOCITY")?,
            tilt: velocity_or(&lookup, "PTZ_DEFAULT_TILT_VELOCITY")?,
            zoom: velocity_or(&lookup, "PTZ_DEFAULT_ZOOM_VELOCITY")?,
        };

        let health_timeout = match lookup("HEALTH_CHECK_TIMEOUT_SECS") {
            Some(value) if value.trim().eq_ignore_ascii_case("none") => None,
            Some(value) => {
                let secs: f64 = value
                    .trim()
                    .parse()
                    .context("invalid HEALTH_CHECK_TIMEOUT_SECS")?;
                let limit = Duration::try_from_secs_f64(secs)
                    .context("HEALTH_CHECK_TIMEOUT_SECS must be a non-negative number")?;
                // zero disables the limit, like "none"
                Some(limit).filter(|limit| !limit.is_zero())
            }
            None => Some(common::DEFAULT_PROBE_TIMEOUT),
        };

        Ok(Self {
            bind_addr,
            app_name,
            version,
            environment,
            cors_origins,
            allowed_hosts,
            camera: CameraEndpoint::new(host, port, username, password),
            request_timeout: Duration::from_secs(request_timeout_secs),
            settle: Duration::from_millis(settle_ms),
            default_velocities,
            health_timeout,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {}", key)),
        None => Ok(default),
    }
}

fn velocity_or<F>(lookup: &F, key: &str) -> Result<Velocity>
where
    F: Fn(&str) -> Option<String>,
{
    let raw: f32 = parse_or(lookup, key, 0.5)?;
    Velocity::new(raw).with_context(|| format!("invalid {}", key))
}

fn validate_version(version: &str) -> Result<()> {
    let semver = Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .context("invalid version pattern")?;
    if !semver.is_match(version) {
        bail!("VERSION must be a semantic version, got {:?}", version);
    }
    Ok(())
}
