use crate::error::ApiError;
use crate::host::{trusted_host_middleware, TrustedHosts};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use onvif_control::{
    CameraError, Direction, MotionOutcome, PtzAxis, PtzCapabilities, Velocity,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let allowed_hosts = state.config.allowed_hosts.clone();

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/v1/ptz/capabilities", get(ptz_capabilities))
        .route("/api/v1/ptz/move/:target", post(ptz_move))
        .route("/api/v1/ptz/stop", post(ptz_stop))
        .route("/api/v1/ptz/home", post(ptz_home))
        .route("/api/v1/ptz/presets", get(list_presets).post(create_preset))
        .route("/api/v1/ptz/presets/:name", delete(delete_preset))
        .route("/api/v1/ptz/presets/:name/goto", post(goto_preset))
        .route("/api/v1/stream/uri", get(stream_uri))
        .route("/api/v1/stream/snapshot-uri", get(snapshot_uri))
        .with_state(state);

    if !allowed_hosts.is_empty() {
        app = app.layer(axum::middleware::from_fn_with_state(
            TrustedHosts::new(&allowed_hosts),
            trusted_host_middleware,
        ));
    }

    app.layer(axum::middleware::from_fn(telemetry::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

// ============================================================================
// Request / response shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct VelocityParams {
    pub velocity: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePresetRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MotionResponse {
    pub status: String,
    pub performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<MotionOutcome> for MotionResponse {
    fn from(outcome: MotionOutcome) -> Self {
        Self {
            status: "ok".to_string(),
            performed: outcome.performed(),
            reason: outcome.reason().map(str::to_string),
        }
    }
}

/// Last path segment of `/api/v1/ptz/move/{target}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTarget {
    Axis(PtzAxis),
    Direction(Direction),
}

impl MoveTarget {
    fn command(self) -> &'static str {
        match self {
            MoveTarget::Axis(PtzAxis::Pan) => "move_pan",
            MoveTarget::Axis(PtzAxis::Tilt) => "move_tilt",
            MoveTarget::Axis(PtzAxis::Zoom) => "move_zoom",
            MoveTarget::Direction(Direction::Left) => "move_left",
            MoveTarget::Direction(Direction::Right) => "move_right",
            MoveTarget::Direction(Direction::Up) => "move_up",
            MoveTarget::Direction(Direction::Down) => "move_down",
            MoveTarget::Direction(Direction::ZoomIn) => "zoom_in",
            MoveTarget::Direction(Direction::ZoomOut) => "zoom_out",
        }
    }
}

impl FromStr for MoveTarget {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let target = match s {
            "pan" => MoveTarget::Axis(PtzAxis::Pan),
            "tilt" => MoveTarget::Axis(PtzAxis::Tilt),
            "zoom" => MoveTarget::Axis(PtzAxis::Zoom),
            "left" => MoveTarget::Direction(Direction::Left),
            "right" => MoveTarget::Direction(Direction::Right),
            "up" => MoveTarget::Direction(Direction::Up),
            "down" => MoveTarget::Direction(Direction::Down),
            "zoom-in" | "zoom_in" => MoveTarget::Direction(Direction::ZoomIn),
            "zoom-out" | "zoom_out" => MoveTarget::Direction(Direction::ZoomOut),
            other => return Err(ApiError::NotFound(format!("unknown move target: {}", other))),
        };
        Ok(target)
    }
}

/// An empty body means "no velocity"; anything else must be a
/// `{"velocity": <number>}` object, whatever its content type.
fn body_velocity(body: &[u8]) -> Result<Option<f32>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let params: VelocityParams = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid move body: {}", e)))?;
    Ok(params.velocity)
}

fn velocity(raw: Option<f32>) -> Result<Option<Velocity>, ApiError> {
    raw.map(|v| Velocity::new(v).map_err(CameraError::from))
        .transpose()
        .map_err(ApiError::from)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state
        .services
        .check_health(&state.config, state.uptime())
        .await;

    let status = if report.status.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.services.metrics.render(),
    )
}

async fn ptz_capabilities(State(state): State<AppState>) -> Json<PtzCapabilities> {
    Json(state.services.camera.get_ptz_capabilities().await)
}

/// Axis moves need a velocity, from the JSON body or `?velocity=`.
/// Directional moves fall back to the configured default speed.
async fn ptz_move(
    State(state): State<AppState>,
    Path(target): Path<String>,
    Query(query): Query<VelocityParams>,
    body: Bytes,
) -> Result<Json<MotionResponse>, ApiError> {
    let target: MoveTarget = target.parse()?;
    let raw = body_velocity(&body)?.or(query.velocity);
    let requested = velocity(raw)?;

    let camera = &state.services.camera;
    let result = match target {
        MoveTarget::Axis(axis) => {
            let v = requested.ok_or_else(|| {
                ApiError::bad_request(format!("velocity is required for {} moves", axis))
            })?;
            match axis {
                PtzAxis::Pan => camera.move_pan(v).await,
                PtzAxis::Tilt => camera.move_tilt(v).await,
                PtzAxis::Zoom => camera.move_zoom(v).await,
            }
        }
        MoveTarget::Direction(direction) => camera.move_direction(direction, requested).await,
    };

    motion_response(&state, target.command(), result)
}

async fn ptz_stop(State(state): State<AppState>) -> Result<Json<MotionResponse>, ApiError> {
    let result = state.services.camera.stop().await;
    motion_response(&state, "stop", result)
}

async fn ptz_home(State(state): State<AppState>) -> Result<Json<MotionResponse>, ApiError> {
    let result = state.services.camera.goto_home_position().await;
    motion_response(&state, "goto_home_position", result)
}

fn motion_response(
    state: &AppState,
    command: &str,
    result: onvif_control::Result<MotionOutcome>,
) -> Result<Json<MotionResponse>, ApiError> {
    match result {
        Ok(outcome) => {
            state.services.metrics.record_motion(command, &outcome);
            Ok(Json(outcome.into()))
        }
        Err(e) => {
            state.services.metrics.record_command(command, false);
            Err(e.into())
        }
    }
}

async fn list_presets(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let presets = state.services.camera.list_presets().await?;
    Ok(Json(json!({ "presets": presets })))
}

async fn create_preset(
    State(state): State<AppState>,
    Json(req): Json<CreatePresetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("preset name must not be empty"));
    }

    let result = state.services.camera.set_preset(name).await;
    state
        .services
        .metrics
        .record_command("set_preset", result.is_ok());
    let preset = result?;

    info!(preset = %preset.name, "preset saved");
    Ok((StatusCode::CREATED, Json(preset)))
}

async fn delete_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.services.camera.delete_preset(&name).await;
    state
        .services
        .metrics
        .record_command("delete_preset", result.is_ok());
    result?;
    Ok(Json(json!({"status": "ok"})))
}

async fn goto_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.services.camera.goto_preset(&name).await;
    state
        .services
        .metrics
        .record_command("goto_preset", result.is_ok());
    result?;
    Ok(Json(json!({"status": "ok"})))
}

async fn stream_uri(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // carries the camera credentials; never log it
    let uri = state.services.camera.resolve_stream_uri().await?;
    Ok(Json(json!({ "uri": uri })))
}

async fn snapshot_uri(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let uri = state.services.camera.resolve_snapshot_uri().await?;
    Ok(Json(json!({ "uri": uri })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_target_parsing() {
        assert_eq!(
            "pan".parse::<MoveTarget>().unwrap(),
            MoveTarget::Axis(PtzAxis::Pan)
        );
        assert_eq!(
            "zoom-in".parse::<MoveTarget>().unwrap(),
            MoveTarget::Direction(Direction::ZoomIn)
        );
        assert_eq!(
            "zoom_out".parse::<MoveTarget>().unwrap(),
            MoveTarget::Direction(Direction::ZoomOut)
        );
        assert!("sideways".parse::<MoveTarget>().is_err());
    }

    #[test]
    fn test_velocity_validation() {
        assert_eq!(velocity(None).unwrap(), None);
        assert_eq!(velocity(Some(0.5)).unwrap().map(Velocity::value), Some(0.5));
        let err = velocity(Some(-1.2)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_body_velocity_is_strict() {
        assert_eq!(body_velocity(b"").unwrap(), None);
        assert_eq!(body_velocity(b"  \n").unwrap(), None);
        assert_eq!(body_velocity(b"{}").unwrap(), None);
        assert_eq!(body_velocity(br#"{"velocity": 0.3}"#).unwrap(), Some(0.3));
        assert!(body_velocity(br#"{"velocity": "fast"}"#).is_err());
        assert!(body_velocity(b"velocity=0.3").is_err());
    }

    #[test]
    fn test_motion_response_shape() {
        let performed = serde_json::to_value(MotionResponse::from(MotionOutcome::Performed)).unwrap();
        assert_eq!(performed, json!({"status": "ok", "performed": true}));

        let skipped = serde_json::to_value(MotionResponse::from(MotionOutcome::Skipped {
            reason: "PTZ service not available".into(),
        }))
        .unwrap();
        assert_eq!(
            skipped,
            json!({"status": "ok", "performed": false, "reason": "PTZ service not available"})
        );
    }
}
