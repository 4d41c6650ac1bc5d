use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use onvif_control::CameraError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The camera failed or could not be reached.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotImplemented(msg)
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.message(),
        }));

        (status, body).into_response()
    }
}

impl From<CameraError> for ApiError {
    fn from(err: CameraError) -> Self {
        let msg = err.to_string();
        match err {
            CameraError::InvalidVelocity(_) => ApiError::BadRequest(msg),
            CameraError::PresetNotFound(_) => ApiError::NotFound(msg),
            CameraError::PresetAlreadyExists(_) => ApiError::Conflict(msg),
            CameraError::CapabilityAbsent => ApiError::NotImplemented(msg),
            CameraError::UpstreamUnavailable(_)
            | CameraError::Fault { .. }
            | CameraError::Protocol(_) => ApiError::BadGateway(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onvif_control::{Velocity, VelocityError};

    #[test]
    fn test_camera_error_mapping() {
        let cases = [
            (
                CameraError::from(Velocity::new(2.0).unwrap_err()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CameraError::PresetNotFound("p".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                CameraError::PresetAlreadyExists("p".into()),
                StatusCode::CONFLICT,
            ),
            (CameraError::CapabilityAbsent, StatusCode::NOT_IMPLEMENTED),
            (CameraError::upstream("timeout"), StatusCode::BAD_GATEWAY),
            (
                CameraError::Fault {
                    action: "Stop".into(),
                    reason: "busy".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (CameraError::protocol("garbage"), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_message_keeps_camera_text() {
        let err = ApiError::from(CameraError::PresetNotFound("gate".into()));
        assert_eq!(err.message(), "preset 'gate' not found");

        let err = ApiError::from(CameraError::InvalidVelocity(VelocityError { value: 1.5 }));
        assert_eq!(err.message(), "velocity 1.5 is outside [-1.0, 1.0]");
    }
}
