use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// HTTP header name for request ID, echoed on every response
pub const X_REQUEST_ID: &str = "x-request-id";

/// Accepted on input as an alias for `x-request-id`
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Longest caller-supplied id accepted before a fresh one is generated
const MAX_REQUEST_ID_LEN: usize = 128;

/// Generate a new request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Extract request ID from HTTP headers or generate a new one
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .or_else(|| headers.get(X_CORRELATION_ID))
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
        .map(|s| s.to_string())
        .unwrap_or_else(generate_request_id)
}

/// Request ID wrapper stored in request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axum middleware: every log line emitted while handling the request
/// carries `request_id`, and the id is returned in `x-request-id`.
///
/// ```ignore
/// Router::new().layer(axum::middleware::from_fn(request_id_middleware))
/// ```
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = extract_or_generate_request_id(req.headers());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Extension, Router};
    use tower::ServiceExt;

    #[test]
    fn test_generate_request_id() {
        let id = generate_request_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_extract_prefers_x_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(X_CORRELATION_ID, HeaderValue::from_static("correlation-123"));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("request-456"));

        assert_eq!(extract_or_generate_request_id(&headers), "request-456");
    }

    #[test]
    fn test_extract_falls_back_to_correlation_id() {
        let mut headers = HeaderMap::new();
        headers.insert(X_CORRELATION_ID, HeaderValue::from_static("correlation-123"));

        assert_eq!(extract_or_generate_request_id(&headers), "correlation-123");
    }

    #[test]
    fn test_extract_generates_if_missing_or_oversized() {
        let id = extract_or_generate_request_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&id).is_ok());

        let mut headers = HeaderMap::new();
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(X_REQUEST_ID, HeaderValue::from_str(&long).unwrap());
        let id = extract_or_generate_request_id(&headers);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn test_middleware_echoes_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "abc-123");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"abc-123");
    }

    #[tokio::test]
    async fn test_middleware_generates_request_id() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()[X_REQUEST_ID].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
