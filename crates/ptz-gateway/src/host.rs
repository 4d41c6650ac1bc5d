use axum::{
    extract::{Request, State},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// Host names the gateway answers to.
///
/// Entries are exact names, `*.suffix` wildcards, or `*` for any host.
#[derive(Debug, Clone)]
pub struct TrustedHosts {
    patterns: Arc<Vec<String>>,
}

impl TrustedHosts {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: Arc::new(patterns.iter().map(|p| p.to_ascii_lowercase()).collect()),
        }
    }

    pub fn allows(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.patterns.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            match pattern.strip_prefix('*') {
                Some(suffix) if suffix.starts_with('.') => host.ends_with(suffix),
                _ => *pattern == host,
            }
        })
    }
}

/// Host header without its port. Bracketed IPv6 literals keep their brackets.
fn host_name(header: &str) -> &str {
    if header.starts_with('[') {
        return match header.find(']') {
            Some(end) => &header[..=end],
            None => header,
        };
    }
    header.split(':').next().unwrap_or_default()
}

/// Rejects requests whose `Host` header is not on the list with 400.
pub async fn trusted_host_middleware(
    State(hosts): State<TrustedHosts>,
    req: Request,
    next: Next,
) -> Response {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(host_name)
        .unwrap_or_default();

    if hosts.allows(host) {
        return next.run(req).await;
    }

    warn!(host = %host, "rejected request for untrusted host");
    (StatusCode::BAD_REQUEST, "Invalid host header").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(patterns: &[&str]) -> TrustedHosts {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        TrustedHosts::new(&patterns)
    }

    #[test]
    fn test_host_name_strips_port() {
        assert_eq!(host_name("cam-api.local:8000"), "cam-api.local");
        assert_eq!(host_name("cam-api.local"), "cam-api.local");
        assert_eq!(host_name("[::1]:8000"), "[::1]");
        assert_eq!(host_name(""), "");
    }

    #[test]
    fn test_exact_and_wildcard_matching() {
        let trusted = hosts(&["api.local", "*.example.com"]);
        assert!(trusted.allows("api.local"));
        assert!(trusted.allows("API.LOCAL"));
        assert!(trusted.allows("ptz.example.com"));
        assert!(!trusted.allows("example.com"));
        assert!(!trusted.allows("evil.local"));
        assert!(!trusted.allows(""));
    }

    #[test]
    fn test_star_allows_everything() {
        assert!(hosts(&["*"]).allows("anything.at.all"));
    }
}
