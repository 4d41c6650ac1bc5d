use std::fmt;

/// Where the camera lives and how to log in. The password is write-only:
/// it is never printed by `Debug` and the type is not serializable.
#[derive(Clone)]
pub struct CameraEndpoint {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl CameraEndpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Device management service, the entry point for capability discovery.
    pub fn device_service_url(&self) -> String {
        // bare IPv6 literals need brackets in a URL authority
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("http://[{}]:{}/onvif/device_service", self.host, self.port)
        } else {
            format!("http://{}:{}/onvif/device_service", self.host, self.port)
        }
    }
}

impl fmt::Debug for CameraEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let endpoint = CameraEndpoint::new("10.0.0.5", 80, "admin", "s3cr3t");
        let printed = format!("{:?}", endpoint);
        assert!(printed.contains("admin"));
        assert!(printed.contains("10.0.0.5"));
        assert!(!printed.contains("s3cr3t"));
    }

    #[test]
    fn test_device_service_url() {
        let endpoint = CameraEndpoint::new("10.0.0.5", 8080, "admin", "pw");
        assert_eq!(
            endpoint.device_service_url(),
            "http://10.0.0.5:8080/onvif/device_service"
        );

        let v6 = CameraEndpoint::new("fe80::1", 80, "admin", "pw");
        assert_eq!(v6.device_service_url(), "http://[fe80::1]:80/onvif/device_service");
    }
}
