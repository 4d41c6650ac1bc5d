pub mod health;

pub use health::{
    gather_health_checks, overall_status, ComponentHealth, Environment, FnProbe, HealthProbe,
    HealthReport, HealthService, HealthStatus, DEFAULT_PROBE_TIMEOUT,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
