pub mod config;
pub mod error;
pub mod host;
pub mod metrics;
pub mod probes;
pub mod routes;
pub mod services;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use host::TrustedHosts;
pub use metrics::GatewayMetrics;
pub use probes::CameraProbe;
pub use routes::{router, MotionResponse};
pub use services::SharedServices;
pub use state::AppState;
