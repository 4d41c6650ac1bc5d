use crate::config::GatewayConfig;
use crate::services::SharedServices;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<SharedServices>,
    pub config: Arc<GatewayConfig>,
    started_at: Instant,
}

impl AppState {
    pub fn new(services: Arc<SharedServices>, config: Arc<GatewayConfig>) -> Self {
        Self {
            services,
            config,
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
