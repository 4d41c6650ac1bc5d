use anyhow::{Context, Result};
use ptz_gateway::{AppState, GatewayConfig, SharedServices};
use std::sync::Arc;
use telemetry::LogConfig;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env().context("failed to load configuration")?;

    let _log_guard = telemetry::init_structured_logging(
        LogConfig::new(config.app_name.clone())
            .with_version(config.version.clone())
            .with_environment(config.environment.to_string()),
    )?;
    info!(config = ?config, "configuration loaded");

    let services = Arc::new(SharedServices::initialize(&config)?);
    let state = AppState::new(Arc::clone(&services), Arc::new(config.clone()));
    let app = ptz_gateway::router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "ptz-gateway listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    services.cleanup().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
