use crate::{
    config::ServerConfig,
    error::{Result, TvStatusError},
    gateway::DeviceGateway,
    status::{StatusCache, StatusPoller},
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::handlers::{
    applications_handler, hdmi_inputs_handler, health_handler, inputs_handler, launch_handler,
    metrics_handler, power_handler, remote_handler, status_handler, switch_input_handler,
    volume_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ApiState {
    pub(crate) cache: Arc<StatusCache>,
    pub(crate) gateway: Arc<DeviceGateway>,
    pub(crate) poller: Arc<StatusPoller>,
}

impl ApiState {
    pub fn new(
        cache: Arc<StatusCache>,
        gateway: Arc<DeviceGateway>,
        poller: Arc<StatusPoller>,
    ) -> Self {
        Self {
            cache,
            gateway,
            poller,
        }
    }
}

/// REST front end over the status cache and the device gateway
pub struct ApiServer {
    pub(crate) config: ServerConfig,
    state: ApiState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: ApiState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/api/status", get(status_handler))
            .route("/api/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/power", post(power_handler))
            .route("/api/volume", post(volume_handler))
            .route("/api/remote", post(remote_handler))
            .route("/api/applications", get(applications_handler))
            .route("/api/applications/launch", post(launch_handler))
            .route("/api/inputs", get(inputs_handler))
            .route("/api/inputs/hdmi", get(hdmi_inputs_handler))
            .route("/api/inputs/switch", post(switch_input_handler))
            .with_state(self.state.clone());

        if self.config.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = format!("{}:{}", self.config.ip, self.config.port);

        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            TvStatusError::component("server".to_string(), format!("bind {} failed: {}", addr, e))
        })?;

        info!("API server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| TvStatusError::component("server".to_string(), format!("Server error: {}", e)))?;

        info!("API server stopped");
        Ok(())
    }
}
