use super::types::{POLLER, SERVER};
use super::{ComponentState, TvStatusOrchestrator};
use crate::error::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

impl TvStatusOrchestrator {
    /// Register components with their initial state
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing tvstatus components");

        let mut states = self.component_states.lock().await;
        states.insert(POLLER.to_string(), ComponentState::Stopped);
        states.insert(SERVER.to_string(), ComponentState::Stopped);
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the status poller, then the API server
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting tvstatus");

        self.set_component_state(POLLER, ComponentState::Starting)
            .await;
        if let Err(e) = self.poller.start() {
            error!("Failed to start status poller: {}", e);
            self.set_component_state(POLLER, ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state(POLLER, ComponentState::Running)
            .await;
        info!(
            "Status poller started (every {}s)",
            self.config.status.poll_interval_seconds
        );

        self.set_component_state(SERVER, ComponentState::Starting)
            .await;

        let server = Arc::clone(&self.server);
        let token = self.cancellation_token.child_token();
        self.server_handle = Some(tokio::spawn(async move {
            let result = server.start(token).await;
            if let Err(e) = &result {
                error!("API server error: {}", e);
            }
            result
        }));

        self.set_component_state(SERVER, ComponentState::Running)
            .await;
        info!(
            "API server started on {}:{}",
            self.config.server.ip, self.config.server.port
        );

        if self.is_fully_running().await {
            info!("tvstatus started successfully");
        } else {
            warn!(
                "tvstatus started with components not running: {:?}",
                self.get_all_component_states().await
            );
        }
        Ok(())
    }
}
