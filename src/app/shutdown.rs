use super::types::{POLLER, SERVER};
use super::{ComponentState, TvStatusOrchestrator};
use crate::error::{Result, TvStatusError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl TvStatusOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Err(e) = self.stop_component(SERVER).await {
            error!("Error stopping {}: {}", SERVER, e);
            exit_code = 1;
        }

        if let Err(e) = self.stop_component(POLLER).await {
            error!("Error stopping {}: {}", POLLER, e);
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Worst case for one poll cycle to drain: every device request hits its timeout
    pub(super) fn poller_stop_timeout(&self) -> Duration {
        let device = &self.config.device;
        let mut limit = device.request_timeout() * 4 + Duration::from_secs(1);
        if device.adb_enabled {
            limit += Duration::from_millis(
                device.adb_connect_timeout_ms + device.adb_probe_timeout_ms,
            );
        }
        limit
    }

    /// Stop a specific component
    async fn stop_component(&mut self, component: &str) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let result = match component {
            POLLER => {
                let poller = self.poller();
                let limit = self.poller_stop_timeout();
                stop_within(component, limit, async move { poller.stop().await }).await
            }
            SERVER => match self.server_handle.take() {
                Some(handle) => {
                    stop_within(component, SERVER_STOP_TIMEOUT, async move {
                        handle.await.map_err(|e| {
                            TvStatusError::system(format!("API server task failed: {}", e))
                        })?
                    })
                    .await
                }
                None => Ok(()),
            },
            other => Err(TvStatusError::component(
                other.to_string(),
                "unknown component".to_string(),
            )),
        };

        match &result {
            Ok(()) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
            }
            Err(e) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
            }
        }

        result
    }
}

async fn stop_within<F>(component: &str, limit: Duration, stop: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match timeout(limit, stop).await {
        Ok(result) => result,
        Err(_) => Err(TvStatusError::system(format!(
            "{} component stop timeout",
            component
        ))),
    }
}
