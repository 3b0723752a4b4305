use super::types::{ComponentState, ShutdownReason};
use crate::config::TvStatusConfig;
use crate::error::{Result, TvStatusError};
use crate::gateway::DeviceGateway;
use crate::server::{ApiServer, ApiState};
use crate::status::{StatusCache, StatusPoller, StatusSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owns the gateway, the status cache, its poller and the REST server
pub struct TvStatusOrchestrator {
    pub(super) config: TvStatusConfig,
    pub(super) cache: Arc<StatusCache>,
    pub(super) gateway: Arc<DeviceGateway>,
    pub(super) poller: Arc<StatusPoller>,
    pub(super) server: Arc<ApiServer>,
    pub(super) server_handle: Option<JoinHandle<Result<()>>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl TvStatusOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub async fn new(config: TvStatusConfig) -> Result<Self> {
        config.validate()?;

        let gateway = Arc::new(DeviceGateway::from_config(&config.device)?);
        Ok(Self::with_gateway(config, gateway))
    }

    /// Build around an existing gateway, e.g. one pointed at a test double
    pub fn with_gateway(config: TvStatusConfig, gateway: Arc<DeviceGateway>) -> Self {
        let cancellation_token = CancellationToken::new();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        info!("Device gateway targets {}", gateway.base_url());

        let cache = Arc::new(StatusCache::new(&config.status));
        let source: Arc<dyn StatusSource> = gateway.clone();
        let poller = Arc::new(
            StatusPoller::new(Arc::clone(&cache), source, config.status.poll_interval())
                .with_cancellation_token(cancellation_token.child_token()),
        );

        let state = ApiState::new(Arc::clone(&cache), Arc::clone(&gateway), Arc::clone(&poller));
        let server = Arc::new(ApiServer::new(config.server.clone(), state));

        Self {
            config,
            cache,
            gateway,
            poller,
            server,
            server_handle: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token,
        }
    }

    pub fn cache(&self) -> Arc<StatusCache> {
        Arc::clone(&self.cache)
    }

    pub fn gateway(&self) -> Arc<DeviceGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn poller(&self) -> Arc<StatusPoller> {
        Arc::clone(&self.poller)
    }

    /// Record a lifecycle transition for `component`
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let previous = self
            .component_states
            .lock()
            .await
            .insert(component.to_string(), state.clone());
        debug!(component, ?previous, ?state, "Component state changed");
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    /// Snapshot of every registered component's state
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// True once every registered component has reached `Running`
    pub async fn is_fully_running(&self) -> bool {
        let states = self.component_states.lock().await;
        !states.is_empty() && states.values().all(|state| *state == ComponentState::Running)
    }

    /// Queue a shutdown; [`run`](Self::run) then returns as soon as it starts waiting
    pub fn request_shutdown(&mut self, reason: ShutdownReason) -> Result<()> {
        let sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| TvStatusError::system("Shutdown sender already taken"))?;
        sender
            .send(reason)
            .map_err(|_| TvStatusError::system("Shutdown receiver dropped"))
    }
}
