use super::*;
use crate::config::TvStatusConfig;
use crate::gateway::DeviceGateway;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}

fn create_test_config() -> TvStatusConfig {
    let mut config = TvStatusConfig::default();
    config.device.host = "127.0.0.1:1".to_string();
    config.device.adb_enabled = false;
    config.device.bind_local_address = false;
    config.device.request_timeout_ms = 200;
    config.server.ip = "127.0.0.1".to_string();
    config.server.port = free_port();
    config
}

fn create_test_orchestrator() -> TvStatusOrchestrator {
    let config = create_test_config();
    let gateway = DeviceGateway::builder()
        .base_url(format!("http://{}", config.device.host))
        .request_timeout(config.device.request_timeout())
        .build()
        .unwrap();
    TvStatusOrchestrator::with_gateway(config, Arc::new(gateway))
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let orchestrator = TvStatusOrchestrator::new(create_test_config())
        .await
        .unwrap();

    // No components registered yet
    let states = orchestrator.get_all_component_states().await;
    assert!(states.is_empty());
    assert_eq!(orchestrator.gateway().base_url(), "http://127.0.0.1:1");
    assert!(!orchestrator.poller().is_running());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = create_test_config();
    config.status.poll_interval_seconds = 0;

    assert!(TvStatusOrchestrator::new(config).await.is_err());
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let mut orchestrator = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.len(), 2);
    assert_eq!(states.get("poller"), Some(&ComponentState::Stopped));
    assert_eq!(states.get("server"), Some(&ComponentState::Stopped));
    assert!(!orchestrator.is_fully_running().await);
}

#[tokio::test]
async fn test_component_state_transitions() {
    let orchestrator = create_test_orchestrator();
    let component = "test_component";

    assert_eq!(orchestrator.get_component_state(component).await, None);

    for state in [
        ComponentState::Starting,
        ComponentState::Running,
        ComponentState::Stopping,
        ComponentState::Stopped,
    ] {
        orchestrator
            .set_component_state(component, state.clone())
            .await;
        assert_eq!(
            orchestrator.get_component_state(component).await,
            Some(state)
        );
    }
}

#[tokio::test]
async fn test_start_and_shutdown() {
    let mut orchestrator = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    assert_eq!(
        orchestrator.get_component_state("poller").await,
        Some(ComponentState::Running)
    );
    assert_eq!(
        orchestrator.get_component_state("server").await,
        Some(ComponentState::Running)
    );
    assert!(orchestrator.poller().is_running());
    assert!(orchestrator.is_fully_running().await);

    let exit_code = orchestrator.shutdown().await.unwrap();

    assert_eq!(exit_code, 0);
    assert!(!orchestrator.is_fully_running().await);
    assert!(!orchestrator.poller().is_running());
    assert_eq!(
        orchestrator.get_component_state("poller").await,
        Some(ComponentState::Stopped)
    );
    assert_eq!(
        orchestrator.get_component_state("server").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_failed_server_bind_sets_exit_code() {
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = create_test_config();
    config.server.port = occupied.local_addr().unwrap().port();

    let gateway = DeviceGateway::builder()
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap();
    let mut orchestrator = TvStatusOrchestrator::with_gateway(config, Arc::new(gateway));
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 1);
    assert_eq!(
        orchestrator.get_component_state("server").await,
        Some(ComponentState::Failed)
    );
}

#[tokio::test]
async fn test_run_returns_after_requested_shutdown() {
    let mut orchestrator = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    orchestrator
        .request_shutdown(ShutdownReason::UserRequest)
        .unwrap();
    assert!(orchestrator
        .request_shutdown(ShutdownReason::UserRequest)
        .is_err());

    let exit_code = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
}

#[test]
fn test_poller_stop_timeout_covers_adb_probe() {
    let mut orchestrator = create_test_orchestrator();
    let without_adb = orchestrator.poller_stop_timeout();

    orchestrator.config.device.adb_enabled = true;
    let with_adb = orchestrator.poller_stop_timeout();

    assert!(without_adb >= orchestrator.config.device.request_timeout() * 4);
    assert!(with_adb > without_adb);
}

#[tokio::test]
async fn test_fully_running_requires_every_component() {
    let orchestrator = create_test_orchestrator();
    assert!(!orchestrator.is_fully_running().await);

    orchestrator
        .set_component_state("poller", ComponentState::Running)
        .await;
    orchestrator
        .set_component_state("server", ComponentState::Failed)
        .await;
    assert!(!orchestrator.is_fully_running().await);

    orchestrator
        .set_component_state("server", ComponentState::Running)
        .await;
    assert!(orchestrator.is_fully_running().await);
}

#[tokio::test]
async fn test_concurrent_component_state_access() {
    let orchestrator = Arc::new(create_test_orchestrator());

    let mut handles = Vec::new();
    for i in 0..10 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let component = format!("component_{}", i);
            orchestrator
                .set_component_state(&component, ComponentState::Running)
                .await;
            orchestrator.get_component_state(&component).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some(ComponentState::Running));
    }

    assert_eq!(orchestrator.get_all_component_states().await.len(), 10);
}
