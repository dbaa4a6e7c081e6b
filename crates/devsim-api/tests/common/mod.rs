//! Common test utilities for API tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use devsim_api::ServerState;
use devsim_core::config::{ProvisioningConfig, ServiceConfig};
use devsim_devices::{InMemoryIotHub, ProvisioningStatus};
use devsim_storage::Stores;
use serde_json::{Value, json};

pub struct TestServer {
    pub state: ServerState,
    pub hub: Arc<InMemoryIotHub>,
    pub config: ServiceConfig,
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        provisioning: ProvisioningConfig {
            max_attempts: 2,
            retry_backoff: Duration::from_millis(5),
        },
        firmware_step: Duration::from_millis(10),
        ..ServiceConfig::default()
    }
}

/// Server state over a throwaway database and a local hub, initialized the
/// way `run` does it.
pub async fn create_test_server() -> TestServer {
    let config = test_config();
    let hub = Arc::new(InMemoryIotHub::local(config.firmware_step));
    let state = ServerState::with_parts(Stores::memory().unwrap(), hub.clone(), &config);
    state.initialize(&config).await.unwrap();
    TestServer { state, hub, config }
}

/// Poll until the simulation's provisioning reaches `Running`.
pub async fn wait_running(state: &ServerState, id: &str) -> ProvisioningStatus {
    for _ in 0..250 {
        let status = state.simulations.provisioning_status(id).await.unwrap();
        if matches!(status, ProvisioningStatus::Running { .. }) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    state.simulations.provisioning_status(id).await.unwrap()
}

pub fn custom_model_json() -> Value {
    json!({
        "Name": "Elevator",
        "Description": "Simulated elevator",
        "Protocol": "AMQP",
        "Type": "Custom",
        "Properties": { "Floors": 12 },
        "Telemetry": [{
            "Interval": "00:00:05",
            "MessageTemplate": "{\"floor\":${floor}}",
            "MessageSchema": {
                "Name": "elevator-floor;v1",
                "Format": "JSON",
                "Fields": { "floor": "Integer" }
            }
        }],
        "CloudToDeviceMethods": { "Reboot": null }
    })
}

pub fn simulation_json(models: Value) -> Value {
    json!({
        "Name": "api test",
        "Enabled": false,
        "DeviceModels": models,
        "IoTHub": { "ConnectionString": "default" }
    })
}
