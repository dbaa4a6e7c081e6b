//! Service status.

use std::collections::BTreeMap;

use axum::{Json, extract::State};

use super::ServerState;
use crate::models::ServiceStatus;

pub const SERVICE_NAME: &str = "DeviceSimulation";

/// `GET /v1/status`. Always 200; a storage failure shows in `Status`.
pub async fn status_handler(State(state): State<ServerState>) -> Json<ServiceStatus> {
    let mut properties = BTreeMap::new();
    properties.insert(
        "DefaultIoTHub".to_string(),
        state
            .default_hub_host()
            .unwrap_or_else(|| "not configured".to_string()),
    );

    let status = match state.simulations.list().await {
        Ok(simulations) => {
            let enabled = simulations.iter().filter(|s| s.enabled).count();
            properties.insert("Simulations".to_string(), simulations.len().to_string());
            properties.insert("EnabledSimulations".to_string(), enabled.to_string());
            "OK:Alive and well".to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Status check could not read simulations");
            format!("ERROR:Storage unavailable ({e})")
        }
    };

    Json(ServiceStatus {
        name: SERVICE_NAME.to_string(),
        status,
        uptime: state.uptime(),
        version: devsim_core::VERSION.to_string(),
        properties,
    })
}
