//! Simulation handlers.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use devsim_core::{Simulation, SimulationPatch};
use devsim_devices::ProvisioningStatus;

use super::ServerState;
use super::common::{HandlerResult, json_body, ok};
use crate::models::{ErrorResponse, ItemList, TemplateQuery};

/// `GET /v1/simulations`
pub async fn list_simulations_handler(
    State(state): State<ServerState>,
) -> HandlerResult<ItemList<Simulation>> {
    ok(state.simulations.list().await?.into())
}

/// `GET /v1/simulations/:id`
pub async fn get_simulation_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> HandlerResult<Simulation> {
    ok(state.simulations.get(&id).await?)
}

/// `POST /v1/simulations[?template=default]`
///
/// With a template the body only overrides the template's members, and the
/// simulation is created under the template's Id.
pub async fn create_simulation_handler(
    State(state): State<ServerState>,
    Query(query): Query<TemplateQuery>,
    body: Result<Json<Simulation>, JsonRejection>,
) -> HandlerResult<Simulation> {
    let simulation = json_body(body)?;
    let created = match query.template.as_deref() {
        Some(template) => {
            state
                .simulations
                .create_from_template(simulation, template)
                .await?
        }
        None => state.simulations.create(simulation).await?,
    };
    ok(created)
}

/// `PUT /v1/simulations/:id`
pub async fn upsert_simulation_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<Simulation>, JsonRejection>,
) -> HandlerResult<Simulation> {
    let simulation = json_body(body)?;
    ok(state.simulations.upsert(&id, simulation).await?)
}

/// `PATCH /v1/simulations/:id` with `{"ETag": ..., "Enabled": ...}`.
pub async fn patch_simulation_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<SimulationPatch>, JsonRejection>,
) -> HandlerResult<Simulation> {
    let patch = json_body(body)?;
    ok(state.simulations.patch(&id, patch).await?)
}

/// `DELETE /v1/simulations/:id`
pub async fn delete_simulation_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    state.simulations.delete(&id).await?;
    Ok(StatusCode::OK)
}

/// `GET /v1/simulations/:id/status`
pub async fn simulation_status_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> HandlerResult<ProvisioningStatus> {
    ok(state.simulations.provisioning_status(&id).await?)
}
