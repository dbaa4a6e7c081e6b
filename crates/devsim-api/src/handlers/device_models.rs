//! Device model handlers.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use devsim_core::DeviceModel;

use super::ServerState;
use super::common::{HandlerResult, json_body, ok};
use crate::models::{ErrorResponse, ItemList};

/// `GET /v1/devicemodels`
pub async fn list_device_models_handler(
    State(state): State<ServerState>,
) -> HandlerResult<ItemList<DeviceModel>> {
    ok(state.device_models.list().await?.into())
}

/// `GET /v1/devicemodels/:id`
pub async fn get_device_model_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> HandlerResult<DeviceModel> {
    ok(state.device_models.get(&id).await?)
}

/// `POST /v1/devicemodels`. The Id is generated when absent.
pub async fn create_device_model_handler(
    State(state): State<ServerState>,
    body: Result<Json<DeviceModel>, JsonRejection>,
) -> HandlerResult<DeviceModel> {
    let model = json_body(body)?;
    ok(state.device_models.create(model).await?)
}

/// `PUT /v1/devicemodels/:id`. The path Id wins over the body Id.
pub async fn upsert_device_model_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<DeviceModel>, JsonRejection>,
) -> HandlerResult<DeviceModel> {
    let model = json_body(body)?;
    ok(state.device_models.upsert(&id, model).await?)
}

/// `DELETE /v1/devicemodels/:id`. Stock models answer 403.
pub async fn delete_device_model_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    state.device_models.delete(&id).await?;
    Ok(StatusCode::OK)
}
