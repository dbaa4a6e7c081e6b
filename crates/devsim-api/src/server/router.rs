//! Application router configuration.

use axum::{
    Router,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::types::{MAX_REQUEST_BODY_SIZE, ServerState};

/// Create the application router with a specific state.
pub fn create_router(state: ServerState) -> Router {
    use crate::handlers::{basic, device_models, simulations};

    Router::new()
        .route("/v1/status", get(basic::status_handler))
        // Device models
        .route(
            "/v1/devicemodels",
            get(device_models::list_device_models_handler)
                .post(device_models::create_device_model_handler),
        )
        .route(
            "/v1/devicemodels/:id",
            get(device_models::get_device_model_handler)
                .put(device_models::upsert_device_model_handler)
                .delete(device_models::delete_device_model_handler),
        )
        // Simulations
        .route(
            "/v1/simulations",
            get(simulations::list_simulations_handler)
                .post(simulations::create_simulation_handler),
        )
        .route(
            "/v1/simulations/:id",
            get(simulations::get_simulation_handler)
                .put(simulations::upsert_simulation_handler)
                .patch(simulations::patch_simulation_handler)
                .delete(simulations::delete_simulation_handler),
        )
        .route(
            "/v1/simulations/:id/status",
            get(simulations::simulation_status_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
