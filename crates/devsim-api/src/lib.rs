//! REST API for the device simulation service.
//!
//! Routes live under `/v1`. Success bodies are the entities themselves, or
//! `{"Items": [...]}` for collections; errors use [`models::ErrorResponse`].

pub mod handlers;
pub mod models;
pub mod server;
pub mod shutdown;
pub mod startup;

pub use server::{MAX_REQUEST_BODY_SIZE, ServerState, create_router, run};
