//! HTTP handlers for the `/v1` API.

pub mod basic;
pub mod common;
pub mod device_models;
pub mod simulations;

pub use crate::server::ServerState;
