//! Core types for the device simulation service.
//!
//! This crate holds everything the other crates agree on:
//! - **model**: device models, simulations and their wire format
//! - **validation**: payload checks run before any write
//! - **time**: telemetry intervals and simulation time expressions
//! - **iothub**: IoT Hub connection strings and SAS tokens
//! - **stock**: the built-in device model catalog and simulation templates
//! - **config**: service configuration read from the environment

pub mod config;
pub mod error;
pub mod iothub;
pub mod model;
pub mod stock;
pub mod time;
pub mod validation;

pub use error::{Error, Result, ValidationError};
pub use iothub::{ConnectionStringError, HubTarget, IotHubConnectionString, SasToken};
pub use model::{
    DEFAULT_SIMULATION_ID, DeviceBehavior, DeviceModel, DeviceModelRef, DeviceModelType,
    FieldKind, IotHubDescriptor, MessageFormat, MessageSchema, PropertyValue, Protocol, Script,
    ScriptType, Simulation, SimulationPatch, TelemetryRule,
};
pub use stock::{DEFAULT_TEMPLATE, is_stock_model_id, simulation_template, stock_device_models};
pub use time::{TimeExpression, TimeParseError, parse_interval, parse_iso_duration};
pub use validation::{validate_device_model, validate_patch, validate_simulation};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
