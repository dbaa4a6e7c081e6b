//! Simulation lifecycle.
//!
//! [`SimulationService`] and [`DeviceModelService`] are what the HTTP layer
//! talks to. Every write validates first, then goes through the versioned
//! store, then tells the provisioner what changed.

pub mod device_models;
pub mod lifecycle;
pub mod simulations;

pub use device_models::DeviceModelService;
pub use lifecycle::LifecycleAction;
pub use simulations::SimulationService;
