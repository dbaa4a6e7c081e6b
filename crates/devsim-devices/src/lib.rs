//! Device provisioning bridge.
//!
//! Turns enabled simulations into device twins on an IoT Hub:
//! - [`IotHubClient`] is the seam to a hub registry, [`InMemoryIotHub`] the
//!   in-process implementation whose devices answer direct methods
//! - [`HubDirectory`] maps simulation hub descriptors to clients and checks
//!   their credentials
//! - [`Provisioner`] runs provisioning jobs on a background worker

pub mod directory;
pub mod error;
pub mod hub;
pub mod methods;
pub mod provisioner;
pub mod twin;

pub use directory::HubDirectory;
pub use error::{DeviceError, Result};
pub use hub::{InMemoryIotHub, IotHubClient, LOCAL_HUB_HOST};
pub use methods::{FIRMWARE_UPDATE, MethodResult, REBOOT, bump_version, firmware_status};
pub use provisioner::{Provisioner, ProvisioningStatus};
pub use twin::Twin;
