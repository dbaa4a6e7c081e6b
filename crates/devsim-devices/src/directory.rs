//! Resolves simulation hub descriptors to hub clients.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use devsim_core::{HubTarget, IotHubDescriptor, Simulation};

use crate::error::{DeviceError, Result};
use crate::hub::IotHubClient;

/// How long tokens minted for authentication stay valid.
const TOKEN_TTL_MINUTES: i64 = 60;

/// Hubs known to the service, keyed by lower-cased host name.
pub struct HubDirectory {
    default_hub: Option<Arc<dyn IotHubClient>>,
    hubs: DashMap<String, Arc<dyn IotHubClient>>,
}

impl HubDirectory {
    pub fn new(default_hub: Option<Arc<dyn IotHubClient>>) -> Self {
        let directory = Self {
            default_hub: default_hub.clone(),
            hubs: DashMap::new(),
        };
        if let Some(hub) = default_hub {
            directory.register(hub);
        }
        directory
    }

    pub fn register(&self, hub: Arc<dyn IotHubClient>) {
        self.hubs.insert(hub.host_name().to_ascii_lowercase(), hub);
    }

    pub fn default_hub(&self) -> Option<Arc<dyn IotHubClient>> {
        self.default_hub.clone()
    }

    /// Verify that a descriptor's credentials are accepted by its hub.
    ///
    /// `default` always passes. A connection string must name a known host
    /// and sign a token that host accepts.
    pub fn authenticate(&self, descriptor: &IotHubDescriptor) -> Result<()> {
        match descriptor.target()? {
            HubTarget::Default => Ok(()),
            HubTarget::Custom(connection) => {
                let hub = self.lookup(&connection.host_name)?;
                let expiry = Utc::now() + chrono::Duration::minutes(TOKEN_TTL_MINUTES);
                hub.authenticate(&connection.sas_token(expiry))
            }
        }
    }

    /// Authenticate every hub a simulation targets.
    pub fn authenticate_all(&self, simulation: &Simulation) -> Result<()> {
        simulation
            .hubs()
            .into_iter()
            .try_for_each(|descriptor| self.authenticate(descriptor))
    }

    pub fn resolve(&self, descriptor: &IotHubDescriptor) -> Result<Arc<dyn IotHubClient>> {
        match descriptor.target()? {
            HubTarget::Default => self
                .default_hub()
                .ok_or_else(|| DeviceError::Hub("no default IoT Hub is configured".to_string())),
            HubTarget::Custom(connection) => {
                self.authenticate(descriptor)?;
                self.lookup(&connection.host_name)
            }
        }
    }

    /// Hubs a simulation provisions into. No descriptor means the default hub.
    pub fn hubs_for(&self, simulation: &Simulation) -> Result<Vec<Arc<dyn IotHubClient>>> {
        let descriptors = simulation.hubs();
        if descriptors.is_empty() {
            return self.resolve(&IotHubDescriptor::default_hub()).map(|hub| vec![hub]);
        }
        descriptors.into_iter().map(|d| self.resolve(d)).collect()
    }

    fn lookup(&self, host_name: &str) -> Result<Arc<dyn IotHubClient>> {
        self.hubs
            .get(&host_name.to_ascii_lowercase())
            .map(|hub| Arc::clone(hub.value()))
            .ok_or_else(|| DeviceError::Authentication(format!("unknown IoT Hub host {host_name}")))
    }
}
