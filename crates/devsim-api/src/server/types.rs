//! Server state and types.

use std::sync::Arc;

use anyhow::Context;
use devsim_core::config::{ServiceConfig, env_vars};
use devsim_core::IotHubConnectionString;
use devsim_devices::{HubDirectory, InMemoryIotHub, IotHubClient, Provisioner};
use devsim_simulation::{DeviceModelService, SimulationService};
use devsim_storage::Stores;

/// Maximum request body size (1 MB)
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Server state shared across all handlers.
#[derive(Clone)]
pub struct ServerState {
    pub device_models: Arc<DeviceModelService>,
    pub simulations: Arc<SimulationService>,

    /// Hubs simulations can target, `default` included.
    pub hubs: Arc<HubDirectory>,

    /// Background provisioning worker.
    pub provisioner: Arc<Provisioner>,

    /// Server start timestamp.
    pub started_at: i64,
}

impl ServerState {
    /// Open the database under the configured data directory and create the
    /// default hub.
    pub async fn new(config: &ServiceConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;
        let path = config.database_path();
        let stores = Stores::open(&path)
            .with_context(|| format!("opening database {}", path.display()))?;

        Ok(Self::with_parts(stores, default_hub(config)?, config))
    }

    /// State over an existing store and hub. Spawns the provisioning worker,
    /// so it must run inside a tokio runtime.
    pub fn with_parts(
        stores: Stores,
        default_hub: Arc<dyn IotHubClient>,
        config: &ServiceConfig,
    ) -> Self {
        let hubs = Arc::new(HubDirectory::new(Some(default_hub)));
        let provisioner = Arc::new(Provisioner::start(Arc::clone(&hubs), config.provisioning));

        Self {
            device_models: Arc::new(DeviceModelService::new(stores.device_models.clone())),
            simulations: Arc::new(SimulationService::new(
                stores.simulations,
                stores.device_models,
                Arc::clone(&hubs),
                Arc::clone(&provisioner),
            )),
            hubs,
            provisioner,
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Seed the stock catalog, optionally the default simulation, and queue
    /// provisioning for simulations that were enabled before a restart.
    pub async fn initialize(&self, config: &ServiceConfig) -> devsim_core::Result<()> {
        let seeded = self.device_models.seed_stock_models().await?;
        tracing::info!(seeded, "Stock device models ready");

        if config.seed_default_simulation {
            self.simulations.ensure_default_simulation().await?;
        }

        let resumed = self.simulations.resume_enabled().await?;
        if resumed > 0 {
            tracing::info!(resumed, "Resumed enabled simulations");
        }
        Ok(())
    }

    /// Host name of the `default` hub, if one is configured.
    pub fn default_hub_host(&self) -> Option<String> {
        self.hubs
            .default_hub()
            .map(|hub| hub.host_name().to_string())
    }

    /// Seconds since the server started.
    pub fn uptime(&self) -> u64 {
        let elapsed = chrono::Utc::now().timestamp() - self.started_at;
        u64::try_from(elapsed).unwrap_or(0)
    }
}

/// The hub behind `default`: built from the configured connection string, or
/// a local hub with a generated key.
fn default_hub(config: &ServiceConfig) -> anyhow::Result<Arc<dyn IotHubClient>> {
    let hub = match &config.iothub_connection_string {
        Some(raw) => {
            let connection: IotHubConnectionString = raw
                .parse()
                .with_context(|| format!("invalid {}", env_vars::IOTHUB_CONNSTRING))?;
            InMemoryIotHub::new(connection, config.firmware_step)
        }
        None => InMemoryIotHub::local(config.firmware_step),
    };
    Ok(Arc::new(hub))
}
