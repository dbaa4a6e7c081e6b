//! Background provisioning of simulated devices.
//!
//! One worker task consumes jobs from an unbounded channel, so jobs for the
//! same simulation apply in submit order. Every submit bumps the simulation's
//! generation; a job whose generation is no longer current is skipped, and a
//! running job stops as soon as it is superseded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use devsim_core::config::ProvisioningConfig;
use devsim_core::{DeviceModel, Simulation};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::directory::HubDirectory;
use crate::error::{DeviceError, Result};
use crate::hub::IotHubClient;
use crate::twin::{reported, tags};

/// Provisioning progress of one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Status")]
pub enum ProvisioningStatus {
    /// Never provisioned.
    Idle,
    /// Queued behind other jobs.
    Pending,
    Provisioning {
        #[serde(rename = "Provisioned")]
        provisioned: u64,
        #[serde(rename = "Total")]
        total: u64,
    },
    Running {
        #[serde(rename = "Devices")]
        devices: u64,
        /// Referenced model Ids that do not exist.
        #[serde(rename = "SkippedModels")]
        skipped_models: Vec<String>,
    },
    Stopped,
    Failed {
        #[serde(rename = "Reason")]
        reason: String,
    },
}

enum Job {
    Provision {
        simulation: Simulation,
        models: Vec<DeviceModel>,
        generation: u64,
    },
    Stop {
        simulation_id: String,
        generation: u64,
    },
    Shutdown,
}

/// A device the worker registered, with the hub it lives on.
#[derive(Clone)]
struct Placement {
    hub: Arc<dyn IotHubClient>,
    device_id: String,
}

impl Placement {
    fn key(&self) -> (String, String) {
        (self.hub.host_name().to_string(), self.device_id.clone())
    }
}

#[derive(Default)]
struct Shared {
    statuses: DashMap<String, ProvisioningStatus>,
    generations: DashMap<String, u64>,
}

impl Shared {
    fn is_current(&self, simulation_id: &str, generation: u64) -> bool {
        self.generations
            .get(simulation_id)
            .map(|g| *g == generation)
            .unwrap_or(false)
    }

    fn set_status(&self, simulation_id: &str, generation: u64, status: ProvisioningStatus) {
        if self.is_current(simulation_id, generation) {
            self.statuses.insert(simulation_id.to_string(), status);
        }
    }
}

/// Handle to the provisioning worker.
pub struct Provisioner {
    tx: mpsc::UnboundedSender<Job>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Provisioner {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(directory: Arc<HubDirectory>, config: ProvisioningConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let worker = Worker {
            directory,
            config,
            shared: Arc::clone(&shared),
            placements: HashMap::new(),
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            tx,
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queue provisioning of every device the simulation describes.
    /// `models` are the stored models the simulation references.
    pub fn provision(&self, simulation: Simulation, models: Vec<DeviceModel>) {
        let generation = self.next_generation(&simulation.id);
        self.shared
            .statuses
            .insert(simulation.id.clone(), ProvisioningStatus::Pending);
        tracing::info!(simulation_id = %simulation.id, generation, "Provisioning queued");
        self.send(Job::Provision {
            simulation,
            models,
            generation,
        });
    }

    /// Queue disconnecting every device of the simulation.
    pub fn stop(&self, simulation_id: &str) {
        let generation = self.next_generation(simulation_id);
        tracing::info!(simulation_id, generation, "Stop queued");
        self.send(Job::Stop {
            simulation_id: simulation_id.to_string(),
            generation,
        });
    }

    pub fn status(&self, simulation_id: &str) -> ProvisioningStatus {
        self.shared
            .statuses
            .get(simulation_id)
            .map(|s| s.clone())
            .unwrap_or(ProvisioningStatus::Idle)
    }

    /// Let queued jobs finish, then stop the worker.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!("Provisioning worker ended abnormally: {}", e);
            }
        }
    }

    fn next_generation(&self, simulation_id: &str) -> u64 {
        let mut entry = self
            .shared
            .generations
            .entry(simulation_id.to_string())
            .or_insert(0);
        *entry += 1;
        *entry
    }

    fn send(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::error!("Provisioning worker is not running, job dropped");
        }
    }
}

struct Worker {
    directory: Arc<HubDirectory>,
    config: ProvisioningConfig,
    shared: Arc<Shared>,
    /// Devices registered per simulation.
    placements: HashMap<String, Vec<Placement>>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Job>) {
        tracing::info!("Provisioning worker started");
        while let Some(job) = rx.recv().await {
            match job {
                Job::Provision {
                    simulation,
                    models,
                    generation,
                } => {
                    if !self.shared.is_current(&simulation.id, generation) {
                        tracing::debug!(simulation_id = %simulation.id, generation, "Skipping stale provision job");
                        continue;
                    }
                    let id = simulation.id.clone();
                    if let Err(e) = self.provision(simulation, models, generation).await {
                        tracing::error!(simulation_id = %id, error = %e, "Provisioning failed");
                        self.shared.set_status(
                            &id,
                            generation,
                            ProvisioningStatus::Failed {
                                reason: e.to_string(),
                            },
                        );
                    }
                }
                Job::Stop {
                    simulation_id,
                    generation,
                } => {
                    if !self.shared.is_current(&simulation_id, generation) {
                        tracing::debug!(%simulation_id, generation, "Skipping stale stop job");
                        continue;
                    }
                    self.stop(&simulation_id, generation).await;
                }
                Job::Shutdown => break,
            }
        }
        tracing::info!("Provisioning worker stopped");
    }

    async fn provision(
        &mut self,
        simulation: Simulation,
        models: Vec<DeviceModel>,
        generation: u64,
    ) -> Result<()> {
        let hubs = self.directory.hubs_for(&simulation)?;
        let by_id: HashMap<&str, &DeviceModel> =
            models.iter().map(|m| (m.id.as_str(), m)).collect();

        let mut skipped_models = Vec::new();
        let mut plan = Vec::new();
        for entry in &simulation.device_models {
            match by_id.get(entry.id.as_str()) {
                Some(model) => plan.push((*model, entry.count)),
                None => {
                    tracing::warn!(simulation_id = %simulation.id, model = %entry.id, "Unknown device model, skipping");
                    if !skipped_models.contains(&entry.id) {
                        skipped_models.push(entry.id.clone());
                    }
                }
            }
        }

        let per_hub: u64 = plan.iter().map(|(_, count)| u64::from(*count)).sum();
        let total = per_hub * hubs.len() as u64;
        let mut provisioned = 0;
        self.shared.set_status(
            &simulation.id,
            generation,
            ProvisioningStatus::Provisioning { provisioned, total },
        );

        let mut placed = Vec::new();
        for hub in &hubs {
            for (model, count) in &plan {
                for index in 0..*count {
                    if !self.shared.is_current(&simulation.id, generation) {
                        tracing::info!(simulation_id = %simulation.id, "Provisioning superseded");
                        self.remember(&simulation.id, placed);
                        return Ok(());
                    }
                    let device_id = format!("{}.{}", model.id, index);
                    if let Err(e) = self
                        .register_device(hub, &device_id, &simulation.id, model)
                        .await
                    {
                        self.remember(&simulation.id, placed);
                        return Err(e);
                    }
                    placed.push(Placement {
                        hub: Arc::clone(hub),
                        device_id,
                    });
                    provisioned += 1;
                    self.shared.set_status(
                        &simulation.id,
                        generation,
                        ProvisioningStatus::Provisioning { provisioned, total },
                    );
                }
            }
        }

        // Devices from an earlier run that the new layout no longer has.
        let keep: HashSet<(String, String)> = placed.iter().map(Placement::key).collect();
        let previous = self
            .placements
            .insert(simulation.id.clone(), placed)
            .unwrap_or_default();
        for old in previous.iter().filter(|p| !keep.contains(&p.key())) {
            self.release(old, &simulation.id).await;
        }

        tracing::info!(simulation_id = %simulation.id, devices = total, "Simulation running");
        self.shared.set_status(
            &simulation.id,
            generation,
            ProvisioningStatus::Running {
                devices: total,
                skipped_models,
            },
        );
        Ok(())
    }

    /// Track devices of an interrupted run so a later stop still reaches them.
    fn remember(&mut self, simulation_id: &str, placed: Vec<Placement>) {
        let known = self.placements.entry(simulation_id.to_string()).or_default();
        let existing: HashSet<(String, String)> = known.iter().map(Placement::key).collect();
        known.extend(placed.into_iter().filter(|p| !existing.contains(&p.key())));
    }

    async fn register_device(
        &self,
        hub: &Arc<dyn IotHubClient>,
        device_id: &str,
        simulation_id: &str,
        model: &DeviceModel,
    ) -> Result<()> {
        let device_tags = BTreeMap::from([
            (tags::IS_SIMULATED.to_string(), "Y".to_string()),
            (tags::SIMULATION_ID.to_string(), simulation_id.to_string()),
            (tags::DEVICE_MODEL.to_string(), model.id.clone()),
        ]);
        let properties = reported_properties(model);

        self.with_retry(device_id, move || {
            hub.create_or_update_device_twin(device_id, device_tags.clone())
        })
        .await?;
        self.with_retry(device_id, move || {
            hub.update_reported_properties(device_id, properties.clone())
        })
        .await?;
        self.with_retry(device_id, move || hub.set_connection_state(device_id, true))
            .await?;
        Ok(())
    }

    async fn with_retry<T, F, Fut>(&self, device_id: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.config.retry_backoff;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        device_id,
                        attempt,
                        error = %e,
                        "Twin write failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn stop(&mut self, simulation_id: &str, generation: u64) {
        let placed = self.placements.remove(simulation_id).unwrap_or_default();
        let mut released = 0;
        for placement in &placed {
            if self.release(placement, simulation_id).await {
                released += 1;
            }
        }
        tracing::info!(simulation_id, devices = released, "Simulation stopped");
        self.shared
            .set_status(simulation_id, generation, ProvisioningStatus::Stopped);
    }

    /// Disconnect a device unless another simulation has since tagged its
    /// twin. Returns whether the device was still owned by `simulation_id`.
    async fn release(&self, placement: &Placement, simulation_id: &str) -> bool {
        let twin = self
            .with_retry(&placement.device_id, || {
                placement.hub.get_twin(&placement.device_id)
            })
            .await;
        match twin {
            Ok(Some(twin)) if twin.tag(tags::SIMULATION_ID) == Some(simulation_id) => {
                self.disconnect(placement).await;
                true
            }
            Ok(Some(twin)) => {
                tracing::debug!(
                    device_id = %placement.device_id,
                    simulation_id,
                    owner = ?twin.tag(tags::SIMULATION_ID),
                    "Device belongs to another simulation, leaving it connected"
                );
                false
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(device_id = %placement.device_id, error = %e, "Could not read device twin");
                false
            }
        }
    }

    async fn disconnect(&self, placement: &Placement) {
        let result: std::result::Result<(), DeviceError> = self
            .with_retry(&placement.device_id, || {
                placement
                    .hub
                    .set_connection_state(&placement.device_id, false)
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(device_id = %placement.device_id, error = %e, "Could not disconnect device");
        }
    }
}

/// Reported properties a device publishes when it connects.
fn reported_properties(model: &DeviceModel) -> BTreeMap<String, Value> {
    let mut properties: BTreeMap<String, Value> = model
        .properties
        .iter()
        .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
        .collect();
    if let Some(protocol) = model.protocol {
        properties.insert(reported::PROTOCOL.to_string(), json!(protocol.as_str()));
    }
    properties.insert(reported::FIRMWARE.to_string(), json!(model.firmware()));
    let methods: Vec<&str> = model
        .cloud_to_device_methods
        .keys()
        .map(String::as_str)
        .collect();
    properties.insert(reported::SUPPORTED_METHODS.to_string(), json!(methods.join(",")));
    properties
}

#[cfg(test)]
mod tests {
    use devsim_core::stock_device_models;

    use super::*;

    #[test]
    fn test_status_wire_format() {
        let status = ProvisioningStatus::Running {
            devices: 5,
            skipped_models: vec!["ghost".into()],
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "Status": "Running", "Devices": 5, "SkippedModels": ["ghost"] })
        );
        assert_eq!(
            serde_json::to_value(ProvisioningStatus::Idle).unwrap(),
            json!({ "Status": "Idle" })
        );
    }

    #[test]
    fn test_reported_properties() {
        let truck = stock_device_models()
            .into_iter()
            .find(|m| m.id == "truck-01")
            .unwrap();
        let props = reported_properties(&truck);
        assert_eq!(props[reported::PROTOCOL], json!("MQTT"));
        assert_eq!(props[reported::FIRMWARE], json!("0.0.1"));
        assert_eq!(props["Type"], json!("Truck"));
        let methods = props[reported::SUPPORTED_METHODS].as_str().unwrap();
        assert!(methods.split(',').any(|m| m == "FirmwareUpdate"));
    }
}
