//! Simulation service: validation, versioned writes and lifecycle reactions.

use std::sync::Arc;

use chrono::Utc;
use devsim_core::{
    DEFAULT_SIMULATION_ID, DEFAULT_TEMPLATE, DeviceModel, Error, Result, Simulation,
    SimulationPatch, ValidationError, simulation_template, validate_patch, validate_simulation,
};
use devsim_devices::{HubDirectory, Provisioner, ProvisioningStatus};
use devsim_storage::{DeviceModelStore, SimulationStore};

use crate::lifecycle::LifecycleAction;

pub struct SimulationService {
    store: SimulationStore,
    device_models: DeviceModelStore,
    directory: Arc<HubDirectory>,
    provisioner: Arc<Provisioner>,
}

impl SimulationService {
    pub fn new(
        store: SimulationStore,
        device_models: DeviceModelStore,
        directory: Arc<HubDirectory>,
        provisioner: Arc<Provisioner>,
    ) -> Self {
        Self {
            store,
            device_models,
            directory,
            provisioner,
        }
    }

    pub async fn list(&self) -> Result<Vec<Simulation>> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Simulation> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Simulation {id}")))
    }

    pub async fn create(&self, simulation: Simulation) -> Result<Simulation> {
        self.check(&simulation)?;
        let saved = self.store.insert(simulation).await?;
        tracing::info!(id = %saved.id, enabled = saved.enabled, "Simulation created");
        self.react(LifecycleAction::for_write(None, &saved), &saved).await;
        Ok(saved)
    }

    /// Create simulation `1` from a named template, overridden by the
    /// non-empty members of `overrides`.
    pub async fn create_from_template(
        &self,
        overrides: Simulation,
        template: &str,
    ) -> Result<Simulation> {
        let base = simulation_template(template).ok_or_else(|| {
            ValidationError::new("template", format!("unknown template '{template}'"))
        })?;
        self.create(apply_overrides(base, overrides)).await
    }

    /// Replace simulation `id`, or create it when absent.
    pub async fn upsert(&self, id: &str, simulation: Simulation) -> Result<Simulation> {
        self.check(&simulation)?;
        let (saved, previous) = self.store.upsert(id, simulation).await?;
        tracing::info!(id = %saved.id, enabled = saved.enabled, "Simulation saved");
        self.react(LifecycleAction::for_write(previous.as_ref(), &saved), &saved)
            .await;
        Ok(saved)
    }

    /// Toggle `Enabled` on an existing simulation.
    pub async fn patch(&self, id: &str, patch: SimulationPatch) -> Result<Simulation> {
        validate_patch(&patch)?;
        let current = self.get(id).await?;
        if current.etag != patch.etag {
            return Err(Error::conflict(format!(
                "Simulation {id} has been modified, ETag {} is stale",
                patch.etag
            )));
        }

        let mut next = current.clone();
        next.enabled = patch.enabled.unwrap_or(current.enabled);
        let (saved, previous) = self.store.upsert(id, next).await?;
        tracing::info!(id = %saved.id, enabled = saved.enabled, "Simulation patched");
        self.react(LifecycleAction::for_write(previous.as_ref(), &saved), &saved)
            .await;
        Ok(saved)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.delete(id).await?;
        tracing::info!(id, "Simulation deleted");
        self.react(LifecycleAction::for_delete(&removed), &removed)
            .await;
        Ok(())
    }

    pub async fn provisioning_status(&self, id: &str) -> Result<ProvisioningStatus> {
        self.get(id).await?;
        Ok(self.provisioner.status(id))
    }

    /// Seed simulation `1` from the default template when it is missing.
    /// Returns true if it was created.
    pub async fn ensure_default_simulation(&self) -> Result<bool> {
        if self.store.get(DEFAULT_SIMULATION_ID).await?.is_some() {
            return Ok(false);
        }
        let Some(template) = simulation_template(DEFAULT_TEMPLATE) else {
            return Ok(false);
        };
        match self.store.insert(template).await {
            Ok(_) => {
                tracing::info!("Default simulation created");
                Ok(true)
            }
            // Created concurrently.
            Err(devsim_storage::Error::Conflict(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Queue provisioning for every stored enabled simulation.
    pub async fn resume_enabled(&self) -> Result<usize> {
        let mut resumed = 0;
        for simulation in self.store.list().await? {
            if simulation.enabled {
                self.react(LifecycleAction::Provision, &simulation).await;
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    fn check(&self, simulation: &Simulation) -> Result<()> {
        validate_simulation(simulation, Utc::now())?;
        self.directory.authenticate_all(simulation)?;
        Ok(())
    }

    async fn react(&self, action: LifecycleAction, simulation: &Simulation) {
        match action {
            LifecycleAction::None => {}
            LifecycleAction::Provision => {
                let models = self.referenced_models(simulation).await;
                self.provisioner.provision(simulation.clone(), models);
            }
            LifecycleAction::Stop => self.provisioner.stop(&simulation.id),
        }
    }

    /// Stored models the simulation references. Missing ones are reported by
    /// the provisioning status.
    async fn referenced_models(&self, simulation: &Simulation) -> Vec<DeviceModel> {
        let mut models = Vec::new();
        for entry in &simulation.device_models {
            match self.device_models.get(&entry.id).await {
                Ok(Some(model)) => models.push(model),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(model = %entry.id, error = %e, "Could not load device model")
                }
            }
        }
        models
    }
}

fn apply_overrides(mut base: Simulation, overrides: Simulation) -> Simulation {
    if let Some(name) = overrides.name.filter(|n| !n.trim().is_empty()) {
        base.name = Some(name);
    }
    if overrides.enabled {
        base.enabled = true;
    }
    if !overrides.device_models.is_empty() {
        base.device_models = overrides.device_models;
    }
    if overrides.start_time.is_some() {
        base.start_time = overrides.start_time;
    }
    if overrides.end_time.is_some() {
        base.end_time = overrides.end_time;
    }
    if overrides.iothub.is_some() {
        base.iothub = overrides.iothub;
    }
    if !overrides.iothubs.is_empty() {
        base.iothubs = overrides.iothubs;
    }
    base
}
