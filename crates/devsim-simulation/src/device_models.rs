//! Device model service.

use devsim_core::{
    DeviceModel, DeviceModelType, Error, Result, ValidationError, is_stock_model_id,
    stock_device_models, validate_device_model,
};
use devsim_storage::DeviceModelStore;

pub struct DeviceModelService {
    store: DeviceModelStore,
}

impl DeviceModelService {
    pub fn new(store: DeviceModelStore) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<DeviceModel>> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: &str) -> Result<DeviceModel> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("DeviceModel {id}")))
    }

    pub async fn create(&self, model: DeviceModel) -> Result<DeviceModel> {
        check(&model.id, &model)?;
        let saved = self.store.insert(model).await?;
        tracing::info!(id = %saved.id, "Device model created");
        Ok(saved)
    }

    pub async fn upsert(&self, id: &str, model: DeviceModel) -> Result<DeviceModel> {
        check(id, &model)?;
        let (saved, _) = self.store.upsert(id, model).await?;
        tracing::info!(id = %saved.id, "Device model saved");
        Ok(saved)
    }

    /// Delete a custom model. Stock models are refused.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        tracing::info!(id, "Device model deleted");
        Ok(())
    }

    /// Store every stock model that is not stored yet.
    pub async fn seed_stock_models(&self) -> Result<usize> {
        Ok(self.store.seed(stock_device_models()).await?)
    }
}

fn check(id: &str, model: &DeviceModel) -> Result<()> {
    validate_device_model(model)?;
    if model.model_type == Some(DeviceModelType::Stock) && !is_stock_model_id(id) {
        return Err(ValidationError::new("Type", "only built-in models can be Stock").into());
    }
    Ok(())
}
