//! IoT Hub client seam and the in-process hub.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use devsim_core::{IotHubConnectionString, SasToken};
use serde_json::Value;

use crate::error::{DeviceError, Result};
use crate::methods::{DeviceMethods, MethodResult};
use crate::twin::Twin;

/// Host name of the hub created when no connection string is configured.
pub const LOCAL_HUB_HOST: &str = "devsim.local";

/// Operations the simulation needs from an IoT Hub registry.
#[async_trait]
pub trait IotHubClient: Send + Sync {
    /// Host name the hub answers to.
    fn host_name(&self) -> &str;

    /// Check a shared access signature against the hub's own key.
    fn authenticate(&self, token: &SasToken) -> Result<()>;

    /// Register the device if needed and merge `tags` into its twin.
    async fn create_or_update_device_twin(
        &self,
        device_id: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<Twin>;

    async fn get_twin(&self, device_id: &str) -> Result<Option<Twin>>;

    async fn update_reported_properties(
        &self,
        device_id: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<()>;

    async fn set_connection_state(&self, device_id: &str, connected: bool) -> Result<()>;

    async fn invoke_device_method(
        &self,
        device_id: &str,
        method: &str,
        payload: Value,
    ) -> Result<MethodResult>;
}

/// An IoT Hub registry living in this process.
pub struct InMemoryIotHub {
    connection: IotHubConnectionString,
    twins: Arc<DashMap<String, Twin>>,
    methods: DeviceMethods,
    pending_failures: AtomicU32,
}

impl InMemoryIotHub {
    pub fn new(connection: IotHubConnectionString, firmware_step: Duration) -> Self {
        let twins = Arc::new(DashMap::new());
        tracing::info!(host = %connection.host_name, "IoT Hub registry initialized");
        Self {
            methods: DeviceMethods::new(Arc::clone(&twins), firmware_step),
            connection,
            twins,
            pending_failures: AtomicU32::new(0),
        }
    }

    /// A hub with a freshly generated key.
    pub fn local(firmware_step: Duration) -> Self {
        let key = uuid::Uuid::new_v4();
        Self::new(
            IotHubConnectionString::new(LOCAL_HUB_HOST, "iothubowner", key.as_bytes()),
            firmware_step,
        )
    }

    pub fn connection_string(&self) -> &IotHubConnectionString {
        &self.connection
    }

    pub fn device_count(&self) -> usize {
        self.twins.len()
    }

    /// Twins whose tag `name` equals `value`.
    pub fn twins_tagged(&self, name: &str, value: &str) -> Vec<Twin> {
        self.twins
            .iter()
            .filter(|entry| entry.tag(name) == Some(value))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Make the next `count` twin writes fail with a transient error.
    pub fn inject_write_failures(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn check_write(&self, device_id: &str) -> Result<()> {
        let failed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DeviceError::Hub(format!(
                "throttled while writing twin {device_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IotHubClient for InMemoryIotHub {
    fn host_name(&self) -> &str {
        &self.connection.host_name
    }

    fn authenticate(&self, token: &SasToken) -> Result<()> {
        if !token
            .resource
            .eq_ignore_ascii_case(&self.connection.host_name)
        {
            return Err(DeviceError::Authentication(format!(
                "token issued for {} presented to {}",
                token.resource, self.connection.host_name
            )));
        }
        if !token.verify(self.connection.key(), Utc::now()) {
            return Err(DeviceError::Authentication(format!(
                "signature rejected by {}",
                self.connection.host_name
            )));
        }
        Ok(())
    }

    async fn create_or_update_device_twin(
        &self,
        device_id: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<Twin> {
        self.check_write(device_id)?;
        let mut twin = self
            .twins
            .entry(device_id.to_string())
            .or_insert_with(|| Twin::new(device_id));
        twin.tags.extend(tags);
        twin.last_updated = Utc::now();
        Ok(twin.clone())
    }

    async fn get_twin(&self, device_id: &str) -> Result<Option<Twin>> {
        Ok(self.twins.get(device_id).map(|twin| twin.clone()))
    }

    async fn update_reported_properties(
        &self,
        device_id: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<()> {
        self.check_write(device_id)?;
        let mut twin = self
            .twins
            .get_mut(device_id)
            .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))?;
        twin.reported.extend(properties);
        twin.last_updated = Utc::now();
        Ok(())
    }

    async fn set_connection_state(&self, device_id: &str, connected: bool) -> Result<()> {
        let mut twin = self
            .twins
            .get_mut(device_id)
            .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))?;
        twin.connected = connected;
        twin.last_updated = Utc::now();
        Ok(())
    }

    async fn invoke_device_method(
        &self,
        device_id: &str,
        method: &str,
        payload: Value,
    ) -> Result<MethodResult> {
        let twin = self
            .twins
            .get(device_id)
            .map(|twin| twin.clone())
            .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))?;
        if !twin.connected {
            return Err(DeviceError::Offline(device_id.to_string()));
        }
        if !twin.supports_method(method) {
            return Err(DeviceError::MethodNotImplemented {
                device_id: device_id.to_string(),
                method: method.to_string(),
            });
        }

        tracing::debug!(device_id, method, "Invoking device method");
        Ok(self.methods.invoke(device_id, method, payload))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::twin::reported;

    async fn hub_with_device(connected: bool) -> InMemoryIotHub {
        let hub = InMemoryIotHub::local(Duration::from_millis(5));
        hub.create_or_update_device_twin("chiller-01.0", BTreeMap::new())
            .await
            .unwrap();
        hub.update_reported_properties(
            "chiller-01.0",
            BTreeMap::from([(
                reported::SUPPORTED_METHODS.to_string(),
                json!("FirmwareUpdate,Reboot"),
            )]),
        )
        .await
        .unwrap();
        hub.set_connection_state("chiller-01.0", connected)
            .await
            .unwrap();
        hub
    }

    #[tokio::test]
    async fn test_twin_upsert_is_idempotent() {
        let hub = InMemoryIotHub::local(Duration::ZERO);
        let tags = BTreeMap::from([("IsSimulated".to_string(), "Y".to_string())]);
        hub.create_or_update_device_twin("d", tags.clone()).await.unwrap();
        let twin = hub.create_or_update_device_twin("d", tags).await.unwrap();

        assert_eq!(hub.device_count(), 1);
        assert!(twin.is_simulated());
        assert!(!twin.connected);
        assert_eq!(hub.twins_tagged("IsSimulated", "Y").len(), 1);
    }

    #[tokio::test]
    async fn test_reported_on_unknown_device() {
        let hub = InMemoryIotHub::local(Duration::ZERO);
        let err = hub
            .update_reported_properties("ghost", BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::NotFound("ghost".into()));
    }

    #[tokio::test]
    async fn test_invoke_method_statuses() {
        let hub = hub_with_device(true).await;

        let ok = hub
            .invoke_device_method("chiller-01.0", "Reboot", Value::Null)
            .await
            .unwrap();
        assert_eq!(ok.status, 200);

        let missing = hub
            .invoke_device_method("chiller-01.9", "Reboot", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(missing.status(), 404);

        let undeclared = hub
            .invoke_device_method("chiller-01.0", "SelfDestruct", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(undeclared.status(), 501);
    }

    #[tokio::test]
    async fn test_offline_device_does_not_answer() {
        let hub = hub_with_device(false).await;
        let err = hub
            .invoke_device_method("chiller-01.0", "Reboot", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Offline(_)));
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient() {
        let hub = InMemoryIotHub::local(Duration::ZERO);
        hub.inject_write_failures(1);

        let err = hub
            .create_or_update_device_twin("d", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(hub.create_or_update_device_twin("d", BTreeMap::new()).await.is_ok());
    }

    #[test]
    fn test_authenticate() {
        let hub = InMemoryIotHub::local(Duration::ZERO);
        let expiry = Utc::now() + chrono::Duration::hours(1);

        let token = hub.connection_string().sas_token(expiry);
        assert!(hub.authenticate(&token).is_ok());

        let forged = IotHubConnectionString::new(LOCAL_HUB_HOST, "iothubowner", b"wrong key");
        let err = hub.authenticate(&forged.sas_token(expiry)).unwrap_err();
        assert!(matches!(err, DeviceError::Authentication(_)));
    }
}
