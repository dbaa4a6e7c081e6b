//! Device twins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag names written on every simulated device.
pub mod tags {
    pub const IS_SIMULATED: &str = "IsSimulated";
    pub const SIMULATION_ID: &str = "SimulationId";
    pub const DEVICE_MODEL: &str = "DeviceModel";
}

/// Reported property names.
pub mod reported {
    pub const PROTOCOL: &str = "Protocol";
    pub const FIRMWARE: &str = "Firmware";
    pub const SUPPORTED_METHODS: &str = "SupportedMethods";
    pub const FIRMWARE_UPDATE_STATUS: &str = "FirmwareUpdateStatus";
    pub const LAST_FIRMWARE_UPDATE: &str = "LastFirmwareUpdate";
}

/// Registry view of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Twin {
    pub device_id: String,
    pub tags: BTreeMap<String, String>,
    pub reported: BTreeMap<String, Value>,
    pub connected: bool,
    pub last_updated: DateTime<Utc>,
}

impl Twin {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            tags: BTreeMap::new(),
            reported: BTreeMap::new(),
            connected: false,
            last_updated: Utc::now(),
        }
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn reported_str(&self, name: &str) -> Option<&str> {
        self.reported.get(name).and_then(Value::as_str)
    }

    pub fn is_simulated(&self) -> bool {
        self.tag(tags::IS_SIMULATED) == Some("Y")
    }

    /// Methods the device registered when it was provisioned.
    pub fn supports_method(&self, method: &str) -> bool {
        self.reported_str(reported::SUPPORTED_METHODS)
            .map(|list| list.split(',').any(|m| m.trim() == method))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_supported_methods() {
        let mut twin = Twin::new("truck-01.0");
        assert!(!twin.supports_method("Reboot"));

        twin.reported.insert(
            reported::SUPPORTED_METHODS.to_string(),
            json!("FirmwareUpdate,Reboot"),
        );
        assert!(twin.supports_method("Reboot"));
        assert!(!twin.supports_method("Reb"));
    }

    #[test]
    fn test_is_simulated() {
        let mut twin = Twin::new("d");
        assert!(!twin.is_simulated());
        twin.tags.insert(tags::IS_SIMULATED.to_string(), "Y".to_string());
        assert!(twin.is_simulated());
    }
}
