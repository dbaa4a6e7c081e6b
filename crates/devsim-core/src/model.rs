//! Device models and simulations.
//!
//! Field names on the wire are PascalCase (`ETag`, `DeviceModels`, `IoTHub`)
//! and must round-trip exactly: whatever a client submits for a known member
//! is echoed back unchanged, only `Id` and `ETag` are service-assigned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Id of the simulation the service manages by default.
pub const DEFAULT_SIMULATION_ID: &str = "1";

/// Transport a simulated device speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "MQTT")]
    Mqtt,
    #[serde(rename = "AMQP")]
    Amqp,
    #[serde(rename = "HTTP")]
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mqtt => "MQTT",
            Self::Amqp => "AMQP",
            Self::Http => "HTTP",
        }
    }
}

/// Where a device model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceModelType {
    /// Built-in catalog entry. Cannot be deleted.
    Stock,
    /// Created through the API.
    Custom,
}

/// Encoding of a telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageFormat {
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "CSV")]
    Csv,
    Binary,
}

/// Type of a single telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Integer,
    Double,
    Text,
    Boolean,
    DateTime,
    Object,
    Binary,
    GeoLocation,
}

/// A scalar device property or state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Kind of script driving device behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "internal")]
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Script {
    #[serde(rename = "Type")]
    pub script_type: ScriptType,
    #[serde(default)]
    pub path: String,
}

impl Script {
    pub fn javascript(path: impl Into<String>) -> Self {
        Self {
            script_type: ScriptType::JavaScript,
            path: path.into(),
        }
    }
}

/// Shape of a telemetry message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<MessageFormat>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldKind>,
}

/// One periodic telemetry message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetryRule {
    /// `[d.]hh:mm:ss[.fffffff]`, must be positive.
    #[serde(default)]
    pub interval: String,
    /// Message body with `${field}` placeholders.
    #[serde(default)]
    pub message_template: String,
    #[serde(default)]
    pub message_schema: MessageSchema,
}

/// How the device state evolves between telemetry messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceBehavior {
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub initial_state: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub scripts: Vec<Script>,
}

/// A reusable device template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceModel {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<DeviceModelType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<DeviceBehavior>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub telemetry: Vec<TelemetryRule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cloud_to_device_methods: BTreeMap<String, Option<Script>>,
}

impl DeviceModel {
    pub fn is_stock(&self) -> bool {
        self.model_type == Some(DeviceModelType::Stock)
    }

    /// True if the model declares the named cloud-to-device method.
    pub fn declares_method(&self, method: &str) -> bool {
        self.cloud_to_device_methods.contains_key(method)
    }

    /// Firmware version reported by freshly provisioned devices.
    pub fn firmware(&self) -> &str {
        self.version.as_deref().unwrap_or("1.0.0")
    }
}

/// How many devices of one model a simulation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceModelRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub count: u32,
}

impl DeviceModelRef {
    pub fn new(id: impl Into<String>, count: u32) -> Self {
        Self {
            id: id.into(),
            count,
        }
    }
}

/// Target IoT Hub: `"default"` or a full connection string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IotHubDescriptor {
    #[serde(default)]
    pub connection_string: String,
}

impl IotHubDescriptor {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    pub fn default_hub() -> Self {
        Self::new("default")
    }
}

/// A configured run of simulated devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Simulation {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub device_models: Vec<DeviceModelRef>,
    #[serde(rename = "IoTHub", default, skip_serializing_if = "Option::is_none")]
    pub iothub: Option<IotHubDescriptor>,
    #[serde(rename = "IoTHubs", default, skip_serializing_if = "Vec::is_empty")]
    pub iothubs: Vec<IotHubDescriptor>,
}

impl Simulation {
    /// Every hub the simulation targets, the singular `IoTHub` first.
    pub fn hubs(&self) -> Vec<&IotHubDescriptor> {
        self.iothub.iter().chain(self.iothubs.iter()).collect()
    }

    /// Sum of device counts across all referenced models.
    pub fn total_devices(&self) -> u64 {
        self.device_models.iter().map(|m| u64::from(m.count)).sum()
    }
}

/// Body of `PATCH /v1/simulations/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimulationPatch {
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_device_model_wire_names() {
        let model: DeviceModel = serde_json::from_value(json!({
            "Id": "m",
            "ETag": "e",
            "Name": "chiller",
            "Protocol": "MQTT",
            "Type": "Custom",
            "Telemetry": [],
            "CloudToDeviceMethods": { "Reboot": null }
        }))
        .unwrap();

        assert_eq!(model.protocol, Some(Protocol::Mqtt));
        assert_eq!(model.model_type, Some(DeviceModelType::Custom));
        assert!(model.declares_method("Reboot"));
        assert!(model.properties.is_empty());

        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["ETag"], "e");
        assert_eq!(value["Type"], "Custom");
        assert!(value.get("Description").is_none());
    }

    #[test]
    fn test_unknown_protocol_does_not_decode() {
        let result = serde_json::from_value::<DeviceModel>(json!({
            "Name": "x",
            "Protocol": "MMQQTT"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_property_value_untagged() {
        let props: BTreeMap<String, PropertyValue> = serde_json::from_value(json!({
            "a": true, "b": 3, "c": 2.5, "d": "text"
        }))
        .unwrap();
        assert_eq!(props["a"], PropertyValue::Boolean(true));
        assert_eq!(props["b"], PropertyValue::Integer(3));
        assert_eq!(props["c"], PropertyValue::Double(2.5));
        assert_eq!(props["d"], PropertyValue::Text("text".into()));
    }

    #[test]
    fn test_simulation_wire_names() {
        let sim: Simulation = serde_json::from_value(json!({
            "ETag": "etag",
            "Enabled": false,
            "Name": "simulation test",
            "DeviceModels": [{ "Id": "model_1", "Count": 150 }],
            "IoTHub": { "ConnectionString": "default" }
        }))
        .unwrap();

        assert_eq!(sim.total_devices(), 150);
        assert_eq!(sim.hubs().len(), 1);
        assert_eq!(sim.hubs()[0].connection_string, "default");

        let value = serde_json::to_value(&sim).unwrap();
        assert_eq!(value["IoTHub"]["ConnectionString"], "default");
        assert!(value.get("IoTHubs").is_none());
        assert!(value.get("StartTime").is_none());
    }

    #[test]
    fn test_negative_count_does_not_decode() {
        let result = serde_json::from_value::<Simulation>(json!({
            "DeviceModels": [{ "Id": "m", "Count": -1 }]
        }));
        assert!(result.is_err());
    }
}
