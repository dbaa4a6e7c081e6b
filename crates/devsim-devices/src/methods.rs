//! Cloud-to-device methods answered by simulated devices.
//!
//! `FirmwareUpdate` acknowledges at once and then walks the reported
//! `FirmwareUpdateStatus` through its stages in the background. `Reboot` is
//! acknowledged without touching the twin. Any other declared method echoes
//! its payload.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::twin::{Twin, reported};

pub const FIRMWARE_UPDATE: &str = "FirmwareUpdate";
pub const REBOOT: &str = "Reboot";

/// Stages of a firmware update, in order.
pub mod firmware_status {
    pub const DOWNLOADING: &str = "Downloading";
    pub const APPLYING: &str = "Applying";
    pub const COMPLETED: &str = "Completed";
}

/// Outcome of a direct method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MethodResult {
    pub status: u16,
    pub payload: Value,
}

impl MethodResult {
    pub fn ok(payload: Value) -> Self {
        Self {
            status: 200,
            payload,
        }
    }
}

/// Behavior of every simulated device registered on one hub.
pub(crate) struct DeviceMethods {
    twins: Arc<DashMap<String, Twin>>,
    firmware_step: Duration,
}

impl DeviceMethods {
    pub(crate) fn new(twins: Arc<DashMap<String, Twin>>, firmware_step: Duration) -> Self {
        Self {
            twins,
            firmware_step,
        }
    }

    /// Run a method the device is known to support.
    pub(crate) fn invoke(&self, device_id: &str, method: &str, payload: Value) -> MethodResult {
        match method {
            FIRMWARE_UPDATE => self.firmware_update(device_id, &payload),
            REBOOT => {
                tracing::info!(device_id, "Simulated device rebooting");
                MethodResult::ok(json!({ "Message": "Rebooting" }))
            }
            _ => MethodResult::ok(payload),
        }
    }

    fn firmware_update(&self, device_id: &str, payload: &Value) -> MethodResult {
        let current = self
            .twins
            .get(device_id)
            .and_then(|twin| twin.reported_str(reported::FIRMWARE).map(str::to_string))
            .unwrap_or_else(|| "1.0.0".to_string());
        let target = payload
            .get("Firmware")
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| bump_version(&current));

        report(
            &self.twins,
            device_id,
            [(reported::FIRMWARE_UPDATE_STATUS, json!(firmware_status::DOWNLOADING))],
        );

        let twins = Arc::clone(&self.twins);
        let step = self.firmware_step;
        let device = device_id.to_string();
        let version = target.clone();
        tokio::spawn(async move {
            tokio::time::sleep(step).await;
            report(
                &twins,
                &device,
                [(reported::FIRMWARE_UPDATE_STATUS, json!(firmware_status::APPLYING))],
            );
            tokio::time::sleep(step).await;
            report(
                &twins,
                &device,
                [
                    (reported::FIRMWARE_UPDATE_STATUS, json!(firmware_status::COMPLETED)),
                    (reported::FIRMWARE, json!(version)),
                    (reported::LAST_FIRMWARE_UPDATE, json!(Utc::now().to_rfc3339())),
                ],
            );
            tracing::info!(device_id = %device, firmware = %version, "Firmware update completed");
        });

        MethodResult::ok(json!({
            "Message": format!("Firmware update from {current} to {target} started")
        }))
    }
}

/// Merge reported properties into a twin, ignoring devices removed meanwhile.
fn report<const N: usize>(
    twins: &DashMap<String, Twin>,
    device_id: &str,
    properties: [(&str, Value); N],
) {
    if let Some(mut twin) = twins.get_mut(device_id) {
        let updates: BTreeMap<String, Value> = properties
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        twin.reported.extend(updates);
        twin.last_updated = Utc::now();
    }
}

/// `1.0.0` -> `1.0.1`. Versions without a numeric tail get `.1` appended.
pub fn bump_version(version: &str) -> String {
    match version.rsplit_once('.') {
        Some((head, tail)) => match tail.parse::<u64>() {
            Ok(n) => format!("{head}.{}", n + 1),
            Err(_) => format!("{version}.1"),
        },
        None => match version.parse::<u64>() {
            Ok(n) => (n + 1).to_string(),
            Err(_) => format!("{version}.1"),
        },
    }
}
