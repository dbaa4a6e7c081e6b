//! Payload validation.
//!
//! Every write path runs these checks before touching the store. The first
//! failing member is reported with its path, e.g. `Telemetry[1].Interval`.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::model::{DeviceBehavior, DeviceModel, Script, Simulation, SimulationPatch, TelemetryRule};
use crate::time::{TimeExpression, parse_interval};

type Check = Result<(), ValidationError>;

/// Validate a device model.
pub fn validate_device_model(model: &DeviceModel) -> Check {
    if model.name.trim().is_empty() {
        return Err(ValidationError::new("Name", "must not be empty"));
    }
    if model.protocol.is_none() {
        return Err(ValidationError::new("Protocol", "is required (MQTT, AMQP or HTTP)"));
    }
    if model.model_type.is_none() {
        return Err(ValidationError::new("Type", "is required (Stock or Custom)"));
    }
    if model.telemetry.is_empty() {
        return Err(ValidationError::new("Telemetry", "must contain at least one rule"));
    }
    for (i, rule) in model.telemetry.iter().enumerate() {
        validate_telemetry_rule(&format!("Telemetry[{i}]"), rule)?;
    }
    if let Some(behavior) = &model.simulation {
        validate_behavior(behavior)?;
    }
    for (method, script) in &model.cloud_to_device_methods {
        if method.trim().is_empty() {
            return Err(ValidationError::new(
                "CloudToDeviceMethods",
                "method names must not be empty",
            ));
        }
        if let Some(script) = script {
            validate_script(&format!("CloudToDeviceMethods.{method}"), script)?;
        }
    }
    Ok(())
}

fn validate_telemetry_rule(path: &str, rule: &TelemetryRule) -> Check {
    validate_interval(&format!("{path}.Interval"), &rule.interval)?;

    if rule.message_template.trim().is_empty() {
        return Err(ValidationError::new(
            format!("{path}.MessageTemplate"),
            "must not be empty",
        ));
    }

    let schema = &rule.message_schema;
    if schema.name.trim().is_empty() {
        return Err(ValidationError::new(
            format!("{path}.MessageSchema.Name"),
            "must not be empty",
        ));
    }
    if schema.format.is_none() {
        return Err(ValidationError::new(
            format!("{path}.MessageSchema.Format"),
            "is required (JSON, CSV or Binary)",
        ));
    }
    if schema.fields.is_empty() {
        return Err(ValidationError::new(
            format!("{path}.MessageSchema.Fields"),
            "must declare at least one field",
        ));
    }
    if schema.fields.keys().any(|name| name.trim().is_empty()) {
        return Err(ValidationError::new(
            format!("{path}.MessageSchema.Fields"),
            "field names must not be empty",
        ));
    }
    Ok(())
}

fn validate_behavior(behavior: &DeviceBehavior) -> Check {
    validate_interval("Simulation.Interval", &behavior.interval)?;
    for (i, script) in behavior.scripts.iter().enumerate() {
        validate_script(&format!("Simulation.Scripts[{i}]"), script)?;
    }
    Ok(())
}

fn validate_script(path: &str, script: &Script) -> Check {
    if script.path.trim().is_empty() {
        return Err(ValidationError::new(format!("{path}.Path"), "must not be empty"));
    }
    Ok(())
}

fn validate_interval(path: &str, value: &str) -> Check {
    let interval = parse_interval(value).map_err(|e| ValidationError::new(path, e.to_string()))?;
    if interval.is_zero() {
        return Err(ValidationError::new(path, "must be greater than zero"));
    }
    Ok(())
}

/// Validate a simulation, resolving relative times against `now`.
pub fn validate_simulation(sim: &Simulation, now: DateTime<Utc>) -> Check {
    if sim.device_models.is_empty() {
        return Err(ValidationError::new(
            "DeviceModels",
            "must reference at least one device model",
        ));
    }
    for (i, entry) in sim.device_models.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(ValidationError::new(
                format!("DeviceModels[{i}].Id"),
                "must not be empty",
            ));
        }
    }
    if sim.total_devices() == 0 {
        return Err(ValidationError::new(
            "DeviceModels",
            "total device count must be greater than zero",
        ));
    }

    let start = resolve_time("StartTime", sim.start_time.as_deref(), now)?;
    let end = resolve_time("EndTime", sim.end_time.as_deref(), now)?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::new("EndTime", "must not precede StartTime"));
        }
    }

    for (i, hub) in sim.hubs().into_iter().enumerate() {
        let path = if i == 0 && sim.iothub.is_some() {
            "IoTHub.ConnectionString".to_string()
        } else {
            let offset = usize::from(sim.iothub.is_some());
            format!("IoTHubs[{}].ConnectionString", i - offset)
        };
        hub.target()
            .map_err(|e| ValidationError::new(path, e.to_string()))?;
    }
    Ok(())
}

fn resolve_time(
    field: &str,
    value: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let expr = TimeExpression::parse(value).map_err(|e| ValidationError::new(field, e.to_string()))?;
    expr.resolve(now)
        .map(Some)
        .ok_or_else(|| ValidationError::new(field, "is out of range"))
}

/// Validate a `PATCH` body.
pub fn validate_patch(patch: &SimulationPatch) -> Check {
    if patch.enabled.is_none() {
        return Err(ValidationError::new("Enabled", "is required"));
    }
    Ok(())
}
