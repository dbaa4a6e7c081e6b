//! Built-in device model catalog and simulation templates.

use std::collections::BTreeMap;

use crate::model::{
    DEFAULT_SIMULATION_ID, DeviceBehavior, DeviceModel, DeviceModelRef, DeviceModelType,
    FieldKind, IotHubDescriptor, MessageFormat, MessageSchema, PropertyValue, Protocol, Script,
    Simulation, TelemetryRule,
};

/// Name of the only simulation template.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Ids of the stock device models, in catalog order.
pub const STOCK_MODEL_IDS: [&str; 10] = [
    "chiller-01",
    "chiller-02",
    "elevator-01",
    "elevator-02",
    "engine-01",
    "engine-02",
    "prototype-01",
    "prototype-02",
    "truck-01",
    "truck-02",
];

pub fn is_stock_model_id(id: &str) -> bool {
    STOCK_MODEL_IDS.contains(&id)
}

/// Build a simulation from a named template.
pub fn simulation_template(name: &str) -> Option<Simulation> {
    if name != DEFAULT_TEMPLATE {
        return None;
    }
    Some(Simulation {
        id: DEFAULT_SIMULATION_ID.to_string(),
        etag: String::new(),
        name: Some("Default simulation".to_string()),
        enabled: false,
        start_time: None,
        end_time: None,
        device_models: STOCK_MODEL_IDS
            .iter()
            .map(|id| DeviceModelRef::new(*id, 1))
            .collect(),
        iothub: Some(IotHubDescriptor::default_hub()),
        iothubs: Vec::new(),
    })
}

/// The full stock catalog.
pub fn stock_device_models() -> Vec<DeviceModel> {
    vec![
        chiller("chiller-01", "Chiller", "Chiller with external temperature, humidity and pressure sensors.", "Building 43", Protocol::Mqtt),
        chiller("chiller-02", "Faulty chiller", "Chiller whose pressure drifts out of range.", "Building 2", Protocol::Amqp),
        elevator("elevator-01", "Elevator", "Elevator reporting floor and vibration.", "Building 40", Protocol::Mqtt),
        elevator("elevator-02", "Faulty elevator", "Elevator with abnormal vibration.", "Building 12", Protocol::Http),
        engine("engine-01", "Engine", "Engine reporting fuel level, coolant and vibration.", Protocol::Amqp),
        engine("engine-02", "Faulty engine", "Engine with an empty tank.", Protocol::Mqtt),
        prototype("prototype-01", "Prototype", "Prototype device with GPS and temperature sensors.", Protocol::Mqtt),
        prototype("prototype-02", "Faulty prototype", "Prototype whose temperature keeps rising.", Protocol::Http),
        truck("truck-01", "Truck", "Truck reporting location, speed and cargo temperature.", Protocol::Mqtt),
        truck("truck-02", "Faulty truck", "Truck with a failing cargo cooler.", Protocol::Amqp),
    ]
}

fn chiller(id: &str, name: &str, description: &str, location: &str, protocol: Protocol) -> DeviceModel {
    base(id, name, description, protocol)
        .properties(&[
            ("Type", "Chiller".into()),
            ("Location", location.into()),
            ("Latitude", 47.638928.into()),
            ("Longitude", (-122.13476).into()),
        ])
        .state(&[
            ("online", true.into()),
            ("temperature", 75.0.into()),
            ("temperature_unit", "F".into()),
            ("humidity", 70.0.into()),
            ("humidity_unit", "%".into()),
            ("pressure", 150.0.into()),
            ("pressure_unit", "psig".into()),
        ])
        .telemetry(
            "00:00:10",
            r#"{"temperature":${temperature},"temperature_unit":"${temperature_unit}"}"#,
            "chiller-temperature;v1",
            &[("temperature", FieldKind::Double), ("temperature_unit", FieldKind::Text)],
        )
        .telemetry(
            "00:00:10",
            r#"{"humidity":${humidity},"humidity_unit":"${humidity_unit}"}"#,
            "chiller-humidity;v1",
            &[("humidity", FieldKind::Double), ("humidity_unit", FieldKind::Text)],
        )
        .telemetry(
            "00:00:10",
            r#"{"pressure":${pressure},"pressure_unit":"${pressure_unit}"}"#,
            "chiller-pressure;v1",
            &[("pressure", FieldKind::Double), ("pressure_unit", FieldKind::Text)],
        )
        .method("IncreasePressure")
        .method("DecreasePressure")
        .build("chiller-01-state.js")
}

fn elevator(id: &str, name: &str, description: &str, location: &str, protocol: Protocol) -> DeviceModel {
    base(id, name, description, protocol)
        .properties(&[
            ("Type", "Elevator".into()),
            ("Location", location.into()),
            ("MaxFloor", 15_i64.into()),
        ])
        .state(&[
            ("online", true.into()),
            ("floor", 1_i64.into()),
            ("vibration", 1.0.into()),
            ("vibration_unit", "mm".into()),
            ("moving", true.into()),
        ])
        .telemetry(
            "00:00:05",
            r#"{"floor":${floor},"vibration":${vibration},"vibration_unit":"${vibration_unit}"}"#,
            "elevator;v1",
            &[
                ("floor", FieldKind::Integer),
                ("vibration", FieldKind::Double),
                ("vibration_unit", FieldKind::Text),
            ],
        )
        .method("StopElevator")
        .method("StartElevator")
        .build("elevator-01-state.js")
}

fn engine(id: &str, name: &str, description: &str, protocol: Protocol) -> DeviceModel {
    base(id, name, description, protocol)
        .properties(&[("Type", "Engine".into()), ("Location", "Field".into())])
        .state(&[
            ("online", true.into()),
            ("fuellevel", 70.0.into()),
            ("fuellevel_unit", "Gal".into()),
            ("coolant", 7500.0.into()),
            ("coolant_unit", "ohm".into()),
            ("vibration", 10.0.into()),
            ("vibration_unit", "mm".into()),
        ])
        .telemetry(
            "00:00:05",
            r#"{"fuellevel":${fuellevel},"fuellevel_unit":"${fuellevel_unit}","coolant":${coolant},"coolant_unit":"${coolant_unit}"}"#,
            "engine-fuel;v1",
            &[
                ("fuellevel", FieldKind::Double),
                ("fuellevel_unit", FieldKind::Text),
                ("coolant", FieldKind::Double),
                ("coolant_unit", FieldKind::Text),
            ],
        )
        .telemetry(
            "00:00:05",
            r#"{"vibration":${vibration},"vibration_unit":"${vibration_unit}"}"#,
            "engine-vibration;v1",
            &[("vibration", FieldKind::Double), ("vibration_unit", FieldKind::Text)],
        )
        .method("EmptyTank")
        .method("FillTank")
        .build("engine-01-state.js")
}

fn prototype(id: &str, name: &str, description: &str, protocol: Protocol) -> DeviceModel {
    base(id, name, description, protocol)
        .properties(&[("Type", "Prototype".into()), ("Location", "Lab".into())])
        .state(&[
            ("online", true.into()),
            ("temperature", 65.0.into()),
            ("temperature_unit", "F".into()),
            ("pressure", 150.0.into()),
            ("pressure_unit", "psig".into()),
            ("latitude", 47.476075.into()),
            ("longitude", (-122.192026).into()),
        ])
        .telemetry(
            "00:00:05",
            r#"{"temperature":${temperature},"temperature_unit":"${temperature_unit}","pressure":${pressure},"pressure_unit":"${pressure_unit}"}"#,
            "prototype-sensors;v1",
            &[
                ("temperature", FieldKind::Double),
                ("temperature_unit", FieldKind::Text),
                ("pressure", FieldKind::Double),
                ("pressure_unit", FieldKind::Text),
            ],
        )
        .telemetry(
            "00:00:05",
            r#"{"latitude":${latitude},"longitude":${longitude}}"#,
            "prototype-geolocation;v1",
            &[("latitude", FieldKind::Double), ("longitude", FieldKind::Double)],
        )
        .method("IncreaseTemperature")
        .method("DecreaseTemperature")
        .build("prototype-01-state.js")
}

fn truck(id: &str, name: &str, description: &str, protocol: Protocol) -> DeviceModel {
    base(id, name, description, protocol)
        .properties(&[("Type", "Truck".into()), ("Location", "Field".into())])
        .state(&[
            ("online", true.into()),
            ("latitude", 47.445301.into()),
            ("longitude", (-122.296307).into()),
            ("speed", 80.0.into()),
            ("speed_unit", "mph".into()),
            ("temperature", 38.0.into()),
            ("temperature_unit", "F".into()),
        ])
        .telemetry(
            "00:00:03",
            r#"{"latitude":${latitude},"longitude":${longitude}}"#,
            "truck-geolocation;v1",
            &[("latitude", FieldKind::Double), ("longitude", FieldKind::Double)],
        )
        .telemetry(
            "00:00:05",
            r#"{"speed":${speed},"speed_unit":"${speed_unit}"}"#,
            "truck-speed;v1",
            &[("speed", FieldKind::Double), ("speed_unit", FieldKind::Text)],
        )
        .telemetry(
            "00:00:05",
            r#"{"temperature":${temperature},"temperature_unit":"${temperature_unit}"}"#,
            "truck-cargotemperature;v1",
            &[("temperature", FieldKind::Double), ("temperature_unit", FieldKind::Text)],
        )
        .method("IncreaseCargoTemperature")
        .method("DecreaseCargoTemperature")
        .build("truck-01-state.js")
}

fn base(id: &str, name: &str, description: &str, protocol: Protocol) -> StockModel {
    StockModel {
        model: DeviceModel {
            id: id.to_string(),
            etag: String::new(),
            name: name.to_string(),
            description: Some(description.to_string()),
            version: Some("0.0.1".to_string()),
            protocol: Some(protocol),
            model_type: Some(DeviceModelType::Stock),
            simulation: None,
            properties: BTreeMap::new(),
            telemetry: Vec::new(),
            cloud_to_device_methods: BTreeMap::new(),
        },
        initial_state: BTreeMap::new(),
    }
}

struct StockModel {
    model: DeviceModel,
    initial_state: BTreeMap<String, PropertyValue>,
}

impl StockModel {
    fn properties(mut self, values: &[(&str, PropertyValue)]) -> Self {
        self.model
            .properties
            .extend(values.iter().map(|(k, v)| (k.to_string(), v.clone())));
        self
    }

    fn state(mut self, values: &[(&str, PropertyValue)]) -> Self {
        self.initial_state
            .extend(values.iter().map(|(k, v)| (k.to_string(), v.clone())));
        self
    }

    fn telemetry(
        mut self,
        interval: &str,
        template: &str,
        schema: &str,
        fields: &[(&str, FieldKind)],
    ) -> Self {
        self.model.telemetry.push(TelemetryRule {
            interval: interval.to_string(),
            message_template: template.to_string(),
            message_schema: MessageSchema {
                name: schema.to_string(),
                format: Some(MessageFormat::Json),
                fields: fields.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            },
        });
        self
    }

    fn method(mut self, name: &str) -> Self {
        self.model.cloud_to_device_methods.insert(
            name.to_string(),
            Some(Script::javascript(format!("{name}-method.js"))),
        );
        self
    }

    /// Adds the methods every stock model answers and the behavior script.
    fn build(self, script: &str) -> DeviceModel {
        let mut stock = self.method("FirmwareUpdate").method("Reboot");
        stock.model.simulation = Some(DeviceBehavior {
            interval: "00:00:10".to_string(),
            initial_state: stock.initial_state,
            scripts: vec![Script::javascript(script)],
        });
        stock.model
    }
}
