// Apartment document returned by `api/v1/apartment`.
//
// The document is JSON:API flavoured: every entity is `{ id, attributes }` and
// the related entities live under `included`. Fields use `#[serde(default)]`
// liberally because older firmware omits whole sections.

use serde::{Deserialize, Serialize};

use super::lenient;

// ── Apartment ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: String,
    #[serde(default)]
    pub attributes: ApartmentAttributes,
    #[serde(default)]
    pub included: ApartmentIncluded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApartmentAttributes {
    pub name: String,
    pub zones: Vec<String>,
    #[serde(rename = "dsDevices")]
    pub devices: Vec<String>,
    pub clusters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApartmentIncluded {
    pub installation: Option<Installation>,
    #[serde(rename = "dsDevices")]
    pub devices: Vec<Device>,
    pub submodules: Vec<Submodule>,
    pub function_blocks: Vec<FunctionBlock>,
    pub zones: Vec<Zone>,
    pub meterings: Vec<Metering>,
    pub controllers: Vec<Controller>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: InstallationAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallationAttributes {
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

// ── Devices & submodules ─────────────────────────────────────────────

/// A physical dS device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub attributes: DeviceAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceAttributes {
    pub name: String,
    pub dsid: Option<String>,
    pub display_id: Option<String>,
    pub present: bool,
    pub submodules: Vec<String>,
    pub zone: Option<String>,
    pub scenarios: Vec<String>,
    pub controller: Option<String>,
}

/// A logical unit of a device, linking it to its function blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submodule {
    pub id: String,
    #[serde(default)]
    pub attributes: SubmoduleAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmoduleAttributes {
    pub name: String,
    pub technical_name: String,
    #[serde(rename = "dsDevice")]
    pub device: Option<String>,
    pub function_blocks: Vec<String>,
    pub zone: Option<String>,
    /// `lights`, `shades`, `heating`, ...
    pub application: Option<String>,
    pub scenarios: Vec<String>,
    pub controller: Option<String>,
}

// ── Function blocks ──────────────────────────────────────────────────

/// The hardware function of a device: its outputs and inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionBlock {
    pub id: String,
    #[serde(default)]
    pub attributes: FunctionBlockAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionBlockAttributes {
    pub name: String,
    pub technical_name: String,
    pub active: bool,
    pub outputs: Vec<Output>,
    pub button_inputs: Vec<ButtonInput>,
    pub sensor_inputs: Vec<SensorInput>,
    pub submodule: Option<String>,
    pub device_adapter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: String,
    #[serde(default)]
    pub attributes: OutputAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputAttributes {
    pub technical_name: String,
    /// `lightBrightness`, `shadePositionOutside`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub function: Option<String>,
    pub mode: OutputMode,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub max: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub resolution: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputMode {
    Disabled,
    Switched,
    Gradual,
    Positional,
    Internal,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonInput {
    pub id: String,
    #[serde(default)]
    pub attributes: ButtonInputAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonInputAttributes {
    pub technical_name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorInput {
    pub id: String,
    #[serde(default)]
    pub attributes: SensorInputAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorInputAttributes {
    pub technical_name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub usage: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub max: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub resolution: Option<f64>,
}

/// Device category inferred from a function block's technical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// `GE…` (yellow, lights)
    Light,
    /// `GR…` (grey, shades and blinds)
    Blind,
    /// `SW…` (black, joker)
    Joker,
    Unknown,
}

/// Behaviour inferred from a function block's outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub dimmable: bool,
    pub position_channel: Option<String>,
    pub tilt_channel: Option<String>,
}

impl FunctionBlock {
    pub fn device_type(&self) -> DeviceType {
        let name = self.attributes.technical_name.as_str();
        if name.starts_with("GE") {
            DeviceType::Light
        } else if name.starts_with("GR") {
            DeviceType::Blind
        } else if name.starts_with("SW") {
            DeviceType::Joker
        } else {
            DeviceType::Unknown
        }
    }

    /// Dimmable if any output is gradual; position and tilt channels are
    /// picked by output id.
    pub fn properties(&self) -> DeviceProperties {
        let mut props = DeviceProperties::default();
        for output in &self.attributes.outputs {
            if output.id.contains("Angle") {
                props.tilt_channel = Some(output.id.clone());
            }
            if output.id.contains("Position") {
                props.position_channel = Some(output.id.clone());
            }
            if output.attributes.mode == OutputMode::Gradual {
                props.dimmable = true;
            }
        }
        props
    }
}

// ── Zones & meterings ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub attributes: ZoneAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoneAttributes {
    pub name: String,
    pub floor: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub order_id: Option<f64>,
    pub submodules: Vec<String>,
    pub applications: Vec<String>,
    pub application_types: Vec<String>,
    pub application_details: Vec<ApplicationDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationDetail {
    pub id: String,
    pub areas: Vec<Area>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Area {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metering {
    pub id: String,
    #[serde(default)]
    pub attributes: MeteringAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeteringAttributes {
    pub unit: Option<String>,
    pub technical_name: String,
    pub origin: Option<MeteringOrigin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteringOrigin {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// ── Controllers ──────────────────────────────────────────────────────

/// A dSM meter on the installation bus. Its id is the circuit dSUID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    pub id: String,
    #[serde(default)]
    pub attributes: ControllerAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerAttributes {
    pub name: String,
    #[serde(alias = "technicalName")]
    pub tech_name: String,
    pub dsid: Option<String>,
    pub present: Option<bool>,
}
