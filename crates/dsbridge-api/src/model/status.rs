// Apartment status document returned by `api/v1/apartment/status`.
//
// Same `{ id, included }` layout as the apartment document, but it carries
// live state: output values and their targets per function block, submodule
// locks and device states.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApartmentStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub included: ApartmentStatusIncluded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApartmentStatusIncluded {
    #[serde(rename = "dsDevices")]
    pub devices: Vec<DeviceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: DeviceStatusAttributes,
}

impl DeviceStatus {
    /// Output values of every function block, in document order.
    pub fn output_values(&self) -> impl Iterator<Item = &OutputValue> {
        self.attributes
            .function_blocks
            .iter()
            .flat_map(|fb| fb.outputs.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStatusAttributes {
    pub function_blocks: Vec<FunctionBlockStatus>,
    pub submodules: Vec<SubmoduleStatus>,
    pub states: Vec<StateValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionBlockStatus {
    pub id: String,
    #[serde(default)]
    pub outputs: Vec<OutputValue>,
}

/// Current and target value of one output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputValue {
    pub id: String,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub value: Option<f64>,
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub target_value: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmoduleStatus {
    pub id: String,
    pub operations_locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateValue {
    pub id: String,
    pub value: Value,
}
