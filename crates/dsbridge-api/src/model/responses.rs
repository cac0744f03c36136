// Result payloads of the `json/*` endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Event;
use super::lenient;

/// `json/system/login` and `json/system/loginApplication`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(deserialize_with = "lenient::secret_string")]
    pub token: SecretString,
}

/// `json/event/get`. An empty or missing `events` array is a quiet poll.
///
/// Events stay raw until [`EventGetResponse::decode_each`] so a single
/// malformed entry does not take its siblings down with it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventGetResponse {
    #[serde(default)]
    pub events: Vec<Value>,
}

impl EventGetResponse {
    /// Decode every event on its own, in controller order.
    pub fn decode_each(self) -> Vec<Result<Event, serde_json::Error>> {
        self.events.into_iter().map(serde_json::from_value).collect()
    }
}

/// `json/zone/getName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneName {
    pub name: String,
}

/// `json/zone/sceneGetName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGetName {
    #[serde(default)]
    pub name: String,
}

/// `json/zone/getReachableScenes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReachableScenes {
    pub reachable_scenes: Vec<i64>,
    pub user_scene_names: Vec<SceneName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneName {
    #[serde(rename = "sceneNr")]
    pub number: i64,
    #[serde(default)]
    pub name: String,
}

/// `json/device/getOutputChannelValue`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputChannelValues {
    #[serde(default)]
    pub channels: Vec<ChannelValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelValue {
    #[serde(rename = "channel")]
    pub name: String,
    #[serde(default, rename = "channelId")]
    pub id: Option<String>,
    #[serde(default, rename = "channelType")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::f64_value")]
    pub value: f64,
}

/// `json/property/getFloating`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatValue {
    #[serde(deserialize_with = "lenient::f64_value")]
    pub value: f64,
}

/// `json/circuit/getConsumption`, in watts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    #[serde(deserialize_with = "lenient::f64_value")]
    pub consumption: f64,
}

/// `json/circuit/getEnergyMeterValue`, in watt-seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyMeterValue {
    #[serde(rename = "meterValue", deserialize_with = "lenient::f64_value")]
    pub meter_value: f64,
}

/// `json/apartment/getCircuits`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuits {
    #[serde(default)]
    pub circuits: Vec<Circuit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Circuit {
    pub name: String,
    pub dsid: String,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub hw_version: Option<i64>,
    pub hw_name: Option<String>,
    pub has_metering: bool,
    pub is_valid: bool,
    pub is_present: bool,
}
