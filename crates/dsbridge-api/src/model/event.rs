// Event wire types returned by `json/event/get`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

// ── Event kind ───────────────────────────────────────────────────────

/// Name of a controller event.
///
/// The well-known names get their own variant; anything else is carried
/// verbatim so subscriptions to user-defined events still work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    CallScene,
    UndoScene,
    ButtonClick,
    DeviceSensorEvent,
    Running,
    ModelReady,
    DsMeterReady,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CallScene => "callScene",
            Self::UndoScene => "undoScene",
            Self::ButtonClick => "buttonClick",
            Self::DeviceSensorEvent => "deviceSensorEvent",
            Self::Running => "running",
            Self::ModelReady => "model_ready",
            Self::DsMeterReady => "dsMeter_ready",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "callScene" => Self::CallScene,
            "undoScene" => Self::UndoScene,
            "buttonClick" => Self::ButtonClick,
            "deviceSensorEvent" => Self::DeviceSensorEvent,
            "running" => Self::Running,
            "model_ready" => Self::ModelReady,
            "dsMeter_ready" => Self::DsMeterReady,
            other => Self::Custom(other.to_owned()),
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Custom(_) => Self::Custom(name),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Custom(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

// ── Event ────────────────────────────────────────────────────────────

/// One state change reported by the controller. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: EventKind,
    #[serde(default)]
    pub properties: EventProperties,
    #[serde(default)]
    pub source: EventSource,
}

/// Kind-specific properties. Numeric fields arrive as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventProperties {
    #[serde(default, rename = "originToken")]
    pub origin_token: Option<String>,
    #[serde(default, rename = "originDSUID")]
    pub origin_dsuid: Option<String>,
    #[serde(default, rename = "zoneID", deserialize_with = "lenient::opt_i64")]
    pub zone_id: Option<i64>,
    #[serde(default, rename = "sceneID", deserialize_with = "lenient::opt_i64")]
    pub scene_id: Option<i64>,
    #[serde(
        default,
        rename = "groupID",
        alias = "groupId",
        deserialize_with = "lenient::opt_i64"
    )]
    pub group_id: Option<i64>,
    #[serde(default, rename = "callOrigin")]
    pub call_origin: Option<String>,
    #[serde(default, rename = "buttonIndex", deserialize_with = "lenient::opt_i64")]
    pub button_index: Option<i64>,
    #[serde(default, rename = "clickType", deserialize_with = "lenient::opt_i64")]
    pub click_type: Option<i64>,
    /// Properties this crate does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Which part of the installation fired the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default)]
    pub dsid: Option<String>,
    #[serde(default, rename = "zoneID", deserialize_with = "lenient::opt_i64")]
    pub zone_id: Option<i64>,
    #[serde(
        default,
        rename = "groupID",
        alias = "groupId",
        deserialize_with = "lenient::opt_i64"
    )]
    pub group_id: Option<i64>,
    #[serde(default, rename = "isApartment")]
    pub is_apartment: bool,
    #[serde(default, rename = "isGroup")]
    pub is_group: bool,
    #[serde(default, rename = "isDevice")]
    pub is_device: bool,
}
