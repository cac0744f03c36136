// Zone endpoints: names, actions and scenes.

use std::fmt;

use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::model::{ReachableScenes, SceneGetName, ZoneName};
use crate::transport::Params;

/// Application id for shades, the only application `callAction` is used with.
const SHADES_APPLICATION: u8 = 2;

/// Actions accepted by `json/zone/callAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneAction {
    MoveUp,
    MoveDown,
    StepUp,
    StepDown,
    SunProtection,
    Stop,
}

impl ZoneAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MoveUp => "app.moveUp",
            Self::MoveDown => "app.moveDown",
            Self::StepUp => "app.stepUp",
            Self::StepDown => "app.stepDown",
            Self::SunProtection => "app.sunProtection",
            Self::Stop => "app.stop",
        }
    }
}

impl fmt::Display for ZoneAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Client {
    /// `GET json/zone/getName?id=`
    pub async fn zone_get_name(&self, zone_id: i64) -> Result<ZoneName, Error> {
        debug!(zone_id, "fetching zone name");
        self.call_as("json/zone/getName", &Params::new().with("id", zone_id))
            .await
    }

    /// `GET json/zone/callAction?application=2&id=&action=`
    pub async fn zone_call_action(&self, zone_id: i64, action: ZoneAction) -> Result<(), Error> {
        debug!(zone_id, %action, "calling zone action");
        let params = Params::new()
            .with("application", SHADES_APPLICATION)
            .with("id", zone_id)
            .with("action", action);
        self.call("json/zone/callAction", &params).await.map(drop)
    }

    /// `GET json/zone/callScene?id=&groupID=&sceneNumber=`
    ///
    /// `force` bypasses the scene's local priority (`force=true`).
    pub async fn zone_call_scene(
        &self,
        zone_id: i64,
        group_id: i64,
        scene_number: i64,
        force: bool,
    ) -> Result<(), Error> {
        debug!(zone_id, group_id, scene_number, force, "calling zone scene");
        let mut params = Params::new()
            .with("id", zone_id)
            .with("groupID", group_id)
            .with("sceneNumber", scene_number);
        if force {
            params.set("force", true);
        }
        self.call("json/zone/callScene", &params).await.map(drop)
    }

    /// `GET json/zone/sceneGetName?id=&groupID=&sceneNumber=`
    pub async fn zone_scene_get_name(
        &self,
        zone_id: i64,
        group_id: i64,
        scene_number: i64,
    ) -> Result<SceneGetName, Error> {
        let params = Params::new()
            .with("id", zone_id)
            .with("groupID", group_id)
            .with("sceneNumber", scene_number);
        self.call_as("json/zone/sceneGetName", &params).await
    }

    /// `GET json/zone/getReachableScenes?id=&groupID=`
    pub async fn zone_get_reachable_scenes(
        &self,
        zone_id: i64,
        group_id: i64,
    ) -> Result<ReachableScenes, Error> {
        let params = Params::new().with("id", zone_id).with("groupID", group_id);
        self.call_as("json/zone/getReachableScenes", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_match_controller_vocabulary() {
        assert_eq!(ZoneAction::MoveUp.as_str(), "app.moveUp");
        assert_eq!(ZoneAction::SunProtection.to_string(), "app.sunProtection");
        assert_eq!(ZoneAction::Stop.as_str(), "app.stop");
    }
}
