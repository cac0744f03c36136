// ── Apartment topology registry ──
//
// Fetches the apartment document and indexes controllers, devices,
// submodules, function blocks and zones by id. Each reload builds a fresh
// immutable `Topology` and publishes it with a single pointer swap, so
// readers see either the old index or the new one and never block on a
// reload. The apartment status (live output values) is held the same way;
// a status reload compares output targets with the previous status and
// reports the changes to per-device callbacks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::{debug, info};

use dsbridge_api::Client;
use dsbridge_api::model::{
    Apartment, ApartmentStatus, Controller, Device, FunctionBlock, Metering, Output, OutputValue,
    Submodule, Zone,
};

use crate::error::{CoreError, TopologyError};

// ── Indexed collection ───────────────────────────────────────────────

/// Entities in controller order plus an id → position index.
#[derive(Debug)]
struct Indexed<T> {
    items: Vec<T>,
    by_id: HashMap<String, usize>,
}

impl<T> Indexed<T> {
    fn new(items: Vec<T>, id: impl Fn(&T) -> &str) -> Self {
        let by_id = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (id(item).to_owned(), pos))
            .collect();
        Self { items, by_id }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.by_id.get(id).and_then(|&pos| self.items.get(pos))
    }

    fn all(&self) -> &[T] {
        &self.items
    }
}

// ── Topology ─────────────────────────────────────────────────────────

/// One immutable, fully indexed apartment snapshot.
#[derive(Debug)]
pub struct Topology {
    apartment_id: String,
    name: String,
    devices: Indexed<Device>,
    submodules: Indexed<Submodule>,
    function_blocks: Indexed<FunctionBlock>,
    zones: Indexed<Zone>,
    controllers: Indexed<Controller>,
    meterings: Vec<Metering>,
}

impl Topology {
    pub fn from_apartment(apartment: Apartment) -> Self {
        let Apartment {
            id,
            attributes,
            included,
        } = apartment;

        Self {
            apartment_id: id,
            name: attributes.name,
            devices: Indexed::new(included.devices, |d| d.id.as_str()),
            submodules: Indexed::new(included.submodules, |s| s.id.as_str()),
            function_blocks: Indexed::new(included.function_blocks, |f| f.id.as_str()),
            zones: Indexed::new(included.zones, |z| z.id.as_str()),
            controllers: Indexed::new(included.controllers, |c| c.id.as_str()),
            meterings: included.meterings,
        }
    }

    pub fn apartment_id(&self) -> &str {
        &self.apartment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self, id: &str) -> Result<&Device, CoreError> {
        self.devices
            .get(id)
            .ok_or_else(|| CoreError::not_found("device", id))
    }

    pub fn devices(&self) -> &[Device] {
        self.devices.all()
    }

    pub fn submodule(&self, id: &str) -> Result<&Submodule, CoreError> {
        self.submodules
            .get(id)
            .ok_or_else(|| CoreError::not_found("submodule", id))
    }

    pub fn function_block(&self, id: &str) -> Result<&FunctionBlock, CoreError> {
        self.function_blocks
            .get(id)
            .ok_or_else(|| CoreError::not_found("function block", id))
    }

    pub fn zone(&self, id: &str) -> Result<&Zone, CoreError> {
        self.zones
            .get(id)
            .ok_or_else(|| CoreError::not_found("zone", id))
    }

    pub fn zones(&self) -> &[Zone] {
        self.zones.all()
    }

    pub fn controller(&self, id: &str) -> Result<&Controller, CoreError> {
        self.controllers
            .get(id)
            .ok_or_else(|| CoreError::not_found("controller", id))
    }

    pub fn controllers(&self) -> &[Controller] {
        self.controllers.all()
    }

    pub fn meterings(&self) -> &[Metering] {
        &self.meterings
    }

    /// All function blocks reachable from a device through its submodules.
    /// Ids that the document references but does not include are skipped.
    pub fn function_blocks_of_device(&self, id: &str) -> Result<Vec<&FunctionBlock>, CoreError> {
        let device = self.device(id)?;
        Ok(device
            .attributes
            .submodules
            .iter()
            .filter_map(|sub_id| self.submodules.get(sub_id))
            .flat_map(|sub| sub.attributes.function_blocks.iter())
            .filter_map(|fb_id| self.function_blocks.get(fb_id))
            .collect())
    }

    /// Outputs of every function block on the device, in document order.
    pub fn outputs_of_device(&self, id: &str) -> Result<Vec<&Output>, CoreError> {
        Ok(self
            .function_blocks_of_device(id)?
            .into_iter()
            .flat_map(|fb| fb.attributes.outputs.iter())
            .collect())
    }

    /// The single function block of a device.
    pub fn function_block_for_device(&self, id: &str) -> Result<&FunctionBlock, CoreError> {
        let blocks = self.function_blocks_of_device(id)?;
        match blocks.as_slice() {
            [only] => Ok(*only),
            [] => Err(TopologyError::NoFunctionBlock { device: id.into() }.into()),
            many => Err(TopologyError::MultipleFunctionBlocks {
                device: id.into(),
                count: many.len(),
            }
            .into()),
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Output values of one apartment status document, keyed by device.
#[derive(Debug, Default)]
pub struct StatusSnapshot {
    outputs: HashMap<String, Vec<OutputValue>>,
    order: Vec<String>,
}

impl StatusSnapshot {
    pub fn from_status(status: ApartmentStatus) -> Self {
        let mut snapshot = Self::default();
        for device in status.included.devices {
            let values: Vec<OutputValue> = device.output_values().cloned().collect();
            snapshot.order.push(device.id.clone());
            snapshot.outputs.insert(device.id, values);
        }
        snapshot
    }

    /// Output values of a device; empty when the status does not list it.
    pub fn output_values_of_device(&self, id: &str) -> &[OutputValue] {
        self.outputs.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    fn target(&self, device: &str, output: &str) -> Option<f64> {
        self.output_values_of_device(device)
            .iter()
            .find(|value| value.id == output)
            .and_then(|value| value.target_value)
    }

    /// Outputs whose target value differs from `previous`. Outputs missing
    /// a target on either side are not compared.
    pub fn changes_since(&self, previous: &StatusSnapshot) -> Vec<OutputChange> {
        let mut changes = Vec::new();
        for device in &self.order {
            for value in self.output_values_of_device(device) {
                let (Some(new_value), Some(old_value)) =
                    (value.target_value, previous.target(device, &value.id))
                else {
                    continue;
                };
                if (new_value - old_value).abs() > f64::EPSILON {
                    changes.push(OutputChange {
                        device: device.clone(),
                        output: value.id.clone(),
                        old_value,
                        new_value,
                    });
                }
            }
        }
        changes
    }
}

/// An output target that moved between two status reloads.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChange {
    pub device: String,
    pub output: String,
    pub old_value: f64,
    pub new_value: f64,
}

/// Callback for output changes of one device.
pub type DeviceChangeCallback = Arc<dyn Fn(&OutputChange) + Send + Sync>;

// ── Registry ─────────────────────────────────────────────────────────

/// Shared, reloadable view of the apartment topology.
pub struct ApartmentRegistry {
    client: Client,
    snapshot: ArcSwapOption<Topology>,
    reload_lock: Mutex<()>,
    status: ArcSwapOption<StatusSnapshot>,
    status_lock: Mutex<()>,
    device_callbacks: RwLock<HashMap<String, DeviceChangeCallback>>,
}

impl ApartmentRegistry {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            snapshot: ArcSwapOption::empty(),
            reload_lock: Mutex::new(()),
            status: ArcSwapOption::empty(),
            status_lock: Mutex::new(()),
            device_callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the apartment once and replace the current snapshot.
    ///
    /// Concurrent reloads run one after the other. On failure the previous
    /// snapshot stays in place.
    pub async fn reload(&self) -> Result<Arc<Topology>, CoreError> {
        let _guard = self.reload_lock.lock().await;

        debug!("fetching apartment topology");
        let apartment = self.client.get_apartment().await?;
        let topology = Arc::new(Topology::from_apartment(apartment));

        info!(
            apartment = topology.apartment_id(),
            devices = topology.devices().len(),
            submodules = topology.submodules.all().len(),
            function_blocks = topology.function_blocks.all().len(),
            zones = topology.zones().len(),
            "apartment topology loaded"
        );

        self.snapshot.store(Some(Arc::clone(&topology)));
        Ok(topology)
    }

    /// The current snapshot, for several reads against one consistent view.
    pub fn snapshot(&self) -> Result<Arc<Topology>, CoreError> {
        self.snapshot
            .load_full()
            .ok_or(CoreError::Topology(TopologyError::NotLoaded))
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.load().is_some()
    }

    pub fn get_device(&self, id: &str) -> Result<Device, CoreError> {
        self.snapshot()?.device(id).cloned()
    }

    pub fn get_outputs_of_device(&self, id: &str) -> Result<Vec<Output>, CoreError> {
        Ok(self
            .snapshot()?
            .outputs_of_device(id)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn get_function_block_for_device(&self, id: &str) -> Result<FunctionBlock, CoreError> {
        self.snapshot()?.function_block_for_device(id).cloned()
    }

    pub fn devices(&self) -> Result<Vec<Device>, CoreError> {
        Ok(self.snapshot()?.devices().to_vec())
    }

    pub fn zone(&self, id: &str) -> Result<Zone, CoreError> {
        self.snapshot()?.zone(id).cloned()
    }

    pub fn zones(&self) -> Result<Vec<Zone>, CoreError> {
        Ok(self.snapshot()?.zones().to_vec())
    }

    pub fn meterings(&self) -> Result<Vec<Metering>, CoreError> {
        Ok(self.snapshot()?.meterings().to_vec())
    }

    pub fn submodule(&self, id: &str) -> Result<Submodule, CoreError> {
        self.snapshot()?.submodule(id).cloned()
    }

    pub fn function_block(&self, id: &str) -> Result<FunctionBlock, CoreError> {
        self.snapshot()?.function_block(id).cloned()
    }

    pub fn controllers(&self) -> Result<Vec<Controller>, CoreError> {
        Ok(self.snapshot()?.controllers().to_vec())
    }

    pub fn get_controller(&self, id: &str) -> Result<Controller, CoreError> {
        self.snapshot()?.controller(id).cloned()
    }

    // ── Status & device changes ──────────────────────────────────────

    /// Fetch the apartment status and replace the current one.
    ///
    /// Returns the output targets that changed since the previous status
    /// (none on the first load) after handing each one to the callback
    /// registered for its device.
    pub async fn reload_status(&self) -> Result<Vec<OutputChange>, CoreError> {
        let _guard = self.status_lock.lock().await;

        debug!("fetching apartment status");
        let status = self.client.get_apartment_status().await?;
        let fresh = Arc::new(StatusSnapshot::from_status(status));
        let changes = self
            .status
            .load_full()
            .map(|previous| fresh.changes_since(&previous))
            .unwrap_or_default();
        self.status.store(Some(fresh));

        for change in &changes {
            info!(
                device = %change.device,
                output = %change.output,
                old = change.old_value,
                new = change.new_value,
                "output value changed"
            );
            let callback = self
                .device_callbacks
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&change.device)
                .cloned();
            if let Some(callback) = callback {
                callback(change);
            }
        }
        Ok(changes)
    }

    /// Live output values of a device from the last status load.
    pub fn get_output_values_of_device(&self, id: &str) -> Result<Vec<OutputValue>, CoreError> {
        let status = self
            .status
            .load_full()
            .ok_or(CoreError::Topology(TopologyError::StatusNotLoaded))?;
        Ok(status.output_values_of_device(id).to_vec())
    }

    /// Register the one change callback for `device`.
    pub fn device_change_subscribe(
        &self,
        device: impl Into<String>,
        callback: impl Fn(&OutputChange) + Send + Sync + 'static,
    ) -> Result<(), CoreError> {
        let device = device.into();
        let mut callbacks = self
            .device_callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if callbacks.contains_key(&device) {
            return Err(CoreError::DeviceChangeRegistered { device });
        }
        callbacks.insert(device, Arc::new(callback));
        Ok(())
    }

    pub fn device_change_unsubscribe(&self, device: &str) -> Result<(), CoreError> {
        self.device_callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device)
            .map(drop)
            .ok_or_else(|| CoreError::DeviceChangeNotRegistered {
                device: device.to_owned(),
            })
    }
}

impl std::fmt::Debug for ApartmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApartmentRegistry")
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsbridge_api::model::{
        DeviceAttributes, FunctionBlockAttributes, OutputAttributes, SubmoduleAttributes,
    };
    use pretty_assertions::assert_eq;

    fn device(id: &str, submodules: &[&str]) -> Device {
        Device {
            id: id.into(),
            attributes: DeviceAttributes {
                name: format!("device {id}"),
                submodules: submodules.iter().map(|s| (*s).to_owned()).collect(),
                ..DeviceAttributes::default()
            },
        }
    }

    fn submodule(id: &str, blocks: &[&str]) -> Submodule {
        Submodule {
            id: id.into(),
            attributes: SubmoduleAttributes {
                function_blocks: blocks.iter().map(|s| (*s).to_owned()).collect(),
                ..SubmoduleAttributes::default()
            },
        }
    }

    fn block(id: &str, outputs: &[&str]) -> FunctionBlock {
        FunctionBlock {
            id: id.into(),
            attributes: FunctionBlockAttributes {
                technical_name: "GE-KM200".into(),
                outputs: outputs
                    .iter()
                    .map(|o| Output {
                        id: (*o).to_owned(),
                        attributes: OutputAttributes::default(),
                    })
                    .collect(),
                ..FunctionBlockAttributes::default()
            },
        }
    }

    fn topology() -> Topology {
        let mut apartment = Apartment {
            id: "apt".into(),
            ..Apartment::default()
        };
        apartment.included.devices = vec![
            device("single", &["s1"]),
            device("bare", &["s2"]),
            device("double", &["s3", "s4"]),
            device("dangling", &["missing"]),
        ];
        apartment.included.submodules = vec![
            submodule("s1", &["fb1"]),
            submodule("s2", &[]),
            submodule("s3", &["fb3"]),
            submodule("s4", &["fb4"]),
        ];
        apartment.included.function_blocks = vec![
            block("fb1", &["brightness"]),
            block("fb3", &["shadePositionOutside"]),
            block("fb4", &["shadeOpeningAngleOutside"]),
        ];
        Topology::from_apartment(apartment)
    }

    #[test]
    fn single_function_block_is_resolved() {
        let topo = topology();
        let fb = topo.function_block_for_device("single").expect("one block");
        assert_eq!(fb.id, "fb1");
    }

    #[test]
    fn zero_function_blocks_is_reported_as_such() {
        let topo = topology();
        for id in ["bare", "dangling"] {
            let err = topo.function_block_for_device(id).expect_err("no block");
            assert!(matches!(
                err,
                CoreError::Topology(TopologyError::NoFunctionBlock { .. })
            ));
        }
    }

    #[test]
    fn multiple_function_blocks_report_the_count() {
        let topo = topology();
        let err = topo.function_block_for_device("double").expect_err("two blocks");
        match err {
            CoreError::Topology(TopologyError::MultipleFunctionBlocks { device, count }) => {
                assert_eq!(device, "double");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn outputs_are_collected_across_blocks() {
        let topo = topology();
        let ids: Vec<&str> = topo
            .outputs_of_device("double")
            .expect("known device")
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(ids, vec!["shadePositionOutside", "shadeOpeningAngleOutside"]);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let topo = topology();
        assert!(matches!(
            topo.device("nope"),
            Err(CoreError::NotFound {
                entity_type: "device",
                ..
            })
        ));
        assert!(matches!(
            topo.outputs_of_device("nope"),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            topo.zone("nope"),
            Err(CoreError::NotFound {
                entity_type: "zone",
                ..
            })
        ));
    }

    fn status(targets: &[(&str, &str, Option<f64>)]) -> StatusSnapshot {
        let devices: Vec<serde_json::Value> = targets
            .iter()
            .map(|(device, output, target)| {
                serde_json::json!({
                    "id": device,
                    "attributes": {
                        "functionBlocks": [{ "id": "fb", "outputs": [{ "id": output, "targetValue": target }] }]
                    }
                })
            })
            .collect();
        let status: ApartmentStatus = serde_json::from_value(serde_json::json!({
            "id": "apt",
            "included": { "dsDevices": devices }
        }))
        .expect("status decodes");
        StatusSnapshot::from_status(status)
    }

    #[test]
    fn status_changes_compare_targets() {
        let before = status(&[
            ("lamp", "brightness", Some(0.0)),
            ("blind", "shadePositionOutside", Some(50.0)),
            ("plug", "powerState", None),
        ]);
        let after = status(&[
            ("lamp", "brightness", Some(80.0)),
            ("blind", "shadePositionOutside", Some(50.0)),
            ("plug", "powerState", Some(1.0)),
            ("new", "brightness", Some(10.0)),
        ]);

        let changes = after.changes_since(&before);
        assert_eq!(
            changes,
            vec![OutputChange {
                device: "lamp".into(),
                output: "brightness".into(),
                old_value: 0.0,
                new_value: 80.0,
            }]
        );
        assert!(after.changes_since(&after).is_empty());
        assert!(after.output_values_of_device("ghost").is_empty());
    }

    #[test]
    fn controllers_are_indexed() {
        let mut apartment = Apartment::default();
        apartment.included.controllers = vec![Controller {
            id: "302ed89f43f0000000000f7c".into(),
            ..Controller::default()
        }];
        let topo = Topology::from_apartment(apartment);
        assert_eq!(topo.controllers().len(), 1);
        assert!(topo.controller("302ed89f43f0000000000f7c").is_ok());
        assert!(matches!(
            topo.controller("nope"),
            Err(CoreError::NotFound {
                entity_type: "controller",
                ..
            })
        ));
    }

    #[test]
    fn devices_keep_document_order() {
        let topo = topology();
        let ids: Vec<&str> = topo.devices().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["single", "bare", "double", "dangling"]);
    }
}
