// Wire models for the dSS JSON API.

pub mod apartment;
pub mod event;
mod lenient;
pub mod responses;
pub mod status;

pub use apartment::{
    Apartment, ApartmentAttributes, ApartmentIncluded, ButtonInput, Controller,
    ControllerAttributes, Device, DeviceAttributes, DeviceProperties, DeviceType, FunctionBlock,
    FunctionBlockAttributes, Installation, Metering, Output, OutputAttributes, OutputMode,
    SensorInput, Submodule, SubmoduleAttributes, Zone, ZoneAttributes,
};
pub use event::{Event, EventKind, EventProperties, EventSource};
pub use responses::{
    ChannelValue, Circuit, Circuits, Consumption, EnergyMeterValue, EventGetResponse, FloatValue,
    OutputChannelValues, ReachableScenes, SceneGetName, SceneName, TokenResponse, ZoneName,
};
pub use status::{
    ApartmentStatus, ApartmentStatusIncluded, DeviceStatus, DeviceStatusAttributes,
    FunctionBlockStatus, OutputValue, StateValue, SubmoduleStatus,
};
