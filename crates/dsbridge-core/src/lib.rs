//! Apartment topology and bridge lifecycle on top of `dsbridge-api`.
//!
//! - **[`Bridge`]**: Facade owning one controller session:
//!   [`connect()`](Bridge::connect) logs in, starts event delivery and loads
//!   the apartment topology; a topology that cannot be loaded fails startup.
//!
//! - **[`ApartmentRegistry`]**: Indexes controllers, devices, submodules,
//!   function blocks and zones by id. Reloads publish an immutable
//!   [`Topology`] with one atomic swap, so lookups never see a half-built
//!   index. Status reloads report changed output targets as [`OutputChange`]s.
//!
//! - **[`CoreError`]**: User-facing error taxonomy, translated from
//!   `dsbridge_api::Error`, with [`TopologyError`] for shape violations.

pub mod bridge;
pub mod config;
pub mod error;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, ConnectionState};
pub use config::{BridgeConfig, TlsVerification};
pub use error::{CoreError, TopologyError};
pub use registry::{
    ApartmentRegistry, DeviceChangeCallback, OutputChange, StatusSnapshot, Topology,
};

pub use dsbridge_api::model::{DeviceProperties, DeviceType, EventKind};
pub use dsbridge_api::{Credentials, EventLoopConfig, RetryPolicy};
