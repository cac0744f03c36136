// Typed wrappers over `Client::call` for the endpoints the bridge uses.
//
// Each file adds inherent methods to `Client`; all of them go through the
// retry and re-authentication policy.

mod circuits;
mod devices;
mod system;
mod zones;

pub use zones::ZoneAction;
