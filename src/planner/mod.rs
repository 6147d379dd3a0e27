//! Planning module for provisioning decisions.
//!
//! This module holds the engine's view of controller state and the pure
//! decision made for each configuration file against that view.

mod action;
mod snapshot;

pub use action::{ActionKind, DeviceAction, plan_device_action};
pub use snapshot::{SiteDevices, Snapshot};
