//! APIC-EM controller integration module.
//!
//! This module provides all functionality for talking to the controller's
//! PnP API: login, sites, stored configurations and images, provisioning
//! rules and task status.

mod api;
mod client;
mod types;

pub use api::Controller;
#[cfg(test)]
pub use api::MockController;
pub use client::{AUTH_HEADER, ApicClient};
pub use types::{
    DeviceRule, DeviceRulePatch, Image, NewDeviceRule, RuleOutcome, Site, TaskHandle, TaskStatus,
};
