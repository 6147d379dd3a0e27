//! Per-file device decision.
//!
//! Serial numbers identify physical devices; hostnames are operator-assigned
//! and may change. The decision compares a file's `(serial, hostname)` pair
//! against the cached rules of its site.

use serde::Serialize;
use std::fmt;

use crate::apic::DeviceRule;

use super::snapshot::SiteDevices;

/// What to do with the rule for one configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    /// The serial is already bound to this hostname.
    Unchanged,
    /// The serial is known under another hostname; rename that rule.
    Rename {
        /// Hostname the rule is currently stored under.
        old_hostname: String,
        /// Controller id of that rule, if known.
        device_id: Option<String>,
    },
    /// The serial is unknown; create a rule.
    Create {
        /// Rule holding the hostname under a different serial, to be deleted first.
        stale: Option<DeviceRule>,
    },
}

/// Decides the action for `serial` / `hostname` against a site's rules.
#[must_use]
pub fn plan_device_action(devices: &SiteDevices, serial: &str, hostname: &str) -> DeviceAction {
    match devices.hostname_for(serial) {
        Some(current) if current == hostname => DeviceAction::Unchanged,
        Some(current) => DeviceAction::Rename {
            old_hostname: current.to_string(),
            device_id: devices.rule_for(current).and_then(|r| r.id.clone()),
        },
        None => DeviceAction::Create {
            stale: devices
                .rule_for(hostname)
                .filter(|r| r.serial_number != serial)
                .cloned(),
        },
    }
}

/// Result of processing one file, as shown in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Rule already matched.
    Unchanged,
    /// Rule created.
    Created,
    /// Rule renamed.
    Renamed,
    /// Controller rejected the rule.
    Rejected,
    /// Remote call skipped because the rule id is not known yet.
    Skipped,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Renamed => "renamed",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}
