//! In-memory view of controller state for one run.
//!
//! The snapshot is loaded once at the start of a run and then updated
//! optimistically after every mutating call, before the controller's task
//! has finished. Later files in the same run see those updates.

use std::collections::{HashMap, HashSet};
use tracing::trace;

use crate::apic::{DeviceRule, Image, Site};

/// Provisioning rules of one site, indexed by serial and by hostname.
///
/// Both views are only changed together: every `serial -> hostname` entry
/// points at a rule stored under that hostname with that serial, and the
/// reverse holds for every stored rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteDevices {
    /// Serial number to hostname.
    serials: HashMap<String, String>,
    /// Hostname to rule.
    rules: HashMap<String, DeviceRule>,
}

impl SiteDevices {
    /// Creates an empty device cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the cache from rules listed by the controller.
    ///
    /// Later rules win when serials or hostnames repeat.
    #[must_use]
    pub fn from_rules(rules: impl IntoIterator<Item = DeviceRule>) -> Self {
        let mut devices = Self::new();
        for rule in rules {
            devices.insert(rule);
        }
        devices
    }

    /// Replaces the cache with a fresh controller listing.
    ///
    /// Rules created in this run that the listing does not show yet are kept,
    /// unless the listing already holds their serial or hostname.
    pub fn refresh(&mut self, rules: impl IntoIterator<Item = DeviceRule>) {
        let pending: Vec<DeviceRule> = self
            .rules
            .values()
            .filter(|r| r.id.is_none())
            .cloned()
            .collect();

        *self = Self::from_rules(rules);
        for rule in pending {
            if !self.serials.contains_key(&rule.serial_number)
                && !self.rules.contains_key(&rule.host_name)
            {
                self.insert(rule);
            }
        }
    }

    /// Controller id of the rule bound to a serial.
    #[must_use]
    pub fn id_for_serial(&self, serial: &str) -> Option<&str> {
        self.hostname_for(serial)
            .and_then(|h| self.rule_for(h))
            .and_then(|r| r.id.as_deref())
    }

    /// Hostname currently bound to a serial.
    #[must_use]
    pub fn hostname_for(&self, serial: &str) -> Option<&str> {
        self.serials.get(serial).map(String::as_str)
    }

    /// Rule stored under a hostname.
    #[must_use]
    pub fn rule_for(&self, hostname: &str) -> Option<&DeviceRule> {
        self.rules.get(hostname)
    }

    /// Stores a rule, evicting whatever it displaces in either view.
    pub fn insert(&mut self, rule: DeviceRule) {
        if let Some(old_host) = self.serials.remove(&rule.serial_number) {
            self.rules.remove(&old_host);
        }
        if let Some(old_rule) = self.rules.remove(&rule.host_name) {
            self.serials.remove(&old_rule.serial_number);
        }

        trace!("Caching rule {} -> {}", rule.serial_number, rule.host_name);
        self.serials
            .insert(rule.serial_number.clone(), rule.host_name.clone());
        self.rules.insert(rule.host_name.clone(), rule);
    }

    /// Moves the rule of `serial` to `new_hostname`.
    ///
    /// Returns the rule as it was before the rename, or `None` if the serial
    /// is unknown.
    pub fn rename(&mut self, serial: &str, new_hostname: &str) -> Option<DeviceRule> {
        let old_host = self.serials.get(serial)?.clone();
        let previous = self.rules.get(&old_host)?.clone();

        let mut renamed = previous.clone();
        renamed.host_name = new_hostname.to_string();
        self.insert(renamed);

        Some(previous)
    }

    /// Removes the rule stored under a hostname from both views.
    pub fn remove_hostname(&mut self, hostname: &str) -> Option<DeviceRule> {
        let rule = self.rules.remove(hostname)?;
        self.serials.remove(&rule.serial_number);
        Some(rule)
    }

    /// Number of cached rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Everything the engine knows about the controller during a run.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Site name to site.
    sites: HashMap<String, Site>,
    /// Config file name to config id.
    configs: HashMap<String, String>,
    /// Image name to image.
    images: HashMap<String, Image>,
    /// Site name to its device cache, filled on first use of a site.
    devices: HashMap<String, SiteDevices>,
    /// Sites already touched by a file in this run.
    seen_sites: HashSet<String>,
}

impl Snapshot {
    /// Creates a snapshot from the initial listings.
    #[must_use]
    pub fn new(
        sites: HashMap<String, Site>,
        configs: HashMap<String, String>,
        images: HashMap<String, Image>,
    ) -> Self {
        Self {
            sites,
            configs,
            images,
            devices: HashMap::new(),
            seen_sites: HashSet::new(),
        }
    }

    /// Marks a site as touched. Returns true the first time.
    pub fn mark_seen(&mut self, site: &str) -> bool {
        self.seen_sites.insert(site.to_string())
    }

    /// Known site by name.
    #[must_use]
    pub fn site(&self, name: &str) -> Option<&Site> {
        self.sites.get(name)
    }

    /// Records a site, with an empty device cache.
    pub fn insert_site(&mut self, site: Site) {
        self.devices.insert(site.name.clone(), SiteDevices::new());
        self.sites.insert(site.name.clone(), site);
    }

    /// Device cache of a site.
    #[must_use]
    pub fn devices(&self, site: &str) -> Option<&SiteDevices> {
        self.devices.get(site)
    }

    /// Mutable device cache of a site, created empty if missing.
    pub fn devices_mut(&mut self, site: &str) -> &mut SiteDevices {
        self.devices.entry(site.to_string()).or_default()
    }

    /// Replaces the device cache of a site.
    pub fn set_devices(&mut self, site: &str, devices: SiteDevices) {
        self.devices.insert(site.to_string(), devices);
    }

    /// Config id stored under a file name.
    #[must_use]
    pub fn config_id(&self, file_name: &str) -> Option<&str> {
        self.configs.get(file_name).map(String::as_str)
    }

    /// Records the config id of an uploaded file.
    pub fn record_config(&mut self, file_name: &str, config_id: &str) {
        self.configs
            .insert(file_name.to_string(), config_id.to_string());
    }

    /// Image id by image name.
    #[must_use]
    pub fn image_id(&self, name: &str) -> Option<&str> {
        self.images.get(name).map(|i| i.id.as_str())
    }
}
