//! In-memory controller used by engine tests.
//!
//! Every mutating call (and every device listing) is appended to a call log
//! as a short line such as `create_rule site-1 ABC123 R1 image=none`, so tests
//! can assert on both the set and the order of remote effects.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::apic::{
    Controller, DeviceRule, DeviceRulePatch, Image, NewDeviceRule, RuleOutcome, Site, TaskHandle,
    TaskStatus,
};
use crate::error::{ApicError, Result};

#[derive(Debug, Default)]
struct FakeState {
    sites: HashMap<String, Site>,
    configs: HashMap<String, String>,
    images: HashMap<String, Image>,
    devices: HashMap<String, Vec<DeviceRule>>,
    calls: Vec<String>,
    next_id: usize,
    reject_creates: bool,
    hide_created: bool,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Controller fake backed by hash maps.
#[derive(Debug, Default)]
pub struct FakeController {
    state: Mutex<FakeState>,
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake controller lock poisoned")
    }

    pub fn with_site(self, name: &str, id: &str) -> Self {
        self.state().sites.insert(
            name.to_string(),
            Site {
                name: name.to_string(),
                id: id.to_string(),
            },
        );
        self
    }

    pub fn with_device(self, site_id: &str, id: &str, serial: &str, hostname: &str) -> Self {
        self.state()
            .devices
            .entry(site_id.to_string())
            .or_default()
            .push(DeviceRule {
                id: Some(id.to_string()),
                serial_number: serial.to_string(),
                host_name: hostname.to_string(),
                platform_id: Some(String::from("C9300")),
                config_id: None,
                image_id: None,
            });
        self
    }

    pub fn with_config(self, file_name: &str, id: &str) -> Self {
        self.state()
            .configs
            .insert(file_name.to_string(), id.to_string());
        self
    }

    pub fn with_image(self, name: &str, id: &str) -> Self {
        self.state().images.insert(
            name.to_string(),
            Image {
                name: name.to_string(),
                id: id.to_string(),
            },
        );
        self
    }

    pub fn rejecting_creates(self) -> Self {
        self.state().reject_creates = true;
        self
    }

    /// Accepted rules never show up in device listings, as while the
    /// controller's task is still running.
    pub fn hiding_created_rules(self) -> Self {
        self.state().hide_created = true;
        self
    }

    /// The call log so far.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Position of the first logged call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.state().calls.iter().position(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl Controller for FakeController {
    async fn list_sites(&self) -> Result<HashMap<String, Site>> {
        Ok(self.state().sites.clone())
    }

    async fn find_site(&self, name: &str) -> Result<Option<Site>> {
        Ok(self.state().sites.get(name).cloned())
    }

    async fn create_site(&self, name: &str) -> Result<Site> {
        let mut state = self.state();
        let site = Site {
            name: name.to_string(),
            id: state.next_id("site"),
        };
        state.calls.push(format!("create_site {name}"));
        state.sites.insert(name.to_string(), site.clone());
        Ok(site)
    }

    async fn list_configs(&self) -> Result<HashMap<String, String>> {
        Ok(self.state().configs.clone())
    }

    async fn upload_config(
        &self,
        file_name: &str,
        _content: &str,
        existing_id: Option<String>,
    ) -> Result<String> {
        let mut state = self.state();
        state.calls.push(format!(
            "upload_config {file_name} {}",
            existing_id.as_deref().unwrap_or("new")
        ));
        let id = match existing_id {
            Some(id) => id,
            None => state.next_id("cfg"),
        };
        state.configs.insert(file_name.to_string(), id.clone());
        Ok(id)
    }

    async fn delete_config(&self, config_id: &str) {
        let mut state = self.state();
        state.calls.push(format!("delete_config {config_id}"));
        state.configs.retain(|_, id| id != config_id);
    }

    async fn list_images(&self) -> Result<HashMap<String, Image>> {
        Ok(self.state().images.clone())
    }

    async fn list_devices(&self, site_id: &str) -> Result<Vec<DeviceRule>> {
        let mut state = self.state();
        state.calls.push(format!("list_devices {site_id}"));
        Ok(state.devices.get(site_id).cloned().unwrap_or_default())
    }

    async fn create_device_rule(&self, site_id: &str, rule: &NewDeviceRule) -> Result<RuleOutcome> {
        let mut state = self.state();
        state.calls.push(format!(
            "create_rule {site_id} {} {} image={}",
            rule.serial_number,
            rule.host_name,
            rule.image_id.as_deref().unwrap_or("none")
        ));

        if state.reject_creates {
            return Ok(RuleOutcome::Rejected {
                code: String::from("PNP_DUPLICATE"),
                message: format!("Serial {} already claimed", rule.serial_number),
            });
        }

        let mut stored = rule.to_rule();
        stored.id = Some(state.next_id("dev"));
        if !state.hide_created {
            state
                .devices
                .entry(site_id.to_string())
                .or_default()
                .push(stored);
        }

        let task_id = state.next_id("task");
        Ok(RuleOutcome::Accepted(TaskHandle {
            url: Some(format!("/api/v1/task/{task_id}")),
            task_id,
        }))
    }

    async fn update_device_rule(
        &self,
        site_id: &str,
        device_id: &str,
        patch: &DeviceRulePatch,
    ) -> Result<RuleOutcome> {
        let mut state = self.state();
        let hostname = patch.host_name.clone().unwrap_or_default();
        state
            .calls
            .push(format!("update_rule {site_id} {device_id} {hostname}"));

        if let Some(rule) = state
            .devices
            .get_mut(site_id)
            .and_then(|rules| rules.iter_mut().find(|r| r.id.as_deref() == Some(device_id)))
        {
            rule.host_name = hostname;
        }

        let task_id = state.next_id("task");
        Ok(RuleOutcome::Accepted(TaskHandle { task_id, url: None }))
    }

    async fn delete_device_rule(&self, site_id: &str, device_id: &str) {
        let mut state = self.state();
        state
            .calls
            .push(format!("delete_rule {site_id} {device_id}"));
        if let Some(rules) = state.devices.get_mut(site_id) {
            rules.retain(|r| r.id.as_deref() != Some(device_id));
        }
    }

    async fn delete_all_devices_in_site(&self, site_name: &str) -> Result<usize> {
        let mut state = self.state();
        let site_id = state
            .sites
            .get(site_name)
            .map(|s| s.id.clone())
            .ok_or_else(|| ApicError::SiteNotFound {
                name: site_name.to_string(),
            })?;
        let removed = state.devices.remove(&site_id).unwrap_or_default().len();
        state
            .calls
            .push(format!("delete_all_devices {site_name} {removed}"));
        Ok(removed)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        Ok(TaskStatus {
            id: Some(task_id.to_string()),
            progress: Some(String::from("Success")),
            end_time: Some(1),
            ..TaskStatus::default()
        })
    }
}
