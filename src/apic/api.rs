//! Controller trait definition.
//!
//! This module defines the operations the reconciliation engine and the task
//! tracker need from the controller. [`super::ApicClient`] is the HTTP
//! implementation.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

use super::types::{DeviceRule, DeviceRulePatch, Image, NewDeviceRule, RuleOutcome, Site, TaskStatus};

/// Remote operations on a PnP controller.
///
/// Every method is a single request/response round trip unless noted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Controller: Send + Sync {
    /// Lists all sites keyed by name.
    async fn list_sites(&self) -> Result<HashMap<String, Site>>;

    /// Looks a site up by name.
    async fn find_site(&self, name: &str) -> Result<Option<Site>>;

    /// Creates a site and returns it as re-fetched from the controller.
    async fn create_site(&self, name: &str) -> Result<Site>;

    /// Lists stored configurations, file name to config id.
    ///
    /// A controller without a config namespace yields an empty map.
    async fn list_configs(&self) -> Result<HashMap<String, String>>;

    /// Uploads configuration text and returns its config id.
    ///
    /// With `existing_id` the stored artifact is replaced in place.
    async fn upload_config(
        &self,
        file_name: &str,
        content: &str,
        existing_id: Option<String>,
    ) -> Result<String>;

    /// Deletes a stored configuration. Failures are ignored.
    async fn delete_config(&self, config_id: &str);

    /// Lists firmware images keyed by name.
    async fn list_images(&self) -> Result<HashMap<String, Image>>;

    /// Lists the provisioning rules of a site.
    async fn list_devices(&self, site_id: &str) -> Result<Vec<DeviceRule>>;

    /// Creates a provisioning rule.
    async fn create_device_rule(&self, site_id: &str, rule: &NewDeviceRule) -> Result<RuleOutcome>;

    /// Applies a partial update to an existing rule.
    async fn update_device_rule(
        &self,
        site_id: &str,
        device_id: &str,
        patch: &DeviceRulePatch,
    ) -> Result<RuleOutcome>;

    /// Deletes a rule. Failures are not distinguished from success.
    async fn delete_device_rule(&self, site_id: &str, device_id: &str);

    /// Deletes every rule in the named site, one request per rule.
    ///
    /// Returns the number of delete requests issued.
    async fn delete_all_devices_in_site(&self, site_name: &str) -> Result<usize>;

    /// Fetches the status of a task.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus>;
}
