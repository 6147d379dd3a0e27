//! Reconciler between local configuration files and controller state.
//!
//! The reconciler loads a snapshot of the controller once, then walks the
//! discovered files in order. For each file it makes sure the site exists,
//! uploads the configuration, and creates, renames or leaves the device rule
//! as the snapshot dictates. Every mutating call is mirrored into the
//! snapshot right away so that later files see its effect.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::apic::{Controller, DeviceRulePatch, NewDeviceRule, RuleOutcome, Site, TaskHandle};
use crate::config::{DeviceMetadata, DirectiveExtractor};
use crate::error::{Result, ZtdError};
use crate::planner::{ActionKind, DeviceAction, SiteDevices, Snapshot, plan_device_action};
use crate::tracker::{TaskOutcome, TaskRecord, TaskTracker, TrackerReport};

/// Reconciler for provisioning rules.
pub struct Reconciler<'a, C: Controller + ?Sized> {
    /// Controller to reconcile against.
    controller: &'a C,
    /// Directive matchers.
    extractor: DirectiveExtractor,
    /// Delete every rule of a site the first time a file touches it.
    clear_site: bool,
    /// Delete every stored configuration before the snapshot is taken.
    purge_configs: bool,
}

/// What happened to one configuration file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// File path as discovered.
    pub path: PathBuf,
    /// Planned hostname.
    pub hostname: String,
    /// Device serial.
    pub serial: String,
    /// Site name.
    pub site: String,
    /// Config id the content was stored under.
    pub config_id: String,
    /// Rule action taken.
    pub action: ActionKind,
    /// Task started by the action, if any.
    pub task_id: Option<String>,
    /// Rejection or skip reason.
    pub message: Option<String>,
}

/// Result of a provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When task tracking finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Stored configurations deleted before the run.
    pub configs_purged: usize,
    /// Sites created.
    pub sites_created: usize,
    /// Rules deleted by site clearing.
    pub rules_cleared: usize,
    /// One entry per processed file, in processing order.
    pub files: Vec<FileReport>,
    /// Polled task outcomes.
    pub tasks: Vec<TaskOutcome>,
    /// Tasks that failed or could not be read.
    pub task_errors: usize,
}

struct Applied {
    kind: ActionKind,
    task: Option<TaskHandle>,
    message: Option<String>,
}

impl Applied {
    const fn without_task(kind: ActionKind) -> Self {
        Self {
            kind,
            task: None,
            message: None,
        }
    }

    fn skipped(reason: String) -> Self {
        error!("  Skipping device: {reason}");
        Self {
            kind: ActionKind::Skipped,
            task: None,
            message: Some(reason),
        }
    }

    fn from_outcome(outcome: RuleOutcome, success: ActionKind) -> Self {
        match outcome {
            RuleOutcome::Accepted(task) => Self {
                kind: success,
                task: Some(task),
                message: None,
            },
            RuleOutcome::Rejected { code, message } => {
                error!("  Controller rejected rule: {code}: {message}");
                Self {
                    kind: ActionKind::Rejected,
                    task: None,
                    message: Some(format!("{code}: {message}")),
                }
            }
        }
    }
}

impl<'a, C: Controller + ?Sized> Reconciler<'a, C> {
    /// Creates a new reconciler.
    ///
    /// # Errors
    ///
    /// Returns an error if the directive patterns fail to compile.
    pub fn new(controller: &'a C) -> Result<Self> {
        Ok(Self {
            controller,
            extractor: DirectiveExtractor::new()?,
            clear_site: false,
            purge_configs: false,
        })
    }

    /// Clears each site's rules on first use.
    #[must_use]
    pub const fn with_clear_site(mut self, clear_site: bool) -> Self {
        self.clear_site = clear_site;
        self
    }

    /// Deletes all stored configurations before starting.
    #[must_use]
    pub const fn with_purge_configs(mut self, purge_configs: bool) -> Self {
        self.purge_configs = purge_configs;
        self
    }

    /// Processes `files` in order and records started tasks in `tracker`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, lacks a required directive,
    /// or a controller call fails. Nothing is sent to the controller for the
    /// offending file, and later files are not processed.
    pub async fn run(&self, files: &[PathBuf], tracker: &mut TaskTracker) -> Result<RunReport> {
        let mut report = RunReport::new();
        let mut snapshot = self.load_snapshot(&mut report).await?;

        for path in files {
            let file = self
                .process_file(path, &mut snapshot, tracker, &mut report)
                .await?;
            report.files.push(file);
        }

        info!(
            "Processed {} files: {} created, {} renamed, {} unchanged, {} rejected, {} skipped",
            report.files.len(),
            report.count(ActionKind::Created),
            report.count(ActionKind::Renamed),
            report.count(ActionKind::Unchanged),
            report.count(ActionKind::Rejected),
            report.count(ActionKind::Skipped),
        );

        Ok(report)
    }

    /// Reads the initial controller state.
    async fn load_snapshot(&self, report: &mut RunReport) -> Result<Snapshot> {
        if self.purge_configs {
            let configs = self.controller.list_configs().await?;
            info!("Deleting {} stored configurations", configs.len());
            for config_id in configs.values() {
                self.controller.delete_config(config_id).await;
            }
            report.configs_purged = configs.len();
        }

        let sites = self.controller.list_sites().await?;
        let configs = self.controller.list_configs().await?;
        let images = self.controller.list_images().await?;

        debug!(
            "Snapshot: {} sites, {} configs, {} images",
            sites.len(),
            configs.len(),
            images.len()
        );

        Ok(Snapshot::new(sites, configs, images))
    }

    async fn process_file(
        &self,
        path: &Path,
        snapshot: &mut Snapshot,
        tracker: &mut TaskTracker,
        report: &mut RunReport,
    ) -> Result<FileReport> {
        let content = tokio::fs::read_to_string(path).await?;
        let metadata = self.extractor.extract(&content, path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ZtdError::internal(format!("No file name in {}", path.display())))?;

        let site = self.prepare_site(snapshot, &metadata.site, report).await?;
        let image_id = resolve_image(snapshot, &metadata);

        info!(
            "{}: Uploading config {} for device {} ({})",
            site.name, file_name, metadata.hostname, metadata.serial
        );
        let existing = snapshot.config_id(file_name).map(String::from);
        let config_id = self
            .controller
            .upload_config(file_name, &content, existing)
            .await?;
        snapshot.record_config(file_name, &config_id);

        let devices = snapshot.devices_mut(&site.name);
        let action = plan_device_action(devices, &metadata.serial, &metadata.hostname);
        let applied = self
            .apply(devices, &site, &metadata, &config_id, image_id, action)
            .await?;

        let task_id = applied.task.as_ref().map(|t| t.task_id.clone());
        if let Some(task) = applied.task {
            tracker.record(TaskRecord {
                task_id: task.task_id,
                task_url: task.url,
                hostname: metadata.hostname.clone(),
                serial: metadata.serial.clone(),
                site: metadata.site.clone(),
                model: metadata.model.clone(),
                image: metadata.image.clone(),
            });
        }

        Ok(FileReport {
            path: path.to_path_buf(),
            hostname: metadata.hostname,
            serial: metadata.serial,
            site: metadata.site,
            config_id,
            action: applied.kind,
            task_id,
            message: applied.message,
        })
    }

    /// Resolves a site, creating, listing or clearing it on first use.
    async fn prepare_site(
        &self,
        snapshot: &mut Snapshot,
        name: &str,
        report: &mut RunReport,
    ) -> Result<Site> {
        if snapshot.mark_seen(name) {
            if let Some(site) = snapshot.site(name).cloned() {
                let rules = self.controller.list_devices(&site.id).await?;
                debug!("Site {name} has {} rules", rules.len());
                snapshot.set_devices(name, SiteDevices::from_rules(rules));
            } else {
                info!("Creating new site {name}");
                let site = self.controller.create_site(name).await?;
                snapshot.insert_site(site);
                report.sites_created += 1;
            }

            if self.clear_site {
                info!("Deleting all devices in site {name}");
                report.rules_cleared += self.controller.delete_all_devices_in_site(name).await?;
                snapshot.set_devices(name, SiteDevices::new());
            }
        }

        snapshot
            .site(name)
            .cloned()
            .ok_or_else(|| ZtdError::internal(format!("Site {name} missing from snapshot")))
    }

    /// Re-lists a site's rules to learn ids of rules created in this run.
    async fn refresh_devices(&self, site: &Site, devices: &mut SiteDevices) -> Result<()> {
        debug!("  Rule id unknown, listing rules of site {}", site.name);
        let rules = self.controller.list_devices(&site.id).await?;
        devices.refresh(rules);
        Ok(())
    }

    /// Issues the remote calls for a planned action and mirrors them locally.
    async fn apply(
        &self,
        devices: &mut SiteDevices,
        site: &Site,
        metadata: &DeviceMetadata,
        config_id: &str,
        image_id: Option<String>,
        action: DeviceAction,
    ) -> Result<Applied> {
        match action {
            DeviceAction::Unchanged => {
                info!("  Device already exists");
                Ok(Applied::without_task(ActionKind::Unchanged))
            }
            DeviceAction::Rename {
                old_hostname,
                device_id,
            } => {
                info!("  Updating hostname for device, old hostname: {old_hostname}");
                let device_id = match device_id {
                    Some(id) => Some(id),
                    None => {
                        self.refresh_devices(site, devices).await?;
                        devices.id_for_serial(&metadata.serial).map(String::from)
                    }
                };
                let Some(device_id) = device_id else {
                    return Ok(Applied::skipped(format!(
                        "rule {old_hostname} has no id on the controller yet, rename not sent"
                    )));
                };

                let patch = DeviceRulePatch::rename(&metadata.hostname);
                let outcome = self
                    .controller
                    .update_device_rule(&site.id, &device_id, &patch)
                    .await?;

                let applied = Applied::from_outcome(outcome, ActionKind::Renamed);
                if applied.kind == ActionKind::Renamed {
                    devices.rename(&metadata.serial, &metadata.hostname);
                }
                Ok(applied)
            }
            DeviceAction::Create { stale } => {
                if let Some(stale) = stale {
                    info!("  New serial number for hostname, deleting old entry");
                    let stale_id = match stale.id {
                        Some(id) => Some(id),
                        None => {
                            self.refresh_devices(site, devices).await?;
                            devices.id_for_serial(&stale.serial_number).map(String::from)
                        }
                    };
                    let Some(stale_id) = stale_id else {
                        return Ok(Applied::skipped(format!(
                            "rule {} for serial {} has no id on the controller yet, \
                             delete and create not sent",
                            stale.host_name, stale.serial_number
                        )));
                    };
                    self.controller.delete_device_rule(&site.id, &stale_id).await;
                    devices.remove_hostname(&metadata.hostname);
                }

                let rule = NewDeviceRule::new(
                    &metadata.serial,
                    &metadata.hostname,
                    &metadata.model,
                    &site.name,
                    config_id,
                )
                .with_image(image_id);

                let outcome = self.controller.create_device_rule(&site.id, &rule).await?;

                let applied = Applied::from_outcome(outcome, ActionKind::Created);
                if applied.kind == ActionKind::Created {
                    devices.insert(rule.to_rule());
                }
                Ok(applied)
            }
        }
    }
}

/// Looks up the requested image; an unknown image is dropped with a warning.
fn resolve_image(snapshot: &Snapshot, metadata: &DeviceMetadata) -> Option<String> {
    let image = metadata.image.as_deref()?;
    let image_id = snapshot.image_id(image).map(String::from);
    if image_id.is_none() {
        warn!(
            "Image {image} not found on controller for device {}, continuing without image",
            metadata.hostname
        );
    }
    image_id
}

impl RunReport {
    /// Creates an empty report stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            configs_purged: 0,
            sites_created: 0,
            rules_cleared: 0,
            files: Vec::new(),
            tasks: Vec::new(),
            task_errors: 0,
        }
    }

    /// Number of files that ended with `kind`.
    #[must_use]
    pub fn count(&self, kind: ActionKind) -> usize {
        self.files.iter().filter(|f| f.action == kind).count()
    }

    /// Attaches polled task outcomes and stamps the finish time.
    pub fn finish(&mut self, tracked: TrackerReport) {
        self.tasks = tracked.outcomes;
        self.task_errors = tracked.error_count;
        self.finished_at = Some(Utc::now());
    }

    /// Rejected or skipped rules plus failed tasks.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(ActionKind::Rejected) + self.count(ActionKind::Skipped) + self.task_errors
    }

    /// Returns true if no provisioning error occurred.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_clean() { "successful" } else { "failed" };
        writeln!(f, "Provisioning {status}:")?;
        writeln!(f, "  Files: {}", self.files.len())?;
        writeln!(f, "  Sites created: {}", self.sites_created)?;
        if self.rules_cleared > 0 {
            writeln!(f, "  Rules cleared: {}", self.rules_cleared)?;
        }
        if self.configs_purged > 0 {
            writeln!(f, "  Configs purged: {}", self.configs_purged)?;
        }
        writeln!(f, "  Created: {}", self.count(ActionKind::Created))?;
        writeln!(f, "  Renamed: {}", self.count(ActionKind::Renamed))?;
        writeln!(f, "  Unchanged: {}", self.count(ActionKind::Unchanged))?;
        writeln!(f, "  Rejected: {}", self.count(ActionKind::Rejected))?;
        writeln!(f, "  Skipped: {}", self.count(ActionKind::Skipped))?;
        writeln!(f, "  Failed tasks: {}", self.task_errors)?;
        Ok(())
    }
}
