//! Controller API types and data structures.
//!
//! This module defines the types exchanged with the APIC-EM PnP API. Response
//! payloads carry many more fields than listed here; unknown fields are
//! ignored.

use serde::{Deserialize, Serialize};

/// Envelope wrapped around every controller response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub response: T,
}

/// A PnP project, called a site by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Unique site name.
    #[serde(rename = "siteName")]
    pub name: String,
    /// Controller id.
    pub id: String,
}

/// A firmware image stored in the image namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// File name of the image.
    pub name: String,
    /// Controller id.
    pub id: String,
}

/// A stored file artifact in one of the controller namespaces.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StoredFile {
    pub name: String,
    pub id: String,
}

/// A zero-touch provisioning rule as stored on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRule {
    /// Controller id. Unknown for rules created during the current run.
    #[serde(default)]
    pub id: Option<String>,
    /// Device serial number.
    pub serial_number: String,
    /// Planned hostname.
    pub host_name: String,
    /// Platform id.
    #[serde(default)]
    pub platform_id: Option<String>,
    /// Configuration artifact id.
    #[serde(default)]
    pub config_id: Option<String>,
    /// Firmware image id.
    #[serde(default)]
    pub image_id: Option<String>,
}

/// Request body for a new provisioning rule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeviceRule {
    /// Planned hostname.
    pub host_name: String,
    /// Device serial number.
    pub serial_number: String,
    /// Platform id.
    pub platform_id: String,
    /// Site name.
    pub site: String,
    /// Configuration artifact id.
    pub config_id: String,
    /// Whether PKI enrolment is requested.
    pub pki_enabled: bool,
    /// Firmware image id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl NewDeviceRule {
    /// Creates a rule body without an image.
    #[must_use]
    pub fn new(
        serial_number: &str,
        host_name: &str,
        platform_id: &str,
        site: &str,
        config_id: &str,
    ) -> Self {
        Self {
            host_name: host_name.to_string(),
            serial_number: serial_number.to_string(),
            platform_id: platform_id.to_string(),
            site: site.to_string(),
            config_id: config_id.to_string(),
            pki_enabled: false,
            image_id: None,
        }
    }

    /// Attaches a firmware image id.
    #[must_use]
    pub fn with_image(mut self, image_id: Option<String>) -> Self {
        self.image_id = image_id;
        self
    }

    /// Converts the request into the locally cached rule.
    #[must_use]
    pub fn to_rule(&self) -> DeviceRule {
        DeviceRule {
            id: None,
            serial_number: self.serial_number.clone(),
            host_name: self.host_name.clone(),
            platform_id: Some(self.platform_id.clone()),
            config_id: Some(self.config_id.clone()),
            image_id: self.image_id.clone(),
        }
    }
}

/// Partial update for an existing rule.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRulePatch {
    /// New hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    /// New configuration artifact id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    /// New firmware image id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl DeviceRulePatch {
    /// A patch that only renames the device.
    #[must_use]
    pub fn rename(host_name: &str) -> Self {
        Self {
            host_name: Some(host_name.to_string()),
            ..Self::default()
        }
    }
}

/// Asynchronous task started by a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHandle {
    /// Task id to poll.
    pub task_id: String,
    /// Poll URL as returned by the controller.
    #[serde(default)]
    pub url: Option<String>,
}

/// Outcome of a rule create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The controller accepted the request and started a task.
    Accepted(TaskHandle),
    /// The controller answered with an inline error code.
    Rejected {
        /// Controller error code.
        code: String,
        /// Detail text.
        message: String,
    },
}

/// Raw rule mutation payload, which may carry a task or an inline error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRuleResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl From<RawRuleResponse> for RuleOutcome {
    fn from(raw: RawRuleResponse) -> Self {
        if let Some(code) = raw.error_code {
            let code = code
                .as_str()
                .map_or_else(|| code.to_string(), String::from);
            return Self::Rejected {
                code,
                message: raw.detail.or(raw.message).unwrap_or_default(),
            };
        }

        match raw.task_id {
            Some(task_id) => Self::Accepted(TaskHandle {
                task_id,
                url: raw.url,
            }),
            None => Self::Rejected {
                code: String::from("NO_TASK"),
                message: String::from("response carried neither a task id nor an error code"),
            },
        }
    }
}

/// Status of an asynchronous task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Task id.
    #[serde(default)]
    pub id: Option<String>,
    /// Progress text, sometimes a JSON document itself.
    #[serde(default)]
    pub progress: Option<String>,
    /// Whether the task failed.
    #[serde(default)]
    pub is_error: bool,
    /// Failure reason when `is_error` is set.
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Completion timestamp, present once the task finished.
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl TaskStatus {
    /// Returns true once the task has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.is_error || self.end_time.is_some()
    }

    /// Human-readable progress.
    ///
    /// The controller sometimes encodes progress as a JSON object; its
    /// `message` field is preferred when present.
    #[must_use]
    pub fn progress_message(&self) -> String {
        let Some(progress) = self.progress.as_deref() else {
            return String::new();
        };

        serde_json::from_str::<serde_json::Value>(progress)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| progress.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rule_serializes_camel_case() {
        let rule = NewDeviceRule::new("ABC123", "R1", "C9300", "HQ", "cfg-1")
            .with_image(Some(String::from("img-9")));

        let value = serde_json::to_value(&rule).expect("serializes");
        assert_eq!(
            value,
            json!({
                "hostName": "R1",
                "serialNumber": "ABC123",
                "platformId": "C9300",
                "site": "HQ",
                "configId": "cfg-1",
                "pkiEnabled": false,
                "imageId": "img-9"
            })
        );
    }

    #[test]
    fn test_new_rule_omits_missing_image() {
        let rule = NewDeviceRule::new("ABC123", "R1", "C9300", "HQ", "cfg-1");
        let value = serde_json::to_value(&rule).expect("serializes");
        assert!(value.get("imageId").is_none());
    }

    #[test]
    fn test_rule_outcome_accepted() {
        let raw: RawRuleResponse =
            serde_json::from_value(json!({ "taskId": "t-1", "url": "/task/t-1" }))
                .expect("deserializes");

        assert_eq!(
            RuleOutcome::from(raw),
            RuleOutcome::Accepted(TaskHandle {
                task_id: String::from("t-1"),
                url: Some(String::from("/task/t-1")),
            })
        );
    }

    #[test]
    fn test_rule_outcome_inline_error() {
        let raw: RawRuleResponse = serde_json::from_value(json!({
            "errorCode": "PNP_DUPLICATE",
            "message": "Duplicate",
            "detail": "Serial ABC123 already claimed"
        }))
        .expect("deserializes");

        assert_eq!(
            RuleOutcome::from(raw),
            RuleOutcome::Rejected {
                code: String::from("PNP_DUPLICATE"),
                message: String::from("Serial ABC123 already claimed"),
            }
        );
    }

    #[test]
    fn test_progress_message_plain() {
        let status = TaskStatus {
            progress: Some(String::from("Device rule created")),
            ..TaskStatus::default()
        };
        assert_eq!(status.progress_message(), "Device rule created");
    }

    #[test]
    fn test_progress_message_structured() {
        let status = TaskStatus {
            progress: Some(String::from(r#"{"message":"Success creating device","id":"x"}"#)),
            ..TaskStatus::default()
        };
        assert_eq!(status.progress_message(), "Success creating device");
    }

    #[test]
    fn test_terminal_states() {
        let running = TaskStatus::default();
        let done = TaskStatus {
            end_time: Some(1_466_000_000_000),
            ..TaskStatus::default()
        };
        let failed = TaskStatus {
            is_error: true,
            ..TaskStatus::default()
        };

        assert!(!running.is_terminal());
        assert!(done.is_terminal());
        assert!(failed.is_terminal());
    }
}
