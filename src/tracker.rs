//! Tracking of asynchronous provisioning tasks.
//!
//! Rule creates and updates return a task id. Once every file has been
//! processed, each recorded task is polled under its own id until it reaches
//! a terminal state or the poll budget runs out.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::apic::{Controller, TaskStatus};

/// Default delay before the first poll, in seconds.
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 3;

/// Default first interval between polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Default cap on the interval between polls, in seconds.
pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 8;

/// Default time budget per task, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 60;

/// Timing of task polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause before the first poll of the batch.
    pub initial_delay: Duration,
    /// First interval between polls of one task; doubles after each poll.
    pub interval: Duration,
    /// Upper bound for the interval.
    pub max_interval: Duration,
    /// Time budget per task, measured from its first poll.
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_interval: Duration::from_secs(DEFAULT_MAX_INTERVAL_SECS),
            max_wait: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
        }
    }
}

impl PollPolicy {
    /// Sets the time budget per task.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the first interval between polls.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the pause before the first poll.
    #[must_use]
    pub const fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }
}

/// A task recorded for one configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    /// Task id to poll.
    pub task_id: String,
    /// Poll URL reported by the controller.
    pub task_url: Option<String>,
    /// Device hostname.
    pub hostname: String,
    /// Device serial.
    pub serial: String,
    /// Site name.
    pub site: String,
    /// Platform id.
    pub model: String,
    /// Requested image, if any.
    pub image: Option<String>,
}

/// Final state of a polled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Finished without error.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Still running when the budget ran out.
    Pending,
    /// Status could not be fetched before the budget ran out.
    Unreachable,
}

impl TaskState {
    /// Returns true if this state counts as a provisioning error.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Failed | Self::Unreachable)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Unreachable => "unreachable",
        };
        write!(f, "{s}")
    }
}

/// Polled result of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    /// The task as recorded.
    #[serde(flatten)]
    pub record: TaskRecord,
    /// Final state.
    pub state: TaskState,
    /// Last progress message.
    pub progress: String,
    /// Failure reason or poll error.
    pub failure_reason: Option<String>,
}

/// Results of polling every recorded task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerReport {
    /// One outcome per recorded task, in recording order.
    pub outcomes: Vec<TaskOutcome>,
    /// Number of outcomes that count as errors.
    pub error_count: usize,
}

/// Collects task records and polls them.
#[derive(Debug)]
pub struct TaskTracker {
    policy: PollPolicy,
    records: Vec<TaskRecord>,
}

enum LastPoll {
    Status(TaskStatus),
    Error(String),
}

impl TaskTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            records: Vec::new(),
        }
    }

    /// Records a task for later polling.
    pub fn record(&mut self, record: TaskRecord) {
        self.records.push(record);
    }

    /// Recorded tasks.
    #[must_use]
    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Polls every recorded task in order.
    pub async fn poll_all<C: Controller + ?Sized>(&self, controller: &C) -> TrackerReport {
        if self.records.is_empty() {
            return TrackerReport::default();
        }

        info!("Uploading done, checking {} controller tasks", self.records.len());
        tokio::time::sleep(self.policy.initial_delay).await;

        let mut report = TrackerReport::default();
        for record in &self.records {
            let outcome = self.poll_one(controller, record).await;
            if outcome.state.is_error() {
                report.error_count += 1;
            }
            report.outcomes.push(outcome);
        }

        report
    }

    /// Polls one task until it is terminal or its budget is spent.
    async fn poll_one<C: Controller + ?Sized>(
        &self,
        controller: &C,
        record: &TaskRecord,
    ) -> TaskOutcome {
        info!(
            "Checking task for device {} ({}) in site {}",
            record.hostname, record.serial, record.site
        );

        let deadline = Instant::now() + self.policy.max_wait;
        let mut delay = self.policy.interval;

        let last = loop {
            let last = match controller.task_status(&record.task_id).await {
                Ok(status) if status.is_terminal() => break LastPoll::Status(status),
                Ok(status) => LastPoll::Status(status),
                Err(e) => LastPoll::Error(e.to_string()),
            };

            if Instant::now() + delay > deadline {
                break last;
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.policy.max_interval);
        };

        Self::outcome(record, last)
    }

    fn outcome(record: &TaskRecord, last: LastPoll) -> TaskOutcome {
        let (state, progress, failure_reason) = match last {
            LastPoll::Status(status) => {
                let progress = status.progress_message();
                info!("  Progress: {progress}");

                if status.is_error {
                    let reason = status.failure_reason.unwrap_or_default();
                    error!("  Failure: {reason}");
                    (TaskState::Failed, progress, Some(reason))
                } else if status.is_terminal() {
                    (TaskState::Succeeded, progress, None)
                } else {
                    warn!("  Task {} still running, giving up waiting", record.task_id);
                    (TaskState::Pending, progress, None)
                }
            }
            LastPoll::Error(message) => {
                error!("  Task {} status unavailable: {message}", record.task_id);
                (TaskState::Unreachable, String::new(), Some(message))
            }
        };

        TaskOutcome {
            record: record.clone(),
            state,
            progress,
            failure_reason,
        }
    }
}
