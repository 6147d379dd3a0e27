//! Output formatting for the run report.
//!
//! The report goes to stdout, either as colored tables or as JSON; logs are
//! written to stderr separately.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::planner::ActionKind;
use crate::reconciler::RunReport;
use crate::tracker::TaskState;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Per-file row for table display.
#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Task")]
    task: String,
}

/// Per-task row for table display.
#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Progress")]
    progress: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run report for display.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        if report.files.is_empty() {
            let _ = writeln!(output, "{} No configuration files found.", "⚠".yellow());
            return output;
        }

        let _ = writeln!(
            output,
            "\nProvisioning run started {}\n",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let rows: Vec<FileRow> = report
            .files
            .iter()
            .map(|f| FileRow {
                file: f
                    .path
                    .file_name()
                    .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
                site: f.site.clone(),
                hostname: f.hostname.clone(),
                serial: f.serial.clone(),
                action: Self::format_action(f.action),
                task: f.task_id.clone().unwrap_or_else(|| String::from("-")),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if !report.tasks.is_empty() {
            let rows: Vec<TaskRow> = report
                .tasks
                .iter()
                .map(|t| TaskRow {
                    hostname: t.record.hostname.clone(),
                    serial: t.record.serial.clone(),
                    site: t.record.site.clone(),
                    state: Self::format_task_state(t.state),
                    progress: Self::truncate(
                        t.failure_reason.as_deref().unwrap_or(&t.progress),
                        50,
                    ),
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(
            output,
            "\nRules: {} created, {} renamed, {} unchanged, {} rejected, {} skipped",
            report.count(ActionKind::Created).to_string().green(),
            report.count(ActionKind::Renamed).to_string().yellow(),
            report.count(ActionKind::Unchanged),
            report.count(ActionKind::Rejected).to_string().red(),
            report.count(ActionKind::Skipped).to_string().red(),
        );
        if report.sites_created > 0 {
            let _ = write!(output, " ({} new sites)", report.sites_created);
        }
        output.push('\n');

        if report.is_clean() {
            let _ = writeln!(output, "{} No provisioning errors", "✓".green());
        } else {
            let _ = writeln!(
                output,
                "{} {} provisioning errors",
                "✗".red(),
                report.error_count()
            );
        }

        output
    }

    fn format_action(kind: ActionKind) -> String {
        match kind {
            ActionKind::Created => "+created".green().to_string(),
            ActionKind::Renamed => "~renamed".yellow().to_string(),
            ActionKind::Unchanged => "unchanged".dimmed().to_string(),
            ActionKind::Rejected => "rejected".red().to_string(),
            ActionKind::Skipped => "skipped".red().to_string(),
        }
    }

    fn format_task_state(state: TaskState) -> String {
        match state {
            TaskState::Succeeded => state.to_string().green().to_string(),
            TaskState::Pending => state.to_string().yellow().to_string(),
            TaskState::Failed | TaskState::Unreachable => state.to_string().red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}
