//! CLI argument definitions.
//!
//! Every connection flag falls back to an environment variable, and a `.env`
//! file in the working directory is loaded before parsing.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::tracker::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS, PollPolicy};

/// Upload device configurations to APIC-EM and create matching ZTD rules.
#[derive(Parser, Debug)]
#[command(name = "ztd-upload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server hostname or IP of the controller.
    #[arg(short, long, env = "ZTD_SERVER")]
    pub server: String,

    /// Username to log in with.
    #[arg(short, long, env = "ZTD_USERNAME")]
    pub username: String,

    /// Password to log in with.
    #[arg(short, long, env = "ZTD_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Delete all rules from a site before its first upload.
    #[arg(long)]
    pub clear_site: bool,

    /// Delete every stored configuration before uploading.
    #[arg(long)]
    pub purge_configs: bool,

    /// Accept invalid TLS certificates.
    #[arg(long)]
    pub insecure: bool,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Maximum time to wait for each task, in seconds.
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT_SECS)]
    pub poll_timeout: u64,

    /// First interval between task polls, in seconds.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval: u64,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Config files or directories of config files (need to end in .txt).
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Task polling policy from the poll flags.
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::default()
            .with_max_wait(Duration::from_secs(self.poll_timeout))
            .with_interval(Duration::from_secs(self.poll_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const CREDENTIALS: [&str; 7] = [
        "ztd-upload",
        "-s",
        "apic.example.net",
        "-u",
        "admin",
        "-p",
        "secret",
    ];

    #[test]
    fn test_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(CREDENTIALS).expect("parses");

        assert_eq!(cli.server, "apic.example.net");
        assert_eq!(cli.paths, vec![PathBuf::from(".")]);
        assert_eq!(cli.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.clear_site);
        assert_eq!(cli.poll_policy(), PollPolicy::default());
    }

    #[test]
    fn test_flags_and_paths() {
        let args = CREDENTIALS.iter().copied().chain([
            "-d",
            "--clear-site",
            "--poll-timeout",
            "10",
            "--output",
            "json",
            "configs",
            "extra/r1.txt",
        ]);
        let cli = Cli::try_parse_from(args).expect("parses");

        assert!(cli.debug);
        assert!(cli.clear_site);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(
            cli.paths,
            vec![PathBuf::from("configs"), PathBuf::from("extra/r1.txt")]
        );
        assert_eq!(cli.poll_policy().max_wait, Duration::from_secs(10));
    }
}
