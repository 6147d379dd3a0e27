//! ZTD uploader entrypoint.
//!
//! Exit codes: 0 when every rule and task succeeded, 1 when at least one
//! rule was rejected or skipped or a task failed, 2 when the run could not
//! complete.

use std::process::ExitCode;

use clap::Parser;
use secrecy::SecretString;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ztd_uploader::apic::ApicClient;
use ztd_uploader::cli::{Cli, OutputFormatter};
use ztd_uploader::config::{ControllerSettings, discover_config_files, load_dotenv};
use ztd_uploader::error::Result;
use ztd_uploader::reconciler::{Reconciler, RunReport};
use ztd_uploader::tracker::TaskTracker;

/// Exit code for runs that could not complete.
const EXIT_FATAL: u8 = 2;

/// Exit code for runs with provisioning errors.
const EXIT_PROVISIONING_ERRORS: u8 = 1;

/// Main entrypoint.
fn main() -> ExitCode {
    // Feeds the ZTD_* fallbacks, so it must run before parsing.
    let dotenv = match load_dotenv(None) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let cli = Cli::parse();
    init_logging(cli.debug);

    match dotenv {
        Some(path) => info!("Loaded environment from: {}", path.display()),
        None => debug!("No .env file in the working directory"),
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(report) => {
            let formatter = OutputFormatter::new(cli.output);
            println!("{}", formatter.format_report(&report));

            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_PROVISIONING_ERRORS)
            }
        }
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--debug`.
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,ztd_uploader={level},ztd_upload={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs discovery, reconciliation and task tracking.
async fn run(cli: &Cli) -> Result<RunReport> {
    let files = discover_config_files(&cli.paths)?;
    if files.is_empty() {
        warn!("No configuration files found");
    } else {
        info!("Found {} configuration files", files.len());
    }

    let settings = ControllerSettings::new(
        &cli.server,
        &cli.username,
        SecretString::from(cli.password.clone()),
    )?
    .with_insecure(cli.insecure)
    .with_timeout(cli.timeout);
    debug!("Controller API at {}", settings.base_url);

    let client = ApicClient::connect(&settings).await?;

    let mut tracker = TaskTracker::new(cli.poll_policy());
    let mut report = Reconciler::new(&client)?
        .with_clear_site(cli.clear_site)
        .with_purge_configs(cli.purge_configs)
        .run(&files, &mut tracker)
        .await?;

    report.finish(tracker.poll_all(&client).await);
    Ok(report)
}
