//! CLI module for the ZTD uploader.
//!
//! This module provides the command-line arguments and the report
//! formatting used by the `ztd-upload` binary.

mod commands;
mod output;

pub use commands::{Cli, OutputFormat};
pub use output::OutputFormatter;
