// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # ZTD Uploader
//!
//! Uploads device configurations to an APIC-EM controller and keeps its
//! zero-touch provisioning rules in line with them.
//!
//! ## Overview
//!
//! Each configuration file carries its own provisioning metadata as
//! directive lines:
//!
//! ```text
//! ! SERIAL FOC1234X0AB
//! ! SITE HQ
//! ! MODEL C9300
//! ! IMAGE cat9k_iosxe.16.06.bin
//! hostname R1
//! ```
//!
//! For every file the uploader stores the configuration on the controller
//! and then creates, renames or leaves alone the rule binding the serial
//! number to that configuration and site.
//!
//! ## Architecture
//!
//! 1. **Discovery**: configuration files are collected from the given paths
//! 2. **Snapshot**: sites, configs, images and per-site rules are read once
//! 3. **Reconciler**: each file is compared against the snapshot and the
//!    needed calls are issued, updating the snapshot as it goes
//! 4. **Tracker**: the tasks started by rule changes are polled to completion
//!
//! ## Modules
//!
//! - [`config`]: File discovery, directive extraction and connection settings
//! - [`apic`]: Controller API client
//! - [`planner`]: Controller snapshot and per-file decisions
//! - [`reconciler`]: Provisioning run over all files
//! - [`tracker`]: Task polling
//! - [`cli`]: Command-line interface

// ============================================================================
// Modules
// ============================================================================

pub mod apic;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod tracker;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use apic::{ApicClient, Controller};
pub use cli::{Cli, OutputFormatter};
pub use config::{ControllerSettings, DirectiveExtractor, discover_config_files};
pub use error::{Result, ZtdError};
pub use reconciler::{Reconciler, RunReport};
pub use tracker::{PollPolicy, TaskTracker};
