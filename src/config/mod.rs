//! Local inputs for a provisioning run.
//!
//! This module handles everything read from the operator's machine:
//! - Discovering configuration files on disk
//! - Extracting provisioning directives from their text
//! - Building the controller connection settings

mod discovery;
mod extractor;
mod settings;

pub use discovery::{CONFIG_EXTENSION, discover_config_files};
pub use extractor::{DeviceMetadata, DirectiveExtractor, HOSTNAME, IMAGE, MODEL, SERIAL, SITE};
pub use settings::{ControllerSettings, DEFAULT_TIMEOUT_SECS, controller_base_url, load_dotenv};
