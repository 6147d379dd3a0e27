//! Discovery of configuration files on disk.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Extension a configuration file must carry.
pub const CONFIG_EXTENSION: &str = "txt";

/// Expands the given files and directories into configuration file paths.
///
/// Directories contribute their direct children with the configuration
/// extension, in name order. Files given directly are kept only if they
/// carry the extension. Nothing is visited recursively.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn discover_config_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut children: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && has_config_extension(p))
                .collect();
            children.sort();

            debug!(
                "Found {} configuration files in {}",
                children.len(),
                path.display()
            );
            files.extend(children);
        } else if has_config_extension(path) {
            files.push(path.clone());
        } else {
            warn!(
                "File {} doesn't end in .{CONFIG_EXTENSION}, ignoring",
                path.display()
            );
        }
    }

    Ok(files)
}

fn has_config_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == CONFIG_EXTENSION)
}
