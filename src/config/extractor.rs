//! Directive extraction from device configuration text.
//!
//! A configuration file carries its provisioning metadata inline, as the
//! `hostname` command plus a handful of `! KEYWORD value` comment lines.
//! Each directive is matched against whole lines, first occurrence wins.

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use tracing::trace;

use crate::error::{ExtractError, Result, ZtdError};

/// Directive holding the device hostname.
pub const HOSTNAME: &str = "hostname";

/// Directive holding the device serial number.
pub const SERIAL: &str = "! SERIAL";

/// Directive holding the target site name.
pub const SITE: &str = "! SITE";

/// Directive holding the platform / product id.
pub const MODEL: &str = "! MODEL";

/// Optional directive naming a firmware image.
pub const IMAGE: &str = "! IMAGE";

/// Provisioning metadata carried by a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceMetadata {
    /// Planned hostname.
    pub hostname: String,
    /// Device serial number.
    pub serial: String,
    /// Site the rule belongs to.
    pub site: String,
    /// Platform id, e.g. `C9300`.
    pub model: String,
    /// Requested firmware image, if any.
    pub image: Option<String>,
}

/// Compiled directive matchers.
#[derive(Debug, Clone)]
pub struct DirectiveExtractor {
    hostname: Regex,
    serial: Regex,
    site: Regex,
    model: Regex,
    image: Regex,
}

impl DirectiveExtractor {
    /// Compiles the directive patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            hostname: directive_pattern(HOSTNAME)?,
            serial: directive_pattern(SERIAL)?,
            site: directive_pattern(SITE)?,
            model: directive_pattern(MODEL)?,
            image: directive_pattern(IMAGE)?,
        })
    }

    /// Extracts metadata from configuration text.
    ///
    /// `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingDirective`] when `hostname`, `! SERIAL`,
    /// `! SITE` or `! MODEL` is absent.
    pub fn extract(
        &self,
        content: &str,
        path: &Path,
    ) -> std::result::Result<DeviceMetadata, ExtractError> {
        let required = |regex: &Regex, directive: &'static str| {
            first_value(regex, content).ok_or_else(|| ExtractError::MissingDirective {
                directive,
                path: path.to_path_buf(),
            })
        };

        let metadata = DeviceMetadata {
            hostname: required(&self.hostname, HOSTNAME)?,
            serial: required(&self.serial, SERIAL)?,
            site: required(&self.site, SITE)?,
            model: required(&self.model, MODEL)?,
            image: first_value(&self.image, content),
        };

        trace!("Extracted {:?} from {}", metadata, path.display());
        Ok(metadata)
    }
}

/// Builds the line-anchored pattern for one directive.
fn directive_pattern(directive: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?m)^{} (\S+)\r?$", regex::escape(directive)))
        .map_err(|e| ZtdError::internal(format!("Invalid directive pattern: {e}")))
}

fn first_value(regex: &Regex, content: &str) -> Option<String> {
    regex
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const FULL: &str = "\
! SERIAL ABC123
! SITE HQ
! MODEL C9300
! IMAGE cat9k-17.3.bin
!
hostname R1
interface Vlan1
 ip address dhcp
";

    fn extractor() -> DirectiveExtractor {
        DirectiveExtractor::new().expect("patterns compile")
    }

    #[test]
    fn test_extract_all_directives() {
        let meta = extractor()
            .extract(FULL, Path::new("r1.txt"))
            .expect("extraction should succeed");

        assert_eq!(meta.hostname, "R1");
        assert_eq!(meta.serial, "ABC123");
        assert_eq!(meta.site, "HQ");
        assert_eq!(meta.model, "C9300");
        assert_eq!(meta.image.as_deref(), Some("cat9k-17.3.bin"));
    }

    #[test]
    fn test_image_is_optional() {
        let content = "hostname R1\n! SERIAL ABC123\n! SITE HQ\n! MODEL C9300\n";
        let meta = extractor()
            .extract(content, Path::new("r1.txt"))
            .expect("extraction should succeed");

        assert_eq!(meta.image, None);
    }

    #[test]
    fn test_missing_serial_fails() {
        let content = "hostname R1\n! SITE HQ\n! MODEL C9300\n";
        let err = extractor()
            .extract(content, Path::new("cfg/r1.txt"))
            .expect_err("serial is required");

        let ExtractError::MissingDirective { directive, path } = err;
        assert_eq!(directive, SERIAL);
        assert_eq!(path, PathBuf::from("cfg/r1.txt"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = "hostname R1\r\n! SERIAL ABC123\r\n! SITE HQ\r\n! MODEL C9300\r\n";
        let meta = extractor()
            .extract(content, Path::new("r1.txt"))
            .expect("extraction should succeed");

        assert_eq!(meta.hostname, "R1");
        assert_eq!(meta.model, "C9300");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let content = "hostname R1\nhostname R2\n! SERIAL A\n! SITE HQ\n! MODEL M\n";
        let meta = extractor()
            .extract(content, Path::new("r1.txt"))
            .expect("extraction should succeed");

        assert_eq!(meta.hostname, "R1");
    }

    #[test]
    fn test_matching_is_anchored_and_case_sensitive() {
        // Indented, lowercase and multi-word variants must not match.
        let content = " hostname R1\n! serial ABC\n! SITE HQ extra\n! MODEL C9300\n";
        let err = extractor()
            .extract(content, Path::new("r1.txt"))
            .expect_err("nothing usable for hostname");

        let ExtractError::MissingDirective { directive, .. } = err;
        assert_eq!(directive, HOSTNAME);
    }
}
