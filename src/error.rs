//! Error types for the ZTD uploader.
//!
//! Errors are grouped by the stage that produces them: connection settings,
//! directive extraction, and the controller API. Everything here is fatal for
//! the run when it reaches `main`; provisioning failures that are merely
//! counted (task errors, rejected rules) never become a [`ZtdError`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the uploader.
#[derive(Debug, Error)]
pub enum ZtdError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A configuration file is missing a required directive.
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Controller API errors.
    #[error("Controller API error: {0}")]
    Apic(#[from] ApicError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Connection settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The server address cannot be turned into a base URL.
    #[error("Invalid server address '{server}': {message}")]
    InvalidServer {
        /// The server value as given.
        server: String,
        /// Why it was rejected.
        message: String,
    },

    /// A credential was empty or absent.
    #[error("Missing credential: {name}")]
    MissingCredential {
        /// Name of the missing setting.
        name: String,
    },

    /// The `.env` file exists but could not be loaded.
    #[error("Failed to load {path}: {message}")]
    DotEnv {
        /// Path to the file.
        path: PathBuf,
        /// Loader message.
        message: String,
    },
}

/// Directive extraction errors.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A required directive line is absent.
    #[error("{path}: required directive '{directive}' not found")]
    MissingDirective {
        /// Directive keyword, e.g. `! SERIAL`.
        directive: &'static str,
        /// File the directive was looked up in.
        path: PathBuf,
    },
}

/// Controller API errors.
#[derive(Debug, Error)]
pub enum ApicError {
    /// Login was refused or returned no ticket.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The controller answered with a non-success status.
    #[error("Request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request never produced a response.
    #[error("Network error communicating with controller: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response from controller: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A site that was just created could not be fetched back.
    #[error("Site not found: {name}")]
    SiteNotFound {
        /// Site name.
        name: String,
    },
}

/// Result type alias for uploader operations.
pub type Result<T> = std::result::Result<T, ZtdError>;

impl ZtdError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error came from login.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Apic(ApicError::AuthenticationFailed { .. }))
    }
}

impl ApicError {
    /// Creates a request-failed error.
    #[must_use]
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directive_message() {
        let err = ZtdError::from(ExtractError::MissingDirective {
            directive: "! SERIAL",
            path: PathBuf::from("cfgs/r1.txt"),
        });

        assert_eq!(
            err.to_string(),
            "Extraction error: cfgs/r1.txt: required directive '! SERIAL' not found"
        );
    }

    #[test]
    fn test_is_authentication() {
        let auth = ZtdError::from(ApicError::AuthenticationFailed {
            message: String::from("bad password"),
        });
        let other = ZtdError::from(ApicError::request_failed(500, "boom"));

        assert!(auth.is_authentication());
        assert!(!other.is_authentication());
    }
}
