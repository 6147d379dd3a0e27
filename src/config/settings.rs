//! Controller connection settings.
//!
//! Settings come from CLI flags, which fall back to `ZTD_*` environment
//! variables; a `.env` file is loaded first so it can feed those variables.

use secrecy::SecretString;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{ConfigError, Result, ZtdError};

/// Path of the REST API below the controller root.
pub const API_PATH: &str = "api/v1/";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Validated connection context for one run.
#[derive(Debug)]
pub struct ControllerSettings {
    /// API base URL, always ending in `/api/v1/`.
    pub base_url: Url,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: SecretString,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ControllerSettings {
    /// Builds settings from a server address and credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not usable as a URL or a credential
    /// is empty.
    pub fn new(server: &str, username: &str, password: SecretString) -> Result<Self> {
        use secrecy::ExposeSecret;

        if username.trim().is_empty() {
            return Err(missing("username"));
        }
        if password.expose_secret().is_empty() {
            return Err(missing("password"));
        }

        Ok(Self {
            base_url: controller_base_url(server)?,
            username: username.to_string(),
            password,
            accept_invalid_certs: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Disables TLS certificate verification.
    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.accept_invalid_certs = insecure;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

fn missing(name: &str) -> ZtdError {
    ZtdError::Config(ConfigError::MissingCredential {
        name: name.to_string(),
    })
}

/// Turns a server address into the API base URL.
///
/// A bare host (or `host:port`) becomes `https://<host>:443/api/v1/`. A bare
/// IPv6 address is bracketed first. A value that already carries a scheme is
/// taken as the controller root.
///
/// # Errors
///
/// Returns an error if the resulting URL does not parse.
pub fn controller_base_url(server: &str) -> Result<Url> {
    let server = server.trim();
    if server.is_empty() {
        return Err(ZtdError::Config(ConfigError::InvalidServer {
            server: server.to_string(),
            message: String::from("server address is empty"),
        }));
    }

    let root = if server.contains("://") {
        server.trim_end_matches('/').to_string()
    } else if server.parse::<Ipv6Addr>().is_ok() {
        format!("https://[{server}]:443")
    } else if server.contains(':') {
        format!("https://{server}")
    } else {
        format!("https://{server}:443")
    };

    Url::parse(&format!("{root}/{API_PATH}")).map_err(|e| {
        ZtdError::Config(ConfigError::InvalidServer {
            server: server.to_string(),
            message: e.to_string(),
        })
    })
}

/// Loads the .env file from `dir` (or the working directory) if present.
///
/// Runs before logging is set up, so the loaded path is returned for the
/// caller to log.
///
/// # Errors
///
/// Returns an error if the .env file exists but cannot be loaded.
pub fn load_dotenv(dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let env_path = dir.map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));
    if !env_path.exists() {
        return Ok(None);
    }

    dotenvy::from_path(&env_path).map_err(|e| {
        ZtdError::Config(ConfigError::DotEnv {
            path: env_path.clone(),
            message: e.to_string(),
        })
    })?;
    Ok(Some(env_path))
}
