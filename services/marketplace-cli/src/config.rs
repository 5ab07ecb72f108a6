//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The login password is read from `--password-file`, MARKETPLACE_PASSWORD
//! or stdin, never from the TOML file.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use api_client::{ClientConfig, RefreshMode};
use common::Secret;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "marketplace.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub refresh: RefreshConfig,
}

/// Backend connection settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            timeout_secs: 15,
        }
    }
}

/// Where the session credentials are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    /// Forgotten when the process exits
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage: StorageKind,
    /// Defaults to `<config dir>/marketplace/credentials.json`
    pub credential_file: Option<PathBuf>,
    pub login_route: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::default(),
            credential_file: None,
            login_route: session::DEFAULT_LOGIN_ROUTE.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Share one refresh call between concurrent failures
    pub coalesce: bool,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the resolved config file. Only the implicit default path may be
    /// absent, in which case the built-in defaults apply.
    pub fn load_resolved(path: &Path, explicit: bool) -> common::Result<Self> {
        if !explicit && !path.exists() {
            return Ok(Config::default());
        }
        Self::load(path)
    }

    /// Resolve config file path from CLI arg or MARKETPLACE_CONFIG env var.
    ///
    /// The flag is true when the path was asked for explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("MARKETPLACE_CONFIG") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.session.login_route.starts_with('/') {
            return Err(common::Error::Config(format!(
                "login_route must start with /, got: {}",
                self.session.login_route
            )));
        }

        Ok(())
    }

    /// Replace the base URL (from `--api-url` or MARKETPLACE_API_URL).
    pub fn override_base_url(&mut self, url: String) -> common::Result<()> {
        self.api.base_url = url;
        self.validate()
    }

    pub fn credential_file(&self) -> common::Result<PathBuf> {
        if let Some(path) = &self.session.credential_file {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("marketplace").join("credentials.json"))
            .ok_or(common::Error::Missing("credential_file"))
    }

    pub fn refresh_mode(&self) -> RefreshMode {
        if self.refresh.coalesce {
            RefreshMode::Coalesced
        } else {
            RefreshMode::Independent
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(self.api.base_url.clone());
        client.timeout = Duration::from_secs(self.api.timeout_secs);
        client.login_route = self.session.login_route.clone();
        client.refresh_mode = self.refresh_mode();
        client
    }
}

/// Resolve the login password.
///
/// Resolution order:
/// 1. `--password-file`
/// 2. MARKETPLACE_PASSWORD env var
/// 3. first line of `stdin`
pub fn read_password(
    password_file: Option<&Path>,
    stdin: impl BufRead,
) -> common::Result<Secret<String>> {
    let raw = if let Some(path) = password_file {
        std::fs::read_to_string(path).map_err(|e| {
            common::Error::Config(format!(
                "failed to read password_file {}: {e}",
                path.display()
            ))
        })?
    } else if let Ok(password) = std::env::var("MARKETPLACE_PASSWORD") {
        password
    } else {
        let mut line = String::new();
        stdin.take(4096).read_line(&mut line)?;
        line
    };

    let password = raw.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(common::Error::Missing("password"));
    }
    Ok(Secret::new(password))
}
