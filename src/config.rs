//! Configuration management for fmdata-sql.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named Data API connections.

use crate::error::{FmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Path segment between the host and the database name.
const DATA_API_PREFIX: &str = "fmi/data/v1/databases/";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named Data API connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// Connection parameters for one hosted database.
///
/// Values are not validated up front; a wrong host or credential surfaces as
/// a fault from the first remote call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Server host, with or without an `http(s)://` scheme.
    pub host: Option<String>,

    /// Hosted database (file) name.
    pub database: Option<String>,

    /// Account name.
    pub user: Option<String>,

    /// Account password (not recommended to store in config).
    pub password: Option<String>,

    /// Authenticate through the cloud identity exchange instead of basic auth.
    #[serde(default)]
    pub cloud: bool,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Declared primary key column per table, where it is not `rec_id`.
    #[serde(default)]
    pub primary_keys: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            database: None,
            user: None,
            password: None,
            cloud: false,
            timeout_secs: default_timeout_secs(),
            primary_keys: HashMap::new(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a connection config for the given host and database.
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            database: Some(database.into()),
            ..Default::default()
        }
    }

    /// Sets the account used to log in.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Selects cloud identity authentication.
    pub fn with_cloud(mut self, cloud: bool) -> Self {
        self.cloud = cloud;
        self
    }

    /// Returns the normalized root address of the database resource.
    ///
    /// The result always ends in exactly one `/`, e.g.
    /// `https://fms.example.com/fmi/data/v1/databases/Contacts/`.
    pub fn base_address(&self) -> Result<String> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FmError::config("Host is required"))?;
        let database = self
            .database
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| FmError::config("Database name is required"))?;

        let host = host.trim_end_matches('/');
        let mut address = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        address.push('/');
        address.push_str(DATA_API_PREFIX);
        address.push_str(database.trim_matches('/'));
        address.push('/');

        Url::parse(&address)
            .map_err(|e| FmError::config(format!("Invalid Data API address '{address}': {e}")))?;

        Ok(address)
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &ConnectionConfig) {
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        if other.database.is_some() {
            self.database = other.database.clone();
        }
        if other.user.is_some() {
            self.user = other.user.clone();
        }
        if other.password.is_some() {
            self.password = other.password.clone();
        }
        if other.cloud {
            self.cloud = true;
        }
        if other.timeout_secs != default_timeout_secs() {
            self.timeout_secs = other.timeout_secs;
        }
        for (table, column) in &other.primary_keys {
            self.primary_keys.insert(table.clone(), column.clone());
        }
    }

    /// Applies environment variables (FM_HOST, FM_DATABASE, ...) as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.host.is_none() {
            self.host = std::env::var("FM_HOST").ok();
        }
        if self.database.is_none() {
            self.database = std::env::var("FM_DATABASE").ok();
        }
        if self.user.is_none() {
            self.user = std::env::var("FM_USER").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("FM_PASSWORD").ok();
        }
    }

    /// Returns a display-safe string (no password) for logs and UI.
    pub fn display_string(&self) -> String {
        let host = self.host.as_deref().unwrap_or("unknown");
        let database = self.database.as_deref().unwrap_or("unknown");
        match &self.user {
            Some(user) => format!("{database} @ {host} as {user}"),
            None => format!("{database} @ {host}"),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fmdata-sql")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| FmError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            FmError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}
