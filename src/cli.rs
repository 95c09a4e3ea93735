//! Command-line argument parsing for fmsql.

use clap::Parser;
use fmdata_sql::config::{Config, ConnectionConfig};
use fmdata_sql::params::ParamKey;
use fmdata_sql::types::Value;
use std::path::PathBuf;

/// How result rows are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text columns.
    #[default]
    Table,
    /// One JSON array of row objects.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: table or json")),
        }
    }
}

/// Run SQL against a FileMaker database through the Data API.
#[derive(Parser, Debug)]
#[command(name = "fmsql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL statement to run (omit when using --file)
    #[arg(value_name = "SQL")]
    pub sql: Option<String>,

    /// Read SQL from a file
    #[arg(short = 'f', long, value_name = "PATH", conflicts_with = "sql")]
    pub file: Option<PathBuf>,

    /// Server host
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Hosted database name
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Account name
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Authenticate through the cloud identity provider
    #[arg(long)]
    pub cloud: bool,

    /// Bind a parameter: `1=Oslo` for the first `?`, `city=Oslo` for `:city`
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Run `;`-separated statements inside one transaction
    #[arg(long)]
    pub transaction: bool,

    /// Output format (table or json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub format: OutputFormat,

    /// Cache the session token in the OS keyring instead of the temp directory
    #[arg(long)]
    pub keyring: bool,

    /// Write logs to the state directory instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Converts CLI arguments to a ConnectionConfig.
    ///
    /// This creates a config from CLI args only, without merging with file config.
    pub fn to_connection_config(&self) -> Option<ConnectionConfig> {
        if self.host.is_none() && self.database.is_none() && self.user.is_none() && !self.cloud {
            return None;
        }

        Some(ConnectionConfig {
            host: self.host.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: None, // Password comes from config or FM_PASSWORD
            cloud: self.cloud,
            ..Default::default()
        })
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Parses every `--param` into a key and value.
    pub fn bindings(&self) -> std::result::Result<Vec<(ParamKey, Value)>, String> {
        self.params.iter().map(|raw| parse_binding(raw)).collect()
    }
}

fn parse_binding(raw: &str) -> std::result::Result<(ParamKey, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter '{raw}'. Expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid parameter '{raw}'. Missing key"));
    }

    let key = match key.parse::<usize>() {
        Ok(0) => return Err(format!("Invalid parameter '{raw}'. Positions start at 1")),
        Ok(position) => ParamKey::Position(position),
        Err(_) => ParamKey::from(key),
    };
    Ok((key, parse_value(value)))
}

fn parse_value(text: &str) -> Value {
    if text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(text.to_string())
}
