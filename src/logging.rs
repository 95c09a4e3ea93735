//! Logging configuration for the `fmsql` binary.
//!
//! Request flow is logged under the `fmdata_sql` target. The HTTP stack
//! underneath (`reqwest`, `hyper`, `rustls`) is held at `warn` so a login or
//! a find does not bury the result in connection chatter. `FMSQL_LOG` takes
//! the usual `EnvFilter` directives and overrides the default.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "FMSQL_LOG";

/// Directives used when `FMSQL_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVES: &str = "warn,fmdata_sql=info,fmsql=info";

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard error, leaving stdout to query results.
    Stderr,
    /// The log file returned by [`log_path`].
    File,
}

/// Builds the filter from raw directives, falling back to the default.
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global subscriber.
///
/// When the log file cannot be opened, logging falls back to stderr.
pub fn init(target: LogTarget) {
    let filter = filter_from(std::env::var(LOG_ENV).ok().as_deref());

    if target == LogTarget::File {
        let path = log_path();
        let opened = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&path));
        match opened {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(file)
                    .with_ansi(false)
                    .init();
                return;
            }
            Err(e) => eprintln!("Warning: Could not open log file {}: {e}", path.display()),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the path of the log file.
///
/// Runs append to one file, so several `--transaction` runs against the same
/// database can be read back in order.
pub fn log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("fmdata-sql"))
        .unwrap_or_else(std::env::temp_dir)
        .join("fmsql.log")
}
