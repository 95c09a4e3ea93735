//! Common test utilities for running the fmsql binary.

use std::process::Command;

/// Runs fmsql with the given arguments and an empty environment for FM_*
/// variables. Returns (exit code, stdout, stderr).
pub fn run_fmsql(args: &[&str]) -> (i32, String, String) {
    let config_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = Command::new(env!("CARGO_BIN_EXE_fmsql"))
        .args(args)
        .env_remove("FM_HOST")
        .env_remove("FM_DATABASE")
        .env_remove("FM_USER")
        .env_remove("FM_PASSWORD")
        .env("XDG_CONFIG_HOME", config_dir.path())
        .current_dir(config_dir.path())
        .output()
        .expect("Failed to execute command");

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    (exit_code, stdout, stderr)
}
