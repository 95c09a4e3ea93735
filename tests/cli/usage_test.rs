//! Argument and configuration errors reported by fmsql.

use super::common::run_fmsql;

#[test]
fn test_help_lists_options() {
    let (code, stdout, _) = run_fmsql(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("--transaction"));
    assert!(stdout.contains("--param"));
}

#[test]
fn test_missing_connection_fails() {
    let (code, _, stderr) = run_fmsql(&["SELECT name FROM Contacts"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("No connection configured"), "{stderr}");
}

#[test]
fn test_unknown_named_connection_fails() {
    let (code, _, stderr) = run_fmsql(&["-c", "nope", "SELECT name FROM Contacts"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Connection 'nope' not found"), "{stderr}");
}

#[test]
fn test_invalid_param_fails() {
    let (code, _, stderr) = run_fmsql(&[
        "-H",
        "fms.example.com",
        "-d",
        "Contacts",
        "-p",
        "novalue",
        "SELECT name FROM Contacts",
    ]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Expected KEY=VALUE"), "{stderr}");
}
