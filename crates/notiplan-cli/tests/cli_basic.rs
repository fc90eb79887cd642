//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with an isolated HOME and verify outputs.

use std::path::Path;
use std::process::Command;

use chrono::{Duration, SecondsFormat, Utc};

/// Run a CLI command against the data directory under `home`.
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_notiplan-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("NOTIPLAN_ENV")
        .env("NOTIPLAN_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn in_minutes(minutes: i64) -> String {
    (Utc::now() + Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[test]
fn test_config_set_and_get() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "set", "scheduler.serialize_per_group", "false"]);
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "scheduler.serialize_per_group"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "false");
}

#[test]
fn test_config_rejects_invalid_key_prefix() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["config", "set", "consent.key_prefix", "my prefix"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("must not contain whitespace"));

    let (_, stdout, _) = run_cli(home.path(), &["config", "get", "consent.key_prefix"]);
    assert_eq!(stdout.trim(), "___np_local_notifications_app_permission_group:");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_schedule_after_system_grant() {
    let home = tempfile::tempdir().unwrap();
    let at = in_minutes(30);

    let (code, stdout, stderr) = run_cli(
        home.path(),
        &["schedule", "water", "Drink water", "--at", &at, "--strategy", "automatic"],
    );
    assert_eq!(code, 0, "schedule failed: {stderr}");
    assert!(stdout.starts_with("added\twater:"));

    let (code, stdout, _) = run_cli(home.path(), &["pending", "list", "--json"]);
    assert_eq!(code, 0);
    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["title"], "Drink water");

    let (_, stdout, _) = run_cli(home.path(), &["consent", "status", "water"]);
    assert_eq!(stdout.trim(), "enabled");
}

#[test]
fn test_schedule_denied_by_system() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["system", "answer", "deny"]);
    let at = in_minutes(30);

    let (code, _, stderr) = run_cli(home.path(), &["schedule", "water", "Drink", "--at", &at]);
    assert_eq!(code, 1);
    assert!(stderr.contains("denied on system level"));

    let (_, stdout, _) = run_cli(home.path(), &["system", "status"]);
    assert!(stdout.starts_with("denied"));
}

#[test]
fn test_replace_and_disable() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["system", "set", "authorized"]);
    let (a, b) = (in_minutes(10), in_minutes(20));

    run_cli(home.path(), &["schedule", "quotes", "One", "--at", &a, "--strategy", "automatic"]);
    let (code, stdout, _) = run_cli(
        home.path(),
        &["schedule", "quotes", "Two", "--at", &b, "--strategy", "automatic", "--replace"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("purged\t1"));

    let (code, stdout, _) = run_cli(home.path(), &["disable", "quotes"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("disabled quotes"));

    let (_, stdout, _) = run_cli(home.path(), &["pending", "list"]);
    assert!(stdout.contains("no pending notifications"));
    let (_, stdout, _) = run_cli(home.path(), &["consent", "get", "quotes"]);
    assert_eq!(stdout.trim(), "denied");
}

#[test]
fn test_deliver_due_notifications() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["system", "set", "authorized"]);
    let at = in_minutes(5);
    run_cli(home.path(), &["schedule", "soon", "Soon", "--at", &at]);

    let (_, stdout, _) = run_cli(home.path(), &["deliver"]);
    assert!(stdout.contains("nothing due"));

    let later = in_minutes(10);
    let (code, stdout, _) = run_cli(home.path(), &["deliver", "--now", &later]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("delivered\tsoon:"));
}

#[test]
fn test_group_id_with_separator_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["disable", "a:b"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("must not contain ':'"));
}
