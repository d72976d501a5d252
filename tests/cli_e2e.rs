//! End-to-end CLI tests for the uploader binary.
//!
//! None of these runs reach the network: either parsing fails, credentials
//! are missing, or the work list has nothing pending.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use support::write_store;
use tempfile::TempDir;

/// Command with credentials, endpoint overrides and the log filter
/// stripped from the inherited environment.
fn uploader() -> Command {
    let mut cmd = Command::cargo_bin("uploader").unwrap();
    for name in [
        "CLIENT_ID",
        "CLIENT_SECRET",
        "REFRESH_TOKEN",
        "UPLOADER_CSV",
        "YT_CHECK_PROCESS_SECONDS",
        "UPLOADER_DRIVE_BASE_URL",
        "UPLOADER_API_BASE_URL",
        "UPLOADER_TOKEN_URL",
        "RUST_LOG",
    ] {
        cmd.env_remove(name);
    }
    cmd
}

fn with_credentials(cmd: &mut Command) -> &mut Command {
    cmd.env("CLIENT_ID", "id")
        .env("CLIENT_SECRET", "secret")
        .env("REFRESH_TOKEN", "token")
}

#[test]
fn test_binary_help_displays_usage() {
    uploader()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-retries"));
}

#[test]
fn test_binary_version_displays_version() {
    uploader()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("uploader"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    uploader()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_help_hides_secret_env_values() {
    uploader()
        .env("CLIENT_SECRET", "super-secret-value")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-value").not());
}

#[test]
fn test_binary_missing_credentials_exits_two() {
    let dir = TempDir::new().unwrap();
    let store = write_store(dir.path(), &["https://drive.google.com/file/d/A/view,clip,,"]);
    let before = std::fs::read_to_string(&store).unwrap();

    uploader()
        .arg("--csv")
        .arg(&store)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("CLIENT_ID"));

    assert_eq!(std::fs::read_to_string(&store).unwrap(), before);
}

#[test]
fn test_binary_blank_credential_counts_as_missing() {
    let dir = TempDir::new().unwrap();
    let store = write_store(dir.path(), &[]);

    let mut cmd = uploader();
    with_credentials(&mut cmd)
        .env("REFRESH_TOKEN", "  ")
        .arg("--csv")
        .arg(&store)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("REFRESH_TOKEN"));
}

#[test]
fn test_binary_nothing_to_do_exits_zero() {
    let dir = TempDir::new().unwrap();
    let store = write_store(dir.path(), &["https://drive.google.com/file/d/A/view,clip,yes,vid-a"]);

    let mut cmd = uploader();
    with_credentials(&mut cmd)
        .arg("--csv")
        .arg(&store)
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing to do"));
}

#[test]
fn test_binary_quiet_flag_suppresses_info() {
    let dir = TempDir::new().unwrap();
    let store = write_store(dir.path(), &[]);

    let mut cmd = uploader();
    with_credentials(&mut cmd)
        .arg("-q")
        .arg("--csv")
        .arg(&store)
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing to do").not());
}

#[test]
fn test_binary_missing_store_exits_one() {
    let dir = TempDir::new().unwrap();

    let mut cmd = uploader();
    with_credentials(&mut cmd)
        .arg("--csv")
        .arg(dir.path().join("absent.csv"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.csv"));
}
