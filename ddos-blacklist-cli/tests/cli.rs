//! Exit-code contract of the `ddos-blacklist` binary.
//!
//! Only paths that fail before touching the kernel are exercised here, so
//! the tests run unprivileged.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("ddos-blacklist").unwrap();
    cmd.env_remove("DDOS_BLACKLIST_DEVICE")
        .env_remove("DDOS_BLACKLIST_PIN_PATH")
        .env_remove("DDOS_BLACKLIST_SEEDS")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn run_without_device_is_option_failure() {
    cmd()
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--dev missing"));
}

#[test]
fn run_with_unknown_device_is_option_failure() {
    cmd()
        .args(["run", "--dev", "nosuchdev0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown"));
}

#[test]
fn run_with_long_device_name_is_option_failure() {
    cmd()
        .args(["run", "--dev", "averyveryverylongname"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("too long"));
}

#[test]
fn run_with_zero_interval_is_option_failure() {
    cmd()
        .args(["run", "--dev", "lo", "--interval", "0"])
        .assert()
        .code(2);
}

#[test]
fn unknown_flag_is_option_failure() {
    cmd().args(["run", "--bogus"]).assert().code(2);
}

#[test]
fn device_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "device = \"nosuchdev0\"").unwrap();

    cmd()
        .arg("--config")
        .arg(file.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nosuchdev0"));
}

#[test]
fn device_from_environment() {
    cmd()
        .env("DDOS_BLACKLIST_DEVICE", "nosuchdev1")
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nosuchdev1"));
}

#[test]
fn missing_config_file_is_option_failure() {
    cmd()
        .args(["--config", "/nonexistent/ddos.toml", "run", "--dev", "lo"])
        .assert()
        .code(2);
}

#[test]
fn add_invalid_address() {
    let dir = tempfile::tempdir().unwrap();
    for bad in ["not.an.ip", "256.1.1.1"] {
        cmd()
            .args(["add", bad, "--pin-path"])
            .arg(dir.path().join("ddos_blacklist"))
            .assert()
            .code(102)
            .stderr(predicate::str::contains("not in presentation format"));
    }
}

#[test]
fn remove_invalid_address() {
    cmd().args(["remove", "1.2.3"]).assert().code(102);
}

#[test]
fn seeds_from_environment_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .env("DDOS_BLACKLIST_SEEDS", "192.2.1.3,198.18.50.3")
        .args(["stats", "--pin-path"])
        .arg(dir.path().join("ddos_blacklist"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("open pinned map"));
}

#[test]
fn fatal_error_reported_once() {
    let output = cmd()
        .env("RUST_LOG", "info")
        .arg("run")
        .assert()
        .code(2)
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8(output).unwrap();
    assert_eq!(stderr.matches("--dev missing").count(), 1);
    assert_eq!(stderr.matches("ERR: ").count(), 1);
}

#[test]
fn stats_without_export_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["stats", "--pin-path"])
        .arg(dir.path().join("ddos_blacklist"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("open pinned map"));
}
