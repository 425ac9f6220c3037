use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn plsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("plsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn config_without_file_prints_defaults() {
    let home = TempDir::new().expect("home");
    plsync_cmd(home.path())
        .args(["config", "--install-dir"])
        .arg(home.path())
        .assert()
        .success()
        .stdout(contains("pull_interval: 1m"))
        .stdout(contains("jitter_percent: 10"))
        .stdout(contains("site_urls: []"));
}

#[test]
fn config_file_is_read_and_flags_win() {
    let home = TempDir::new().expect("home");
    fs::write(
        home.path().join("plsync.yaml"),
        "site_urls:\n  - http://127.0.0.1:9528?token=from_file\npull_interval: 5m\n",
    )
    .expect("write config");

    plsync_cmd(home.path())
        .args(["config", "--interval", "30s", "--install-dir"])
        .arg(home.path())
        .assert()
        .success()
        .stdout(contains("token=from_file"))
        .stdout(contains("pull_interval: 30s"));

    plsync_cmd(home.path())
        .args(["config", "--site-url", "http://10.0.0.1:9528?token=flag", "--install-dir"])
        .arg(home.path())
        .assert()
        .success()
        .stdout(contains("token=flag"))
        .stdout(contains("pull_interval: 5m"));
}

#[test]
fn explicit_config_path_is_honoured() {
    let home = TempDir::new().expect("home");
    let elsewhere = home.path().join("etc").join("agent.yaml");
    fs::create_dir_all(elsewhere.parent().expect("parent")).expect("mkdir");
    fs::write(&elsewhere, "jitter_percent: 25\n").expect("write config");

    plsync_cmd(home.path())
        .arg("config")
        .arg("--config")
        .arg(&elsewhere)
        .assert()
        .success()
        .stdout(contains("jitter_percent: 25"));
}

#[test]
fn malformed_config_is_an_error() {
    let home = TempDir::new().expect("home");
    fs::write(home.path().join("plsync.yaml"), "site_urls: {not: [a list\n").expect("write");

    plsync_cmd(home.path())
        .args(["config", "--install-dir"])
        .arg(home.path())
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn run_without_site_url_exits_cleanly() {
    let home = TempDir::new().expect("home");
    plsync_cmd(home.path())
        .args(["run", "--install-dir"])
        .arg(home.path())
        .assert()
        .success()
        .stdout(contains("No site URL configured"));
    assert!(!home.path().join("pipeline_remote").exists());
}

#[test]
fn one_shot_run_against_unreachable_site_fails_without_touching_disk() {
    let home = TempDir::new().expect("home");
    plsync_cmd(home.path())
        .args([
            "run",
            "--site-url",
            "http://127.0.0.1:1?token=tkn_abc",
            "--interval",
            "0s",
            "--install-dir",
        ])
        .arg(home.path())
        .assert()
        .failure()
        .stderr(contains("one-shot pull failed"));
    assert!(!home
        .path()
        .join("pipeline_remote")
        .join("pull_config.json")
        .exists());
}
