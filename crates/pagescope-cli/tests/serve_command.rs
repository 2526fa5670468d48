use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_pagescope_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("pagescope")
}

#[test]
fn test_serve_command_help() {
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("serve").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Serve POST /analyze over HTTP"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("[default: 3000]"))
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("--connect"));
}

#[test]
fn test_serve_without_chrome_fails_before_listening() {
    let config = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(config.path(), "{}").unwrap();

    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("serve")
        .arg("--port")
        .arg("0")
        .arg("--config")
        .arg(config.path())
        .arg("--chrome-path")
        .arg("/nonexistent/chrome");

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("listening").not())
        .stderr(predicate::str::contains("Chrome not found"));
}

#[test]
fn test_serve_rejects_bad_host() {
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("serve").arg("--host").arg("not-an-ip");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'not-an-ip'"));
}
