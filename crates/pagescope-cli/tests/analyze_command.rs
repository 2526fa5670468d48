use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_pagescope_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("pagescope")
}

/// An empty config file so a developer's ~/.pagescope/config.json never leaks in
fn empty_config() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "{}").unwrap();
    file
}

#[test]
fn test_analyze_command_help() {
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("analyze").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Analyze a single page"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--profile"))
        .stdout(predicate::str::contains("--no-dom-events"))
        .stdout(predicate::str::contains("--wait"))
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--headful"))
        .stdout(predicate::str::contains("--chrome-path"));
}

#[test]
fn test_analyze_with_missing_chrome_fails() {
    let config = empty_config();
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("analyze")
        .arg("https://example.com")
        .arg("--config")
        .arg(config.path())
        .arg("--chrome-path")
        .arg("/nonexistent/chrome");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Chrome not found"));
}

#[test]
fn test_analyze_rejects_zero_timeout() {
    let config = empty_config();
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("analyze")
        .arg("https://example.com")
        .arg("--config")
        .arg(config.path())
        .arg("--timeout")
        .arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("navigation timeout must be greater than zero"));
}

#[test]
fn test_analyze_rejects_unknown_config_keys() {
    let config = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(config.path(), r#"{"captureDomEventz": false}"#).unwrap();

    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("analyze")
        .arg("https://example.com")
        .arg("--config")
        .arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_analyze_rejects_unknown_profile() {
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("analyze")
        .arg("https://example.com")
        .arg("--profile")
        .arg("maximal");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'maximal'"));
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_analyze_data_url_as_json() {
    let config = empty_config();
    let mut cmd = Command::new(get_pagescope_bin());
    cmd.arg("analyze")
        .arg("data:text/html,<title>Hello</title>")
        .arg("--config")
        .arg(config.path())
        .arg("--wait")
        .arg("load-complete")
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""urlAnalyzed""#))
        .stdout(predicate::str::contains(r#""title": "Hello""#));
}
