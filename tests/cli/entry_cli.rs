use predicates::prelude::predicate;
use serde_json::json;

use crate::shim::{devops_cmd, parse_last_stderr_json};

#[test]
fn help_lists_subcommands() {
    devops_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("query-bugs"))
        .stdout(predicate::str::contains("test-failures"))
        .stdout(predicate::str::contains("patch"))
        .stdout(predicate::str::contains("update-work-item"));
}

#[test]
fn version_is_available() {
    devops_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = devops_cmd()
        .arg("close-everything")
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let stderr = parse_last_stderr_json(&output.stderr);
    assert_eq!(stderr["error"], json!("input_usage_error"));
    assert_eq!(stderr["code"], json!(3));
    assert_eq!(stderr["details"]["kind"], json!("cli_parse_error"));
}

#[test]
fn missing_connection_url_is_reported_before_any_request() {
    let output = devops_cmd()
        .args([
            "query-bugs",
            "--query-id",
            "6c9f4b1e-2d3a-4e5f-8a7b-9c0d1e2f3a4b",
            "--token",
            "secret",
            "--xh-bin",
            "/nonexistent/xh",
        ])
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    let stderr = parse_last_stderr_json(&output.stderr);
    assert_eq!(stderr["details"]["command"], json!("query-bugs"));
    assert_eq!(stderr["details"]["kind"], json!("config_error"));
}

#[test]
fn config_file_supplies_connection_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("devops.toml");
    std::fs::write(
        &config,
        "url = \"https://contoso.visualstudio.com/Speech\"\ntoken = \"secret\"\nxh_bin = \"/nonexistent/xh\"\n",
    )
    .expect("write config");

    let output = devops_cmd()
        .args(["update-work-item", "--id", "5", "--dry-run", "--config"])
        .arg(&config)
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    let stderr = parse_last_stderr_json(&output.stderr);
    assert_eq!(stderr["details"]["command"], json!("update-work-item"));
    assert!(
        stderr["message"]
            .as_str()
            .is_some_and(|message| message.contains("/nonexistent/xh"))
    );
}
