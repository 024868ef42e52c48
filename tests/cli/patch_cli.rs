use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::tempdir;

use crate::shim::{devops_cmd, parse_last_stderr_json, parse_stdout_json};

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, value.to_string()).expect("write fixture");
    path
}

fn saved_bug() -> Value {
    json!({
        "id": 812,
        "rev": 14,
        "fields": {
            "System.WorkItemType": "Bug",
            "System.Title": "Recognizer drops audio",
            "System.State": "Active",
            "System.AssignedTo": {"displayName": "Ada", "uniqueName": "ada@contoso.com"}
        },
        "relations": [
            {"rel": "ArtifactLink", "url": "vstfs:///Build/Build/100", "attributes": {"name": "Build"}},
            {"rel": "Hyperlink", "url": "https://contoso.test/log"}
        ]
    })
}

#[test]
fn patch_prints_guarded_delta() {
    let dir = tempdir().expect("tempdir");
    let before = write_json(dir.path(), "before.json", &saved_bug());
    let mut edited = saved_bug();
    edited["fields"]["System.State"] = json!("Resolved");
    edited["fields"]["System.AssignedTo"] = json!({"uniqueName": "grace@contoso.com"});
    edited["relations"] = json!([{"rel": "Hyperlink", "url": "https://contoso.test/log"}]);
    let after = write_json(dir.path(), "after.json", &edited);

    let output = devops_cmd()
        .arg("patch")
        .arg("--before")
        .arg(&before)
        .arg("--after")
        .arg(&after)
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stderr.is_empty());
    assert_eq!(
        parse_stdout_json(&output.stdout),
        json!([
            {"op": "test", "path": "/rev", "value": 14},
            {"op": "replace", "path": "/fields/System.State", "value": "Resolved"},
            {"op": "replace", "path": "/fields/System.AssignedTo", "value": {"uniqueName": "grace@contoso.com"}},
            {"op": "remove", "path": "/relations/0"}
        ])
    );
}

#[test]
fn patch_check_exits_two_on_changes() {
    let dir = tempdir().expect("tempdir");
    let before = write_json(dir.path(), "before.json", &saved_bug());
    let mut edited = saved_bug();
    edited["fields"]["System.Tags"] = json!("triaged");
    let after = write_json(dir.path(), "after.json", &edited);

    let output = devops_cmd()
        .args(["patch", "--check", "--no-guard", "--before"])
        .arg(&before)
        .arg("--after")
        .arg(&after)
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(
        parse_stdout_json(&output.stdout),
        json!([{"op": "add", "path": "/fields/System.Tags", "value": "triaged"}])
    );
}

#[test]
fn patch_check_exits_zero_when_documents_match() {
    let dir = tempdir().expect("tempdir");
    let before = write_json(dir.path(), "before.json", &saved_bug());
    let after = write_json(dir.path(), "after.json", &saved_bug());

    let output = devops_cmd()
        .args(["patch", "--check", "--no-guard", "--before"])
        .arg(&before)
        .arg("--after")
        .arg(&after)
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(parse_stdout_json(&output.stdout), json!([]));
}

#[test]
fn patch_reads_yaml_by_extension() {
    let dir = tempdir().expect("tempdir");
    let before = dir.path().join("before.yaml");
    let after = dir.path().join("after.yml");
    fs::write(&before, "id: 9\nrev: 3\nfields:\n  System.Title: Old\n").expect("write");
    fs::write(&after, "id: 9\nrev: 3\nfields:\n  System.Title: New\n").expect("write");

    let output = devops_cmd()
        .arg("patch")
        .arg("--before")
        .arg(&before)
        .arg("--after")
        .arg(&after)
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        parse_stdout_json(&output.stdout),
        json!([
            {"op": "test", "path": "/rev", "value": 3},
            {"op": "replace", "path": "/fields/System.Title", "value": "New"}
        ])
    );
}

#[test]
fn patch_rejects_malformed_input() {
    let dir = tempdir().expect("tempdir");
    let before = write_json(dir.path(), "before.json", &saved_bug());
    let after = dir.path().join("after.json");
    fs::write(&after, "{not json").expect("write");

    let output = devops_cmd()
        .arg("patch")
        .arg("--before")
        .arg(&before)
        .arg("--after")
        .arg(&after)
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let stderr = parse_last_stderr_json(&output.stderr);
    assert_eq!(stderr["error"], json!("input_usage_error"));
    assert_eq!(stderr["details"]["command"], json!("patch"));
}
