#![cfg(unix)]

use serde_json::{Value, json};

use crate::shim::{XhShim, devops_cmd, parse_stdout_json, route};

fn bug(rev: i64, state: &str) -> Value {
    json!({
        "id": 31,
        "rev": rev,
        "fields": {
            "System.WorkItemType": "Bug",
            "System.Title": "Recognizer drops audio",
            "System.State": state,
            "System.Tags": "flaky; network"
        },
        "relations": [
            {"rel": "ArtifactLink", "url": "vstfs:///Build/Build/100", "attributes": {"name": "Build"}}
        ]
    })
}

fn connection(shim: &XhShim) -> Vec<String> {
    vec![
        "--url".to_string(),
        "https://contoso.visualstudio.com/Speech".to_string(),
        "--token".to_string(),
        "secret".to_string(),
        "--xh-bin".to_string(),
        shim.bin_arg(),
    ]
}

#[test]
fn dry_run_prints_patch_and_sends_nothing() {
    let shim = XhShim::new(&[route("/_apis/wit/workitems/31", 200, &bug(6, "Active"))]);

    let output = devops_cmd()
        .args(["update-work-item", "--id", "31", "--dry-run"])
        .args(["--state", "Resolved", "--remove-tag", "FLAKY"])
        .args(connection(&shim))
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        parse_stdout_json(&output.stdout),
        json!({
            "updated": false,
            "patch": [
                {"op": "test", "path": "/rev", "value": 6},
                {"op": "replace", "path": "/fields/System.State", "value": "Resolved"},
                {"op": "replace", "path": "/fields/System.Tags", "value": "network"}
            ]
        })
    );
    assert_eq!(shim.calls().len(), 1);
}

#[test]
fn update_sends_json_patch_and_reports_new_revision() {
    let shim = XhShim::new(&[
        route("PATCH https://", 200, &bug(7, "Resolved")),
        route("GET https://", 200, &bug(6, "Active")),
    ]);

    let output = devops_cmd()
        .args(["update-work-item", "--id", "31", "--state", "Resolved"])
        .args(["--add-link", "vstfs:///Build/Build/101", "--remove-link", "0"])
        .args(connection(&shim))
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    let payload = parse_stdout_json(&output.stdout);
    assert_eq!(payload["updated"], json!(true));
    assert_eq!(payload["operations"], json!(4));
    assert_eq!(payload["item"]["rev"], json!(7));
    assert_eq!(payload["item"]["state"], json!("Resolved"));

    let calls = shim.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("--ignore-stdin --pretty=none --print=hb --session-read-only="));
    assert!(calls[0].contains(" GET https://contoso.visualstudio.com/Speech/_apis/wit/workitems/31"));
    assert!(calls[1].contains("PATCH https://contoso.visualstudio.com/Speech/_apis/wit/workitems/31"));
    assert!(calls[1].contains("Content-Type:application/json-patch+json"));
    assert!(calls[1].contains(r#"{"op":"test","path":"/rev","value":6}"#));
    assert!(calls[1].contains(r#"{"op":"remove","path":"/relations/0"}"#));
    assert!(calls[1].contains(r#""path":"/relations/-""#));
}

#[test]
fn conflicting_revision_is_reported() {
    let shim = XhShim::new(&[
        route("PATCH https://", 412, &json!({"message": "test operation failed"})),
        route("GET https://", 200, &bug(6, "Active")),
    ]);

    let output = devops_cmd()
        .args(["update-work-item", "--id", "31", "--title", "Renamed"])
        .args(connection(&shim))
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("HTTP 412"));
}
