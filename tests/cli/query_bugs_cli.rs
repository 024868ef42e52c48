#![cfg(unix)]

use serde_json::json;

use crate::shim::{XhShim, devops_cmd, parse_last_stderr_json, parse_stdout_json, route};

const QUERY_ID: &str = "6c9f4b1e-2d3a-4e5f-8a7b-9c0d1e2f3a4b";

#[test]
fn query_bugs_prints_summaries_of_query_results() {
    let shim = XhShim::new(&[
        route(
            "/_apis/wit/wiql/",
            200,
            &json!({"workItems": [{"id": 11}, {"id": 12}]}),
        ),
        route(
            "/_apis/wit/workItems",
            200,
            &json!({"value": [
                {
                    "id": 11,
                    "rev": 3,
                    "fields": {
                        "System.WorkItemType": "Bug",
                        "System.Title": "Recognizer drops audio",
                        "System.State": "Active",
                        "System.Tags": "flaky"
                    }
                },
                {
                    "id": 12,
                    "rev": 1,
                    "fields": {"System.WorkItemType": "Bug", "System.State": "New"},
                    "relations": [{"rel": "Hyperlink", "url": "https://contoso.test"}]
                }
            ]}),
        ),
    ]);

    let output = devops_cmd()
        .args([
            "query-bugs",
            "--url",
            "https://contoso.visualstudio.com/Speech",
            "--token",
            "secret",
            "--query-id",
            QUERY_ID,
            "--xh-bin",
        ])
        .arg(shim.bin_arg())
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    let payload = parse_stdout_json(&output.stdout);
    assert_eq!(payload.as_array().map(Vec::len), Some(2));
    assert_eq!(payload[0]["id"], json!(11));
    assert_eq!(payload[0]["tags"], json!(["flaky"]));
    assert_eq!(payload[1]["relations"], json!(1));

    let calls = shim.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains(&format!(
        "GET https://contoso.visualstudio.com/Speech/_apis/wit/wiql/{QUERY_ID}"
    )));
    assert!(calls[1].contains("ids==11,12"));
    assert!(calls.iter().all(|call| !call.contains("Authorization")));
    assert!(calls.iter().all(|call| call.contains("--session-read-only=")));

    let sessions = shim.sessions();
    assert_eq!(sessions.len(), 2);
    assert_eq!(
        sessions[0]["headers"],
        json!([{"name": "Authorization", "value": "Basic OnNlY3JldA=="}])
    );
}

#[test]
fn query_bugs_reports_http_errors_as_json() {
    let shim = XhShim::new(&[route(
        "/_apis/wit/wiql/",
        401,
        &json!({"message": "unauthorized"}),
    )]);

    let output = devops_cmd()
        .args(["query-bugs", "--query-id", QUERY_ID])
        .env("DEVOPS_HELPER_URL", "https://contoso.visualstudio.com/Speech")
        .env("DEVOPS_HELPER_TOKEN", "secret")
        .env("DEVOPS_HELPER_XH_BIN", shim.bin_arg())
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let stderr = parse_last_stderr_json(&output.stderr);
    assert_eq!(stderr["details"]["command"], json!("query-bugs"));
    assert!(
        stderr["message"]
            .as_str()
            .is_some_and(|message| message.contains("HTTP 401"))
    );
}

#[test]
fn query_bugs_rejects_malformed_query_id_without_calling_xh() {
    let shim = XhShim::new(&[]);

    let output = devops_cmd()
        .args([
            "query-bugs",
            "--url",
            "https://contoso.visualstudio.com/Speech",
            "--token",
            "secret",
            "--query-id",
            "last-week",
            "--xh-bin",
        ])
        .arg(shim.bin_arg())
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    assert!(shim.calls().is_empty());
}
