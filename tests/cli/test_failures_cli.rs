#![cfg(unix)]

use serde_json::{Value, json};

use crate::shim::{XhShim, devops_cmd, parse_last_stderr_json, parse_stdout_json, route};

fn failed(name: &str, run: i64, completed: &str) -> Value {
    json!({
        "Outcome": "Failed",
        "TestResultId": 100000 + run,
        "PipelineRun": {"PipelineRunId": run, "RunNumber": format!("20240401.{run}")},
        "Test": {"FullyQualifiedTestName": name, "ContainerName": "bin/Speech.Tests.dll"},
        "TestRun": {"TestRunId": run, "CompletedDate": completed}
    })
}

fn analytics_shim() -> XhShim {
    XhShim::new(&[route(
        "analytics.visualstudio.com/Speech/_odata/v4.0-preview/TestResults",
        200,
        &json!({"value": [
            failed("Speech.Tests.Streams", 7, "2024-04-01T08:00:00Z"),
            failed("Speech.Tests.Streams", 9, "2024-04-02T08:00:00Z"),
            failed("Speech.Tests.Warmup", 8, "2024-04-01T09:00:00Z")
        ]}),
    )])
}

fn base_args(shim: &XhShim) -> Vec<String> {
    vec![
        "test-failures".to_string(),
        "--url".to_string(),
        "https://contoso.visualstudio.com/Speech".to_string(),
        "--token".to_string(),
        "secret".to_string(),
        "--xh-bin".to_string(),
        shim.bin_arg(),
        "--pipeline".to_string(),
        "42".to_string(),
    ]
}

#[test]
fn test_failures_groups_results_from_analytics() {
    let shim = analytics_shim();

    let output = devops_cmd()
        .args(base_args(&shim))
        .args(["--since", "2024-03-01", "--top", "500"])
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    let payload = parse_stdout_json(&output.stdout);
    assert_eq!(payload[0]["test"], json!("Speech.Tests.Streams"));
    assert_eq!(payload[0]["container"], json!("Speech.Tests"));
    assert_eq!(payload[0]["failures"], json!(2));
    assert_eq!(payload[0]["last_failure"], json!("2024-04-02T08:00:00Z"));
    assert_eq!(payload[0]["latest_build_number"], json!("20240401.9"));
    assert_eq!(payload[1]["test"], json!("Speech.Tests.Warmup"));

    let calls = shim.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("Pipeline/PipelineId eq 42"));
    assert!(calls[0].contains("StartedDate ge 2024-03-01T00:00:00Z"));
    assert!(calls[0].contains("$top==500"));
}

#[test]
fn test_failures_renders_csv() {
    let shim = analytics_shim();

    let output = devops_cmd()
        .args(base_args(&shim))
        .args(["--format", "csv", "--ignore-pattern", "Warmup$"])
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some("test,container,failures,first_failure,last_failure,latest_build,latest_build_number,latest_result,bugs")
    );
    let row = lines.next().expect("data row");
    assert!(row.starts_with("Speech.Tests.Streams,Speech.Tests,2,"));
    assert_eq!(lines.next(), None);
}

#[test]
fn test_failures_rejects_bad_since() {
    let shim = analytics_shim();

    let output = devops_cmd()
        .args(base_args(&shim))
        .args(["--since", "yesterday"])
        .output()
        .expect("run command");

    assert_eq!(output.status.code(), Some(3));
    let stderr = parse_last_stderr_json(&output.stderr);
    assert_eq!(stderr["details"]["command"], json!("test-failures"));
    assert!(shim.calls().is_empty());
}
