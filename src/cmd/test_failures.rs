use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Value, json};

use crate::adapters::Transport;
use crate::client::DevOpsClient;
use crate::cmd::{CommandError, CommandResponse};
use crate::domain::test_result::TestQueryFilter;
use crate::engine::failures::{FailureBucket, bucket_failures};

/// Column order of the CSV rendering.
pub const CSV_COLUMNS: &[&str] = &[
    "test",
    "container",
    "failures",
    "first_failure",
    "last_failure",
    "latest_build",
    "latest_build_number",
    "latest_result",
    "bugs",
];

#[derive(Debug, Clone, Default)]
pub struct TestFailuresCommandArgs {
    pub pipeline: u32,
    pub branch: Option<String>,
    pub since: Option<String>,
    pub outcome: String,
    pub top: Option<u32>,
    pub ignore_patterns: Vec<String>,
    pub with_bugs: bool,
}

/// Queries failed results of a pipeline and prints one row per failing test.
pub fn run<T: Transport>(
    args: &TestFailuresCommandArgs,
    client: &DevOpsClient<T>,
) -> CommandResponse {
    match execute(args, client) {
        Ok(payload) => CommandResponse::success(payload),
        Err(error) => CommandResponse::failure("test-failures", &error),
    }
}

fn execute<T: Transport>(
    args: &TestFailuresCommandArgs,
    client: &DevOpsClient<T>,
) -> Result<Value, CommandError> {
    let ignore = compile_patterns(&args.ignore_patterns)?;
    let filter = TestQueryFilter {
        pipeline: Some(args.pipeline),
        test_name: None,
        outcome: Some(args.outcome.clone()),
        branch: args.branch.clone(),
        start: args.since.as_deref().map(parse_since).transpose()?,
        max_results: args.top,
    };

    let results = client.get_test_results(&filter)?;
    let (buckets, summary) = bucket_failures(results, &ignore);
    tracing::info!(
        total = summary.total,
        distinct = summary.distinct,
        ignored = summary.ignored,
        "grouped test failures"
    );

    let mut rows = Vec::with_capacity(buckets.len());
    for bucket in &buckets {
        let bugs = if args.with_bugs {
            client
                .get_work_items_related_to_test(&bucket.test, false)?
                .into_iter()
                .filter_map(|item| item.id)
                .collect()
        } else {
            Vec::new()
        };
        rows.push(bucket_row(bucket, &bugs));
    }
    Ok(Value::Array(rows))
}

fn bucket_row(bucket: &FailureBucket, bugs: &[i64]) -> Value {
    let latest = bucket.latest();
    json!({
        "test": bucket.test,
        "container": bucket.container,
        "failures": bucket.failure_count(),
        "first_failure": bucket.first_failure().map(format_time),
        "last_failure": bucket.last_failure().map(format_time),
        "latest_build": latest.and_then(|result| result.build_id),
        "latest_build_number": latest.and_then(|result| result.build_label.clone()),
        "latest_result": latest.and_then(|result| result.result_url()),
        "bugs": bugs
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(";"),
    })
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, CommandError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|error| {
                CommandError::InputUsage(format!("invalid --ignore-pattern `{pattern}`: {error}"))
            })
        })
        .collect()
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_since(raw: &str) -> Result<DateTime<Utc>, CommandError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            CommandError::InputUsage(format!(
                "--since `{raw}` is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"
            ))
        })
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
