use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;

use crate::engine::bind::{Bindable, FieldDescriptor, FieldSet};

/// One grouped row of the Analytics `TestResults` entity set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestResultInfo {
    pub test_id: Option<i64>,
    pub run_result_id: Option<i64>,
    pub run_id: Option<i64>,
    pub build_id: Option<i64>,
    pub build_label: Option<String>,
    pub container: Option<String>,
    pub test_name: Option<String>,
    pub full_name: Option<String>,
    pub outcome: Option<String>,
    pub completed: Option<DateTime<Utc>>,
}

impl Bindable for TestResultInfo {
    fn fields() -> &'static FieldSet<Self> {
        static FIELDS: Lazy<FieldSet<TestResultInfo>> = Lazy::new(|| {
            FieldSet::new(vec![
                FieldDescriptor::scalar(
                    "test_id",
                    "$.Test.TestCaseReferenceId",
                    |row: &TestResultInfo| &row.test_id,
                    |row: &mut TestResultInfo| &mut row.test_id,
                ),
                FieldDescriptor::scalar(
                    "run_result_id",
                    "$.TestResultId",
                    |row: &TestResultInfo| &row.run_result_id,
                    |row: &mut TestResultInfo| &mut row.run_result_id,
                ),
                FieldDescriptor::scalar(
                    "run_id",
                    "$.TestRun.TestRunId",
                    |row: &TestResultInfo| &row.run_id,
                    |row: &mut TestResultInfo| &mut row.run_id,
                ),
                FieldDescriptor::scalar(
                    "build_id",
                    "$.PipelineRun.PipelineRunId",
                    |row: &TestResultInfo| &row.build_id,
                    |row: &mut TestResultInfo| &mut row.build_id,
                ),
                FieldDescriptor::scalar(
                    "build_label",
                    "$.PipelineRun.RunNumber",
                    |row: &TestResultInfo| &row.build_label,
                    |row: &mut TestResultInfo| &mut row.build_label,
                ),
                FieldDescriptor::scalar(
                    "container",
                    "$.Test.ContainerName",
                    |row: &TestResultInfo| &row.container,
                    |row: &mut TestResultInfo| &mut row.container,
                ),
                FieldDescriptor::scalar(
                    "test_name",
                    "$.Test.TestName",
                    |row: &TestResultInfo| &row.test_name,
                    |row: &mut TestResultInfo| &mut row.test_name,
                ),
                FieldDescriptor::scalar(
                    "full_name",
                    "$.Test.FullyQualifiedTestName",
                    |row: &TestResultInfo| &row.full_name,
                    |row: &mut TestResultInfo| &mut row.full_name,
                ),
                FieldDescriptor::scalar(
                    "outcome",
                    "$.Outcome",
                    |row: &TestResultInfo| &row.outcome,
                    |row: &mut TestResultInfo| &mut row.outcome,
                ),
                FieldDescriptor::scalar(
                    "completed",
                    "$.TestRun.CompletedDate",
                    |row: &TestResultInfo| &row.completed,
                    |row: &mut TestResultInfo| &mut row.completed,
                ),
            ])
        });
        &FIELDS
    }
}

impl TestResultInfo {
    pub fn test_url(&self) -> Option<String> {
        self.test_id
            .map(|test_id| format!("vstfs:///TestManagement/TcmTest/tcm.{test_id}"))
    }

    pub fn result_url(&self) -> Option<String> {
        match (self.run_id, self.run_result_id) {
            (Some(run_id), Some(result_id)) => Some(format!(
                "vstfs:///TestManagement/TcmResult/{run_id}.{result_id}"
            )),
            _ => None,
        }
    }

    pub fn build_url(&self) -> Option<String> {
        self.build_id
            .map(|build_id| format!("vstfs:///Build/Build/{build_id}"))
    }

    /// Name used for matching and display: fully qualified when known.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.test_name.as_deref())
            .unwrap_or_default()
    }
}

/// Analytics `$apply` filter over build-workflow test results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestQueryFilter {
    pub pipeline: Option<u32>,
    pub test_name: Option<String>,
    pub outcome: Option<String>,
    pub branch: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
}

impl TestQueryFilter {
    /// The `filter(...)` transformation, without `$top`.
    pub fn apply_expression(&self) -> String {
        let mut expression = String::from("filter(((Workflow eq 'Build'))");
        let pipeline = self
            .pipeline
            .filter(|pipeline| *pipeline > 0)
            .map(|pipeline| pipeline.to_string());
        append_clause(&mut expression, "Pipeline/PipelineId", "eq", pipeline.as_deref(), None);
        append_clause(&mut expression, "Test/TestName", "eq", self.test_name.as_deref(), None);
        append_clause(&mut expression, "Outcome", "eq", self.outcome.as_deref(), None);
        let start = self
            .start
            .map(|start| start.to_rfc3339_opts(SecondsFormat::Secs, true));
        append_clause(&mut expression, "StartedDate", "ge", start.as_deref(), Some(false));
        append_clause(&mut expression, "Branch/BranchName", "eq", self.branch.as_deref(), None);
        expression.push(')');
        expression
    }

    pub fn top(&self) -> Option<u32> {
        self.max_results.filter(|top| *top > 0)
    }
}

fn append_clause(
    expression: &mut String,
    key: &str,
    op: &str,
    value: Option<&str>,
    quote: Option<bool>,
) {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return;
    };
    let quote = quote.unwrap_or_else(|| !value.chars().all(|ch| ch.is_ascii_digit()));
    if quote {
        expression.push_str(&format!(" and {key} {op} '{}'", value.replace('\'', "''")));
    } else {
        expression.push_str(&format!(" and {key} {op} {value}"));
    }
}
