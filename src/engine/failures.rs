use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::test_result::TestResultInfo;

/// Failed results of one test within one test container.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureBucket {
    pub test: String,
    pub container: String,
    pub results: Vec<TestResultInfo>,
}

impl FailureBucket {
    pub fn failure_count(&self) -> usize {
        self.results.len()
    }

    pub fn first_failure(&self) -> Option<DateTime<Utc>> {
        self.results.iter().filter_map(|result| result.completed).min()
    }

    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.results.iter().filter_map(|result| result.completed).max()
    }

    /// Most recently completed result; rows without a date sort first.
    pub fn latest(&self) -> Option<&TestResultInfo> {
        self.results.iter().max_by_key(|result| result.completed)
    }
}

/// Counts of what [`bucket_failures`] kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureSummary {
    pub total: usize,
    pub distinct: usize,
    pub ignored: usize,
}

/// Groups results by test name and container.
///
/// Tests whose fully qualified name matches any `ignore` pattern are dropped.
/// Buckets are ordered by failure count (descending), then test and container
/// name.
pub fn bucket_failures(
    results: Vec<TestResultInfo>,
    ignore: &[Regex],
) -> (Vec<FailureBucket>, FailureSummary) {
    let mut summary = FailureSummary {
        total: results.len(),
        ..FailureSummary::default()
    };

    let mut by_test: BTreeMap<String, Vec<TestResultInfo>> = BTreeMap::new();
    for result in results {
        by_test
            .entry(result.display_name().to_string())
            .or_default()
            .push(result);
    }
    summary.distinct = by_test.len();

    let mut buckets = Vec::new();
    for (test, results) in by_test {
        if ignore.iter().any(|pattern| pattern.is_match(&test)) {
            summary.ignored += 1;
            continue;
        }
        let mut by_container: BTreeMap<String, Vec<TestResultInfo>> = BTreeMap::new();
        for result in results {
            let container = normalized_container(result.container.as_deref());
            by_container.entry(container).or_default().push(result);
        }
        buckets.extend(
            by_container
                .into_iter()
                .map(|(container, results)| FailureBucket {
                    test: test.clone(),
                    container,
                    results,
                }),
        );
    }
    buckets.sort_by(compare_buckets);
    (buckets, summary)
}

/// `bin/Tests.Network.dll` and `Tests.Network.dll` are the same container.
pub fn normalized_container(container: Option<&str>) -> String {
    container
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn compare_buckets(left: &FailureBucket, right: &FailureBucket) -> Ordering {
    right
        .failure_count()
        .cmp(&left.failure_count())
        .then_with(|| left.test.cmp(&right.test))
        .then_with(|| left.container.cmp(&right.container))
}
