//! Work item, WIQL and Analytics calls on top of a [`Transport`].

pub mod url;

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::adapters::{HttpMethod, HttpRequest, Transport};
use crate::config::ClientConfig;
use crate::domain::error::ClientError;
use crate::domain::test_result::{TestQueryFilter, TestResultInfo};
use crate::domain::work_item::WorkItem;
use crate::engine::bind;

pub use url::DevOpsUrl;
use url::{TEST_RESULT_WORK_ITEMS_API_VERSION, WORK_ITEM_API_VERSION};

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

const CLOSED_STATE: &str = "Closed";

const TEST_RESULT_GROUP_BY: &str = "groupby((Outcome, PipelineRun/PipelineRunId, \
     PipelineRun/RunNumber, PipelineRun/RunReason, Test/TestCaseReferenceId, Test/ContainerName, \
     Test/FullyQualifiedTestName, Test/TestName, TestResultId, TestRun/CompletedDate, \
     TestRun/TestRunId))";

pub struct DevOpsClient<T> {
    url: DevOpsUrl,
    authorization: String,
    transport: T,
}

impl<T: Transport> DevOpsClient<T> {
    pub fn new(url: DevOpsUrl, token: &str, transport: T) -> Self {
        Self {
            url,
            authorization: format!("Basic {}", STANDARD.encode(format!(":{token}"))),
            transport,
        }
    }

    pub fn from_config(config: &ClientConfig, transport: T) -> Self {
        Self::new(config.url.clone(), &config.token, transport)
    }

    pub fn url(&self) -> &DevOpsUrl {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_work_item(&self, id: i64) -> Result<WorkItem, ClientError> {
        let request = HttpRequest::new(HttpMethod::Get, self.url.work_item(id))
            .query("$expand", "1")
            .query("api-version", WORK_ITEM_API_VERSION);
        let document = self.execute(request)?;
        Ok(WorkItem::from_document(&document))
    }

    /// Batch fetch; an empty id list makes no request.
    pub fn get_work_items(&self, ids: &[i64]) -> Result<Vec<WorkItem>, ClientError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = self.url.work_items();
        let request = HttpRequest::new(HttpMethod::Get, url.as_str())
            .query("ids", joined)
            .query("$expand", "1");
        let document = self.execute(request)?;
        let items = member_array(&document, "value", &url)?
            .iter()
            .map(WorkItem::from_document)
            .collect();
        Ok(items)
    }

    /// Runs a saved WIQL query and fetches the matching work items.
    pub fn get_work_items_from_query(&self, query_id: &str) -> Result<Vec<WorkItem>, ClientError> {
        let url = self.url.wiql(query_id);
        let request = HttpRequest::new(HttpMethod::Get, url.as_str())
            .query("api-version", WORK_ITEM_API_VERSION);
        let document = self.execute(request)?;
        let ids: Vec<i64> = member_array(&document, "workItems", &url)?
            .iter()
            .filter_map(|entry| entry.get("id").and_then(Value::as_i64))
            .collect();
        tracing::debug!(query_id, count = ids.len(), "query returned work items");
        self.get_work_items(&ids)
    }

    /// Bugs linked to an automated test; closed bugs are dropped unless asked for.
    pub fn get_work_items_related_to_test(
        &self,
        test_name: &str,
        include_closed: bool,
    ) -> Result<Vec<WorkItem>, ClientError> {
        let url = self.url.test_result_work_items();
        let request = HttpRequest::new(HttpMethod::Get, url.as_str())
            .query("api-version", TEST_RESULT_WORK_ITEMS_API_VERSION)
            .query("workItemCategory", "Microsoft.BugCategory")
            .query("automatedTestName", test_name);
        let document = self.execute(request)?;
        let mut seen = BTreeSet::new();
        let ids: Vec<i64> = member_array(&document, "value", &url)?
            .iter()
            .filter_map(|entry| entry.get("id").and_then(Value::as_i64))
            .filter(|id| seen.insert(*id))
            .collect();
        let items = self.get_work_items(&ids)?;
        Ok(items
            .into_iter()
            .filter(|item| include_closed || item.state.as_deref() != Some(CLOSED_STATE))
            .collect())
    }

    pub fn get_test_results(
        &self,
        filter: &TestQueryFilter,
    ) -> Result<Vec<TestResultInfo>, ClientError> {
        let url = self.url.analytics_test_results();
        let mut request = HttpRequest::new(HttpMethod::Get, url.as_str()).query(
            "$apply",
            format!("{}/{TEST_RESULT_GROUP_BY}", filter.apply_expression()),
        );
        if let Some(top) = filter.top() {
            request = request.query("$top", top.to_string());
        }
        let document = self.execute(request)?;
        Ok(member_array(&document, "value", &url)?
            .iter()
            .map(bind::bind::<TestResultInfo>)
            .collect())
    }

    /// Sends the item's pending changes and rebases it on the server reply.
    ///
    /// Returns `Ok(false)` without any request when nothing changed. Saved
    /// items are patched (guarded by `test /rev`); new items are created.
    pub fn try_update_work_item(&self, item: &mut WorkItem) -> Result<bool, ClientError> {
        let Some(patch) = item.pending_patch() else {
            tracing::info!(id = ?item.id, "work item has no pending changes");
            return Ok(false);
        };
        let body = patch.to_json_string().map_err(ClientError::Serialize)?;
        let (method, url) = if item.is_new() {
            let work_item_type = item
                .work_item_type
                .as_deref()
                .ok_or(ClientError::MissingType)?;
            (HttpMethod::Post, self.url.new_work_item(work_item_type))
        } else {
            let id = item.id.ok_or(ClientError::MissingId)?;
            (HttpMethod::Patch, self.url.work_item(id))
        };
        let request = HttpRequest::new(method, url)
            .query("api-version", WORK_ITEM_API_VERSION)
            .header("Content-Type", JSON_PATCH_CONTENT_TYPE)
            .body(body);

        tracing::info!(id = ?item.id, operations = patch.len(), "updating work item");
        let document = self.execute(request)?;
        item.rebase(&document);
        Ok(true)
    }

    fn execute(&self, request: HttpRequest) -> Result<Value, ClientError> {
        let request = request
            .header("Accept", "application/json")
            .header("Authorization", self.authorization.as_str());
        let response = self.transport.send(&request)?;
        if !response.is_success() {
            tracing::warn!(
                method = request.method.as_str(),
                url = %request.url,
                status = response.status,
                "request failed"
            );
            return Err(ClientError::Status {
                status: response.status,
                url: request.url,
                body: response.body,
            });
        }
        serde_json::from_str(&response.body).map_err(|source| ClientError::Decode {
            url: request.url,
            source,
        })
    }
}

fn member_array<'a>(
    document: &'a Value,
    member: &'static str,
    url: &str,
) -> Result<&'a Vec<Value>, ClientError> {
    document
        .get(member)
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MissingMember {
            url: url.to_string(),
            member,
        })
}
