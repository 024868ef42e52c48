use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use devops_helper::adapters::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
use devops_helper::client::{DevOpsClient, DevOpsUrl};
use devops_helper::domain::test_result::TestQueryFilter;
use serde_json::{Value, json};

/// Replays canned responses in order and keeps what was sent.
#[derive(Default)]
struct ScriptedTransport {
    replies: RefCell<VecDeque<(u16, String)>>,
    sent: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn reply(self, status: u16, body: &Value) -> Self {
        self.replies.borrow_mut().push_back((status, body.to_string()));
        self
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.borrow_mut().push(request.clone());
        let (status, body) = self
            .replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| TransportError::Parse("no scripted reply left".to_string()))?;
        Ok(HttpResponse {
            status,
            headers: BTreeMap::new(),
            body,
        })
    }
}

fn client(transport: ScriptedTransport) -> DevOpsClient<ScriptedTransport> {
    let url = DevOpsUrl::parse("https://contoso.visualstudio.com/Speech").expect("url");
    DevOpsClient::new(url, "pat", transport)
}

#[test]
fn fetch_edit_and_save_round_trip() {
    let fetched = json!({
        "id": 77,
        "rev": 4,
        "fields": {"System.WorkItemType": "Bug", "System.State": "Active"}
    });
    let mut saved = fetched.clone();
    saved["rev"] = json!(5);
    saved["fields"]["System.State"] = json!("Resolved");

    let client = client(
        ScriptedTransport::default()
            .reply(200, &fetched)
            .reply(200, &saved),
    );

    let mut item = client.get_work_item(77).expect("fetch");
    item.state = Some("Resolved".to_string());
    assert!(client.try_update_work_item(&mut item).expect("update"));
    assert_eq!(item.revision, Some(5));
    assert!(!client.try_update_work_item(&mut item).expect("noop"));

    let sent = client.transport().sent.borrow();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].method, HttpMethod::Patch);
    let body: Value = serde_json::from_str(sent[1].body.as_deref().expect("body")).expect("json");
    assert_eq!(
        body,
        json!([
            {"op": "test", "path": "/rev", "value": 4},
            {"op": "replace", "path": "/fields/System.State", "value": "Resolved"}
        ])
    );
}

#[test]
fn revision_conflict_is_distinguishable() {
    let client = client(
        ScriptedTransport::default()
            .reply(200, &json!({"id": 77, "rev": 4, "fields": {"System.Title": "A"}}))
            .reply(412, &json!({"message": "stale"})),
    );

    let mut item = client.get_work_item(77).expect("fetch");
    item.title = Some("B".to_string());
    let error = client
        .try_update_work_item(&mut item)
        .expect_err("conflict");
    assert!(error.is_conflict());
    assert_eq!(item.revision, Some(4));
}

#[test]
fn test_results_query_targets_analytics_host() {
    let client = client(ScriptedTransport::default().reply(200, &json!({"value": []})));
    let filter = TestQueryFilter {
        pipeline: Some(42),
        outcome: Some("Failed".to_string()),
        max_results: Some(100),
        ..TestQueryFilter::default()
    };

    let results = client.get_test_results(&filter).expect("results");
    assert!(results.is_empty());

    let sent = client.transport().sent.borrow();
    assert_eq!(
        sent[0].url,
        "https://contoso.analytics.visualstudio.com/Speech/_odata/v4.0-preview/TestResults"
    );
    assert_eq!(sent[0].query_value("$top"), Some("100"));
    assert!(sent[0].header_value("authorization").is_some());
}
