use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::adapters::Transport;
use crate::client::DevOpsClient;
use crate::cmd::{CommandError, CommandResponse, work_item_summary};

static QUERY_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap_or_else(|error| panic!("invalid query id pattern: {error}"))
});

#[derive(Debug, Clone)]
pub struct QueryBugsCommandArgs {
    pub query_id: String,
}

/// Runs a saved work item query and prints one summary per item.
pub fn run<T: Transport>(args: &QueryBugsCommandArgs, client: &DevOpsClient<T>) -> CommandResponse {
    match execute(args, client) {
        Ok(payload) => CommandResponse::success(payload),
        Err(error) => CommandResponse::failure("query-bugs", &error),
    }
}

fn execute<T: Transport>(
    args: &QueryBugsCommandArgs,
    client: &DevOpsClient<T>,
) -> Result<Value, CommandError> {
    let query_id = args.query_id.trim();
    if !QUERY_ID.is_match(query_id) {
        return Err(CommandError::InputUsage(format!(
            "query id `{query_id}` is not a GUID"
        )));
    }
    let items = client.get_work_items_from_query(query_id)?;
    Ok(Value::Array(items.iter().map(work_item_summary).collect()))
}
