use serde_json::{Value, json};

use crate::adapters::Transport;
use crate::client::DevOpsClient;
use crate::cmd::{CommandError, CommandResponse, work_item_summary};
use crate::domain::work_item::{ARTIFACT_LINK, Person, WorkItem, WorkItemRelation};
use crate::engine::bind::IdentityItem;

const HYPERLINK: &str = "Hyperlink";

#[derive(Debug, Clone, Default)]
pub struct UpdateWorkItemCommandArgs {
    pub id: i64,
    pub title: Option<String>,
    pub state: Option<String>,
    /// Empty string unassigns.
    pub assigned_to: Option<String>,
    pub comment: Option<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub add_links: Vec<String>,
    pub remove_links: Vec<usize>,
    pub dry_run: bool,
}

/// Fetches a work item, applies the requested edits and sends the delta.
pub fn run<T: Transport>(
    args: &UpdateWorkItemCommandArgs,
    client: &DevOpsClient<T>,
) -> CommandResponse {
    match execute(args, client) {
        Ok(payload) => CommandResponse::success(payload),
        Err(error) => CommandResponse::failure("update-work-item", &error),
    }
}

fn execute<T: Transport>(
    args: &UpdateWorkItemCommandArgs,
    client: &DevOpsClient<T>,
) -> Result<Value, CommandError> {
    let mut item = client.get_work_item(args.id)?;
    apply_edits(&mut item, args)?;

    if args.dry_run {
        let patch = item.pending_patch().map(|patch| patch.to_value());
        return Ok(json!({
            "updated": false,
            "patch": patch.unwrap_or_else(|| json!([])),
        }));
    }

    let operations = item.pending_patch().map_or(0, |patch| patch.len());
    let updated = client.try_update_work_item(&mut item)?;
    if !updated {
        tracing::info!(id = args.id, "nothing to update");
    }
    Ok(json!({
        "updated": updated,
        "operations": operations,
        "item": work_item_summary(&item),
    }))
}

fn apply_edits(item: &mut WorkItem, args: &UpdateWorkItemCommandArgs) -> Result<(), CommandError> {
    if let Some(title) = &args.title {
        item.title = Some(title.clone());
    }
    if let Some(state) = &args.state {
        item.state = Some(state.clone());
    }
    if let Some(assignee) = &args.assigned_to {
        item.assigned_to = (!assignee.is_empty()).then(|| Person::with_email(assignee.as_str()));
    }
    if let Some(comment) = &args.comment {
        item.history = Some(comment.clone());
    }
    for tag in &args.add_tags {
        item.add_tag(tag);
    }
    for tag in &args.remove_tags {
        item.remove_tag(tag);
    }
    for ordinal in &args.remove_links {
        let before = item.relations.len();
        item.relations
            .retain(|relation| relation.ordinal() != Some(*ordinal));
        if item.relations.len() == before {
            return Err(CommandError::InputUsage(format!(
                "work item {} has no relation at position {ordinal}",
                args.id
            )));
        }
    }
    for url in &args.add_links {
        let rel = if url.starts_with("vstfs:") {
            ARTIFACT_LINK
        } else {
            HYPERLINK
        };
        item.relations.push(WorkItemRelation::new(rel, url.as_str()));
    }
    Ok(())
}
