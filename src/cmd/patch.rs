use std::fs::File;
use std::path::PathBuf;

use serde_json::Value;

use crate::cmd::{CommandError, CommandResponse};
use crate::domain::work_item::{WorkItem, WorkItemRelation};
use crate::engine::bind::IdentityItem;
use crate::engine::diff::generate_delta_patch;
use crate::engine::patch::JsonPatch;
use crate::io::{self, Format};

/// Input arguments for the offline `patch` command.
#[derive(Debug, Clone)]
pub struct PatchCommandArgs {
    pub before: PathBuf,
    pub after: PathBuf,
    pub from: Option<Format>,
    pub no_guard: bool,
    pub check: bool,
}

/// Prints the patch turning the `before` work item document into `after`.
///
/// With `check`, exit code 2 signals that the documents differ.
pub fn run(args: &PatchCommandArgs) -> CommandResponse {
    match execute(args) {
        Ok((patch, changed)) => {
            let payload = patch.to_value();
            if args.check && changed {
                CommandResponse::found(payload)
            } else {
                CommandResponse::success(payload)
            }
        }
        Err(error) => CommandResponse::failure("patch", &error),
    }
}

fn execute(args: &PatchCommandArgs) -> Result<(JsonPatch, bool), CommandError> {
    let before = WorkItem::from_document(&load_document(&args.before, args.from)?);
    let mut after = WorkItem::from_document(&load_document(&args.after, args.from)?);
    align_relations(&before.relations, &mut after.relations);

    let delta = generate_delta_patch(&before, &after);
    let changed = !delta.is_empty();
    tracing::info!(operations = delta.len(), "computed work item delta");

    let patch = match before.revision {
        Some(revision) if !args.no_guard => JsonPatch::guarded(revision) + delta,
        _ => delta,
    };
    Ok((patch, changed))
}

/// Gives each `after` relation the position of an unclaimed `before`
/// relation with the same `rel` and `url`; unmatched ones become additions.
fn align_relations(before: &[WorkItemRelation], after: &mut [WorkItemRelation]) {
    let mut claimed = vec![false; before.len()];
    for relation in after.iter_mut() {
        let matched = before.iter().enumerate().find(|(index, candidate)| {
            !claimed[*index] && candidate.rel == relation.rel && candidate.url == relation.url
        });
        let ordinal = matched.map(|(index, candidate)| {
            claimed[index] = true;
            candidate.ordinal()
        });
        relation.set_ordinal(ordinal.flatten());
    }
}

fn load_document(path: &PathBuf, explicit: Option<Format>) -> Result<Value, CommandError> {
    let format = io::resolve_input_format(explicit, Some(path.as_path()))
        .map_err(|error| CommandError::InputUsage(error.to_string()))?;
    let file = File::open(path).map_err(|error| {
        CommandError::InputUsage(format!(
            "failed to open input file `{}`: {error}",
            path.display()
        ))
    })?;
    io::reader::read_document(file, format).map_err(|error| {
        CommandError::InputUsage(format!("failed to read `{}`: {error}", path.display()))
    })
}
