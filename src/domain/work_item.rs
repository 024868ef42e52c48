use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::engine::bind::{self, Bindable, FieldDescriptor, FieldSet, IdentityItem};
use crate::engine::diff::generate_delta_patch;
use crate::engine::patch::JsonPatch;

/// Relation type used for links to builds, tests and other artifacts.
pub const ARTIFACT_LINK: &str = "ArtifactLink";

const TAG_SEPARATOR: char = ';';

/// Identity as reported by the service (`displayName` / `uniqueName`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Person {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            display_name: None,
            email: Some(email.into()),
        }
    }
}

impl Bindable for Person {
    fn fields() -> &'static FieldSet<Self> {
        static FIELDS: Lazy<FieldSet<Person>> = Lazy::new(|| {
            FieldSet::new(vec![
                FieldDescriptor::scalar(
                    "display_name",
                    "displayName",
                    |person: &Person| &person.display_name,
                    |person: &mut Person| &mut person.display_name,
                ),
                FieldDescriptor::scalar(
                    "email",
                    "uniqueName",
                    |person: &Person| &person.email,
                    |person: &mut Person| &mut person.email,
                ),
            ])
        });
        &FIELDS
    }
}

/// Entry of a work item's `relations` array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkItemRelation {
    ordinal: Option<usize>,
    pub rel: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub comment: Option<String>,
}

impl WorkItemRelation {
    pub fn new(rel: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            ordinal: None,
            rel: Some(rel.into()),
            url: Some(url.into()),
            name: None,
            comment: None,
        }
    }

    /// Link to a build, test or result, named the way the web UI shows it.
    pub fn artifact_link(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(ARTIFACT_LINK, url)
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

impl Bindable for WorkItemRelation {
    fn fields() -> &'static FieldSet<Self> {
        static FIELDS: Lazy<FieldSet<WorkItemRelation>> = Lazy::new(|| {
            FieldSet::new(vec![
                FieldDescriptor::scalar(
                    "rel",
                    "$.rel",
                    |relation: &WorkItemRelation| &relation.rel,
                    |relation: &mut WorkItemRelation| &mut relation.rel,
                ),
                FieldDescriptor::scalar(
                    "url",
                    "$.url",
                    |relation: &WorkItemRelation| &relation.url,
                    |relation: &mut WorkItemRelation| &mut relation.url,
                ),
                FieldDescriptor::scalar(
                    "name",
                    "$.attributes.name",
                    |relation: &WorkItemRelation| &relation.name,
                    |relation: &mut WorkItemRelation| &mut relation.name,
                ),
                FieldDescriptor::scalar(
                    "comment",
                    "$.attributes.comment",
                    |relation: &WorkItemRelation| &relation.comment,
                    |relation: &mut WorkItemRelation| &mut relation.comment,
                ),
            ])
        });
        &FIELDS
    }
}

impl IdentityItem for WorkItemRelation {
    fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    fn set_ordinal(&mut self, ordinal: Option<usize>) {
        self.ordinal = ordinal;
    }
}

/// Work item (bug, task, ...) bound from `_apis/wit/workitems` responses.
///
/// `snapshot` keeps the document the item was last bound from; it is the
/// "before" side of [`WorkItem::generate_delta_patch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItem {
    pub id: Option<i64>,
    pub revision: Option<i64>,
    pub work_item_type: Option<String>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    pub repro_steps: Option<String>,
    pub history: Option<String>,
    pub incident_count: Option<i64>,
    pub tags: Option<String>,
    pub automated_test_name: Option<String>,
    pub automated_test_storage: Option<String>,
    pub assigned_to: Option<Person>,
    pub resolved_by: Option<Person>,
    pub resolved_date: Option<DateTime<Utc>>,
    pub relations: Vec<WorkItemRelation>,
    snapshot: Option<Value>,
}

impl Bindable for WorkItem {
    fn fields() -> &'static FieldSet<Self> {
        static FIELDS: Lazy<FieldSet<WorkItem>> = Lazy::new(|| {
            FieldSet::new(vec![
                FieldDescriptor::scalar(
                    "id",
                    "$.id",
                    |item: &WorkItem| &item.id,
                    |item: &mut WorkItem| &mut item.id,
                ),
                FieldDescriptor::scalar(
                    "revision",
                    "$.rev",
                    |item: &WorkItem| &item.revision,
                    |item: &mut WorkItem| &mut item.revision,
                ),
                FieldDescriptor::scalar(
                    "work_item_type",
                    "$['fields']['System.WorkItemType']",
                    |item: &WorkItem| &item.work_item_type,
                    |item: &mut WorkItem| &mut item.work_item_type,
                ),
                FieldDescriptor::scalar(
                    "title",
                    "$['fields']['System.Title']",
                    |item: &WorkItem| &item.title,
                    |item: &mut WorkItem| &mut item.title,
                ),
                FieldDescriptor::scalar(
                    "state",
                    "$['fields']['System.State']",
                    |item: &WorkItem| &item.state,
                    |item: &mut WorkItem| &mut item.state,
                ),
                FieldDescriptor::scalar(
                    "area_path",
                    "$['fields']['System.AreaPath']",
                    |item: &WorkItem| &item.area_path,
                    |item: &mut WorkItem| &mut item.area_path,
                ),
                FieldDescriptor::scalar(
                    "iteration_path",
                    "$['fields']['System.IterationPath']",
                    |item: &WorkItem| &item.iteration_path,
                    |item: &mut WorkItem| &mut item.iteration_path,
                ),
                FieldDescriptor::scalar(
                    "repro_steps",
                    "$['fields']['Microsoft.VSTS.TCM.ReproSteps']",
                    |item: &WorkItem| &item.repro_steps,
                    |item: &mut WorkItem| &mut item.repro_steps,
                ),
                FieldDescriptor::scalar(
                    "history",
                    "$['fields']['System.History']",
                    |item: &WorkItem| &item.history,
                    |item: &mut WorkItem| &mut item.history,
                ),
                FieldDescriptor::scalar(
                    "incident_count",
                    "$['fields']['IcM.IncidentCount']",
                    |item: &WorkItem| &item.incident_count,
                    |item: &mut WorkItem| &mut item.incident_count,
                ),
                FieldDescriptor::scalar(
                    "tags",
                    "$['fields']['System.Tags']",
                    |item: &WorkItem| &item.tags,
                    |item: &mut WorkItem| &mut item.tags,
                ),
                FieldDescriptor::scalar(
                    "automated_test_name",
                    "$['fields']['Microsoft.VSTS.TCM.AutomatedTestName']",
                    |item: &WorkItem| &item.automated_test_name,
                    |item: &mut WorkItem| &mut item.automated_test_name,
                ),
                FieldDescriptor::scalar(
                    "automated_test_storage",
                    "$['fields']['Microsoft.VSTS.TCM.AutomatedTestStorage']",
                    |item: &WorkItem| &item.automated_test_storage,
                    |item: &mut WorkItem| &mut item.automated_test_storage,
                ),
                FieldDescriptor::object(
                    "assigned_to",
                    "$['fields']['System.AssignedTo']",
                    |item: &WorkItem| &item.assigned_to,
                    |item: &mut WorkItem| &mut item.assigned_to,
                ),
                FieldDescriptor::object(
                    "resolved_by",
                    "$['fields']['Microsoft.VSTS.Common.ResolvedBy']",
                    |item: &WorkItem| &item.resolved_by,
                    |item: &mut WorkItem| &mut item.resolved_by,
                ),
                FieldDescriptor::scalar(
                    "resolved_date",
                    "$['fields']['Microsoft.VSTS.Common.ResolvedDate']",
                    |item: &WorkItem| &item.resolved_date,
                    |item: &mut WorkItem| &mut item.resolved_date,
                ),
                FieldDescriptor::collection(
                    "relations",
                    "$.relations",
                    |item: &WorkItem| &item.relations,
                    |item: &mut WorkItem| &mut item.relations,
                ),
                FieldDescriptor::document(
                    "snapshot",
                    "$",
                    |item: &WorkItem| &item.snapshot,
                    |item: &mut WorkItem| &mut item.snapshot,
                )
                .excluded_from_diff(),
            ])
        });
        &FIELDS
    }
}

impl WorkItem {
    /// Unsaved item of the given type (`Bug`, `Task`, ...).
    pub fn new(work_item_type: impl Into<String>) -> Self {
        Self {
            work_item_type: Some(work_item_type.into()),
            ..Self::default()
        }
    }

    pub fn from_document(document: &Value) -> Self {
        bind::bind(document)
    }

    /// `true` until the item has been bound from a server document.
    pub fn is_new(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    /// Replaces every field and the snapshot with the server's representation.
    pub fn rebase(&mut self, document: &Value) {
        *self = bind::bind(document);
    }

    /// Patch from the last bound snapshot to the current local state.
    ///
    /// Existing items are guarded with `test /rev`, so the result holds at
    /// least one operation; new items are diffed against an empty item and
    /// carry no guard.
    pub fn generate_delta_patch(&self) -> JsonPatch {
        let before = self.baseline();
        let delta = generate_delta_patch(&before, self);
        match before.revision {
            Some(revision) => JsonPatch::guarded(revision) + delta,
            None => delta,
        }
    }

    /// [`Self::generate_delta_patch`], or `None` when nothing would change.
    pub fn pending_patch(&self) -> Option<JsonPatch> {
        Some(self.generate_delta_patch()).filter(JsonPatch::has_changes)
    }

    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(TAG_SEPARATOR)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_list()
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(tag.trim()))
    }

    /// Returns `false` when the tag was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.has_tag(tag) {
            return false;
        }
        let mut tags = self.tag_list();
        tags.push(tag.to_string());
        self.set_tag_list(tags);
        true
    }

    /// Returns `false` when the tag was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tag_list();
        let remaining: Vec<String> = before
            .iter()
            .filter(|existing| !existing.eq_ignore_ascii_case(tag.trim()))
            .cloned()
            .collect();
        if remaining.len() == before.len() {
            return false;
        }
        self.set_tag_list(remaining);
        true
    }

    fn set_tag_list(&mut self, tags: Vec<String>) {
        self.tags = (!tags.is_empty()).then(|| tags.join("; "));
    }

    fn baseline(&self) -> WorkItem {
        self.snapshot.as_ref().map(bind::bind).unwrap_or_default()
    }
}
