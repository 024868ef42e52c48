use std::collections::BTreeSet;

use crate::engine::bind::{IdentityItem, to_document};
use crate::engine::patch::JsonPatch;

/// Membership diff of an ordered collection, matched by bind-time ordinal.
///
/// Emits `remove {path}/{ordinal}` for every `before` ordinal that no `after`
/// item carries, in ascending ordinal order, then `add {path}/-` for every
/// `after` item without an ordinal, in `after` order. Items present on both
/// sides are not compared field by field.
///
/// Ordinals are the positions the items had in the fetched document; the
/// patch is only meaningful while the remote array still has that layout.
pub fn reconcile<I: IdentityItem>(before: &[I], after: &[I], wire_path: &str) -> JsonPatch {
    let surviving: BTreeSet<usize> = after.iter().filter_map(IdentityItem::ordinal).collect();
    let removed: BTreeSet<usize> = before
        .iter()
        .filter_map(IdentityItem::ordinal)
        .filter(|ordinal| !surviving.contains(ordinal))
        .collect();

    let mut patch = JsonPatch::new();
    for ordinal in removed {
        patch = patch.remove(format!("{wire_path}/{ordinal}"));
    }
    for added in after.iter().filter(|item| item.ordinal().is_none()) {
        patch = patch.add(format!("{wire_path}/-"), to_document(added));
    }
    patch
}
