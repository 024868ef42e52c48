pub mod reconcile;

use serde_json::Value;

use crate::engine::bind::Bindable;
use crate::engine::patch::{JsonPatch, PatchOperation, PatchOp};

/// Minimal patch turning `before` into `after`, field by field.
///
/// Fields are visited in declaration order and excluded fields are skipped.
/// A default `before` ("no prior state") produces an `add` for every set
/// field of `after`, which is the creation path.
///
/// # Panics
///
/// Panics when a field bound to the document root takes part in diffing:
/// such a field has no wire path and must be declared `excluded_from_diff`.
pub fn generate_delta_patch<T: Bindable>(before: &T, after: &T) -> JsonPatch {
    let mut patch = JsonPatch::new();
    for descriptor in T::fields()
        .iter()
        .filter(|descriptor| !descriptor.is_excluded_from_diff())
    {
        if descriptor.path().is_root() {
            panic!(
                "field `{}` is bound to the document root and cannot be diffed",
                descriptor.name()
            );
        }
        descriptor.diff_into(before, after, &mut patch);
    }
    patch
}

/// Single-field decision shared by every non-collection field shape.
pub(crate) fn diff_optional<V: PartialEq>(
    before: Option<&V>,
    after: Option<&V>,
    encode: impl Fn(&V) -> Value,
    wire_path: &str,
    patch: &mut JsonPatch,
) {
    let (op, value) = match (before, after) {
        (before, after) if before == after => return,
        (None, Some(after)) => (PatchOp::Add, Some(encode(after))),
        (Some(_), None) => (PatchOp::Remove, None),
        (Some(_), Some(after)) => (PatchOp::Replace, Some(encode(after))),
        (None, None) => return,
    };
    patch.push_operation(PatchOperation {
        op,
        path: wire_path.to_string(),
        value: value.map(Into::into),
    });
}
