//! Declarative binding between typed objects and JSON documents.
//!
//! A bindable type declares one [`FieldDescriptor`] per mapped field. The same
//! descriptor list drives binding ([`bind`]), the inverse mapping
//! ([`to_document`]) and delta patch generation, so a field can never take
//! part in one and be invisible to the other.
//!
//! ```ignore
//! impl Bindable for Person {
//!     fn fields() -> &'static FieldSet<Self> {
//!         static FIELDS: Lazy<FieldSet<Person>> = Lazy::new(|| {
//!             FieldSet::new(vec![FieldDescriptor::scalar(
//!                 "display_name",
//!                 "$.displayName",
//!                 |person: &Person| &person.display_name,
//!                 |person: &mut Person| &mut person.display_name,
//!             )])
//!         });
//!         &FIELDS
//!     }
//! }
//! ```

pub mod coerce;

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::domain::path_expr::PathExpr;
use crate::engine::diff::{self, reconcile};
use crate::engine::patch::JsonPatch;

pub use coerce::Scalar;

/// A type whose fields are individually mapped to document locations.
pub trait Bindable: Default + Clone + Send + Sync + 'static {
    fn fields() -> &'static FieldSet<Self>;
}

/// Element of a reconciled collection.
///
/// The ordinal is the item's position in the document it was bound from.
/// `None` marks an item created locally that the remote side has not seen;
/// on the wire it becomes the `-` append slot.
pub trait IdentityItem: Bindable {
    fn ordinal(&self) -> Option<usize>;

    fn set_ordinal(&mut self, ordinal: Option<usize>);
}

/// How a field's node is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Object,
    /// Nested object that may arrive serialized inside a JSON string.
    EmbeddedObject,
    Collection,
    /// Raw JSON kept as-is.
    Document,
}

/// Static metadata and accessors for one mapped field.
pub struct FieldDescriptor<T> {
    name: &'static str,
    path: PathExpr,
    wire_path: String,
    excluded_from_diff: bool,
    shape: FieldShape,
    slot: Box<dyn FieldSlot<T>>,
}

impl<T: Bindable> FieldDescriptor<T> {
    /// # Panics
    ///
    /// Panics when `path` is not a valid path expression.
    pub fn scalar<S: Scalar>(
        name: &'static str,
        path: &str,
        get: fn(&T) -> &Option<S>,
        get_mut: fn(&mut T) -> &mut Option<S>,
    ) -> Self {
        Self::with_slot(
            name,
            path,
            FieldShape::Scalar,
            Box::new(ScalarSlot { get, get_mut }),
        )
    }

    pub fn object<B: Bindable + PartialEq>(
        name: &'static str,
        path: &str,
        get: fn(&T) -> &Option<B>,
        get_mut: fn(&mut T) -> &mut Option<B>,
    ) -> Self {
        Self::with_slot(
            name,
            path,
            FieldShape::Object,
            Box::new(ObjectSlot {
                get,
                get_mut,
                embedded: false,
            }),
        )
    }

    pub fn embedded<B: Bindable + PartialEq>(
        name: &'static str,
        path: &str,
        get: fn(&T) -> &Option<B>,
        get_mut: fn(&mut T) -> &mut Option<B>,
    ) -> Self {
        Self::with_slot(
            name,
            path,
            FieldShape::EmbeddedObject,
            Box::new(ObjectSlot {
                get,
                get_mut,
                embedded: true,
            }),
        )
    }

    pub fn collection<I: IdentityItem>(
        name: &'static str,
        path: &str,
        get: fn(&T) -> &Vec<I>,
        get_mut: fn(&mut T) -> &mut Vec<I>,
    ) -> Self {
        Self::with_slot(
            name,
            path,
            FieldShape::Collection,
            Box::new(CollectionSlot { get, get_mut }),
        )
    }

    pub fn document(
        name: &'static str,
        path: &str,
        get: fn(&T) -> &Option<Value>,
        get_mut: fn(&mut T) -> &mut Option<Value>,
    ) -> Self {
        Self::with_slot(
            name,
            path,
            FieldShape::Document,
            Box::new(DocumentSlot { get, get_mut }),
        )
    }

    /// Keeps the field out of delta patches (read-only or server-computed).
    pub fn excluded_from_diff(mut self) -> Self {
        self.excluded_from_diff = true;
        self
    }

    fn with_slot(
        name: &'static str,
        path: &str,
        shape: FieldShape,
        slot: Box<dyn FieldSlot<T>>,
    ) -> Self {
        let path = PathExpr::parse(path)
            .unwrap_or_else(|error| panic!("field `{name}` declares an invalid path: {error}"));
        Self {
            name,
            wire_path: path.to_wire_path(),
            path,
            excluded_from_diff: false,
            shape,
            slot,
        }
    }
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &PathExpr {
        &self.path
    }

    pub fn wire_path(&self) -> &str {
        &self.wire_path
    }

    pub fn is_excluded_from_diff(&self) -> bool {
        self.excluded_from_diff
    }

    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    pub(crate) fn diff_into(&self, before: &T, after: &T, patch: &mut JsonPatch) {
        self.slot.diff(before, after, &self.wire_path, patch);
    }
}

/// Ordered, immutable descriptor list of one bindable type.
pub struct FieldSet<T> {
    descriptors: Vec<FieldDescriptor<T>>,
}

impl<T> FieldSet<T> {
    /// # Panics
    ///
    /// Panics when two descriptors share a name.
    pub fn new(descriptors: Vec<FieldDescriptor<T>>) -> Self {
        let mut seen = BTreeSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name) {
                panic!("field `{}` is declared more than once", descriptor.name);
            }
        }
        Self { descriptors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor<T>> {
        self.descriptors.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.name == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Builds a fresh `T` from `document`.
///
/// Never fails: fields whose path is absent, or whose node cannot be coerced,
/// stay unset.
pub fn bind<T: Bindable>(document: &Value) -> T {
    let mut target = T::default();
    bind_into(&mut target, document);
    target
}

/// Populates `target` from `document`.
///
/// Fields whose path resolves are overwritten (a JSON `null` clears them);
/// absent paths and failed coercions leave the current value in place.
/// Collections are rebuilt and renumbered from the document.
pub fn bind_into<T: Bindable>(target: &mut T, document: &Value) {
    for descriptor in T::fields().iter() {
        if let Some(node) = descriptor.path.resolve(document) {
            descriptor.slot.bind(target, node);
        }
    }
}

/// Inverse of [`bind`]: writes every set, diffable field at its path.
///
/// Root-path and excluded fields are skipped. Used to encode nested objects
/// and collection items as patch values.
pub fn to_document<T: Bindable>(source: &T) -> Value {
    let mut document = Value::Object(Map::new());
    for descriptor in T::fields().iter() {
        if descriptor.excluded_from_diff || descriptor.path.is_root() {
            continue;
        }
        if let Some(value) = descriptor.slot.encode(source) {
            descriptor.path.assign(&mut document, value);
        }
    }
    document
}

trait FieldSlot<T>: Send + Sync {
    fn bind(&self, target: &mut T, node: &Value);

    fn encode(&self, source: &T) -> Option<Value>;

    fn diff(&self, before: &T, after: &T, wire_path: &str, patch: &mut JsonPatch);
}

struct ScalarSlot<T, S> {
    get: fn(&T) -> &Option<S>,
    get_mut: fn(&mut T) -> &mut Option<S>,
}

impl<T: Bindable, S: Scalar> FieldSlot<T> for ScalarSlot<T, S> {
    fn bind(&self, target: &mut T, node: &Value) {
        let slot = (self.get_mut)(target);
        if node.is_null() {
            *slot = None;
        } else if let Some(value) = S::coerce(node) {
            *slot = Some(value);
        }
    }

    fn encode(&self, source: &T) -> Option<Value> {
        (self.get)(source).as_ref().map(Scalar::to_value)
    }

    fn diff(&self, before: &T, after: &T, wire_path: &str, patch: &mut JsonPatch) {
        diff::diff_optional(
            (self.get)(before).as_ref(),
            (self.get)(after).as_ref(),
            Scalar::to_value,
            wire_path,
            patch,
        );
    }
}

struct ObjectSlot<T, B> {
    get: fn(&T) -> &Option<B>,
    get_mut: fn(&mut T) -> &mut Option<B>,
    embedded: bool,
}

impl<T, B: Bindable> ObjectSlot<T, B> {
    /// Embedded objects go back on the wire as a JSON string.
    fn encode_object(&self, value: &B) -> Value {
        let document = to_document(value);
        if self.embedded {
            Value::String(document.to_string())
        } else {
            document
        }
    }
}

impl<T: Bindable, B: Bindable + PartialEq> FieldSlot<T> for ObjectSlot<T, B> {
    fn bind(&self, target: &mut T, node: &Value) {
        let slot = (self.get_mut)(target);
        match node {
            Value::Null => *slot = None,
            Value::Object(_) => *slot = Some(bind(node)),
            Value::String(text) if self.embedded => {
                if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
                    *slot = Some(bind(&parsed));
                }
            }
            _ => {}
        }
    }

    fn encode(&self, source: &T) -> Option<Value> {
        (self.get)(source).as_ref().map(|value| self.encode_object(value))
    }

    fn diff(&self, before: &T, after: &T, wire_path: &str, patch: &mut JsonPatch) {
        diff::diff_optional(
            (self.get)(before).as_ref(),
            (self.get)(after).as_ref(),
            |value| self.encode_object(value),
            wire_path,
            patch,
        );
    }
}

struct CollectionSlot<T, I> {
    get: fn(&T) -> &Vec<I>,
    get_mut: fn(&mut T) -> &mut Vec<I>,
}

impl<T: Bindable, I: IdentityItem> FieldSlot<T> for CollectionSlot<T, I> {
    fn bind(&self, target: &mut T, node: &Value) {
        let slot = (self.get_mut)(target);
        match node {
            Value::Array(elements) => {
                *slot = elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        let mut item: I = bind(element);
                        item.set_ordinal(Some(index));
                        item
                    })
                    .collect();
            }
            Value::Null => slot.clear(),
            _ => {}
        }
    }

    fn encode(&self, source: &T) -> Option<Value> {
        let items = (self.get)(source);
        if items.is_empty() {
            return None;
        }
        Some(Value::Array(items.iter().map(to_document).collect()))
    }

    fn diff(&self, before: &T, after: &T, wire_path: &str, patch: &mut JsonPatch) {
        patch.append(reconcile::reconcile(
            (self.get)(before),
            (self.get)(after),
            wire_path,
        ));
    }
}

struct DocumentSlot<T> {
    get: fn(&T) -> &Option<Value>,
    get_mut: fn(&mut T) -> &mut Option<Value>,
}

impl<T: Bindable> FieldSlot<T> for DocumentSlot<T> {
    fn bind(&self, target: &mut T, node: &Value) {
        *(self.get_mut)(target) = (!node.is_null()).then(|| node.clone());
    }

    fn encode(&self, source: &T) -> Option<Value> {
        (self.get)(source).clone()
    }

    fn diff(&self, before: &T, after: &T, wire_path: &str, patch: &mut JsonPatch) {
        diff::diff_optional(
            (self.get)(before).as_ref(),
            (self.get)(after).as_ref(),
            Value::clone,
            wire_path,
            patch,
        );
    }
}
