use std::fmt;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Wire path of the revision field guarded by [`JsonPatch::guarded`].
pub const REVISION_PATH: &str = "/rev";

/// JSON Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Test,
}

impl PatchOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by `add`, `replace` and valued `test` operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Document(Value),
}

impl From<&str> for PatchValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PatchValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PatchValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PatchValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PatchValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PatchValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for PatchValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<Value> for PatchValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::String(text),
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => match (number.as_i64(), number.as_f64()) {
                (Some(integer), _) => Self::Integer(integer),
                (None, Some(float)) if number.is_f64() => Self::Float(float),
                _ => Self::Document(Value::Number(number)),
            },
            other => Self::Document(other),
        }
    }
}

/// One RFC 6902 operation. `value` is omitted from the wire when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<PatchValue>,
}

/// Ordered, append-only list of patch operations.
///
/// Operations are serialized in insertion order, which is the order the
/// remote side applies them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JsonPatch {
    operations: Vec<PatchOperation>,
}

impl JsonPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch seeded with `test /rev <revision>`.
    ///
    /// The remote write fails atomically when the resource moved past
    /// `revision` since it was fetched.
    pub fn guarded(revision: i64) -> Self {
        Self::new().test(REVISION_PATH, revision)
    }

    pub fn add(self, path: impl Into<String>, value: impl Into<PatchValue>) -> Self {
        self.push(PatchOp::Add, path.into(), Some(value.into()))
    }

    pub fn remove(self, path: impl Into<String>) -> Self {
        self.push(PatchOp::Remove, path.into(), None)
    }

    pub fn replace(self, path: impl Into<String>, value: impl Into<PatchValue>) -> Self {
        self.push(PatchOp::Replace, path.into(), Some(value.into()))
    }

    pub fn test(self, path: impl Into<String>, value: impl Into<PatchValue>) -> Self {
        self.push(PatchOp::Test, path.into(), Some(value.into()))
    }

    pub fn test_present(self, path: impl Into<String>) -> Self {
        self.push(PatchOp::Test, path.into(), None)
    }

    /// In-place form of the fluent builders, used while walking fields.
    pub fn push_operation(&mut self, operation: PatchOperation) {
        self.operations.push(operation);
    }

    /// Moves every operation of `other` to the end of `self`.
    pub fn append(&mut self, other: JsonPatch) {
        self.operations.extend(other.operations);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// `true` when the patch mutates anything beyond its `test` guards.
    pub fn has_changes(&self) -> bool {
        self.operations
            .iter()
            .any(|operation| operation.op != PatchOp::Test)
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn push(mut self, op: PatchOp, path: String, value: Option<PatchValue>) -> Self {
        self.operations.push(PatchOperation { op, path, value });
        self
    }
}

impl Add for JsonPatch {
    type Output = JsonPatch;

    fn add(mut self, rhs: JsonPatch) -> Self::Output {
        self.append(rhs);
        self
    }
}

impl AddAssign for JsonPatch {
    fn add_assign(&mut self, rhs: JsonPatch) {
        self.append(rhs);
    }
}

impl fmt::Display for JsonPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serialized = self.to_json_string().map_err(|_| fmt::Error)?;
        f.write_str(&serialized)
    }
}
