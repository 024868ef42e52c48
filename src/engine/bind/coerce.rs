use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

/// Primitive field type that can be bound from a JSON node.
///
/// `coerce` is lenient: documents come from an external service whose field
/// shapes drift between API versions, so a mismatch yields `None` instead of
/// an error.
pub trait Scalar: Clone + PartialEq + Send + Sync + 'static {
    fn coerce(node: &Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

impl Scalar for String {
    fn coerce(node: &Value) -> Option<Self> {
        match node {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Scalar for i64 {
    fn coerce(node: &Value) -> Option<Self> {
        match node {
            Value::Number(number) => number_to_i64(number),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl Scalar for i32 {
    fn coerce(node: &Value) -> Option<Self> {
        i64::coerce(node).and_then(|value| i32::try_from(value).ok())
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl Scalar for bool {
    fn coerce(node: &Value) -> Option<Self> {
        match node {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
            Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Scalar for f64 {
    fn coerce(node: &Value) -> Option<Self> {
        let parsed = match node {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        parsed.is_finite().then_some(parsed)
    }

    fn to_value(&self) -> Value {
        Number::from_f64(*self).map_or(Value::Null, Value::Number)
    }
}

impl Scalar for DateTime<Utc> {
    fn coerce(node: &Value) -> Option<Self> {
        let text = node.as_str()?;
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

fn number_to_i64(number: &Number) -> Option<i64> {
    if let Some(integer) = number.as_i64() {
        return Some(integer);
    }
    let float = number.as_f64()?;
    // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive.
    if float.fract() != 0.0 || float < i64::MIN as f64 || float >= -(i64::MIN as f64) {
        return None;
    }
    Some(float as i64)
}
