//! Tolerant field readers for payloads whose field types drift between API
//! versions. Each `deserialize_with` helper accepts any JSON value and never
//! fails, so one odd field cannot sink a whole record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::model::EntityId;

/// JavaScript-style truthiness, which is what the API's own clients test against.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A display string: non-empty strings, or truthy numbers rendered as text.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(_) if is_truthy(value) => Some(value.to_string()),
        _ => None,
    }
}

pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(text_of(&Value::deserialize(deserializer)?))
}

pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

/// Any truthy value counts as a timestamp; strings are kept verbatim.
pub fn stamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !is_truthy(&value) {
        return Ok(None);
    }
    Ok(Some(match value {
        Value::String(s) => s,
        other => other.to_string(),
    }))
}

pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<EntityId>, D::Error> {
    Ok(EntityId::from_json(&Value::deserialize(deserializer)?))
}

/// Arrays only; anything else reads as absent.
pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items),
        _ => None,
    })
}

/// JSON numbers only; numeric strings do not count.
pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        _ => None,
    })
}
