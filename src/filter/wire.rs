//! Wire payload and the per-value encoding the backend expects
use derive_deref::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::{FieldDescriptor, FieldType};
use crate::filter::operator::{Operator, ValueShape};
use crate::filter::simple::NotRepresentable;
use crate::filter::validate::InvalidReason;
use crate::filter::value::{split_list, ConditionValue};

/// Filter payload exchanged with the list collaborator: field name to either a
/// scalar (implicit equals) or an `[operator, value]` pair, plus reserved keys.
/// Key order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct WirePayload(pub Map<String, Value>);

impl WirePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Result<Self, CompileError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CompileError::MalformedPayload(format!("expected an object, got {other}"))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for WirePayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Compilation or hydration failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Invalid(#[from] InvalidReason),
    #[error(transparent)]
    NotRepresentable(#[from] NotRepresentable),
    #[error("unknown operator {token:?} for field {field}")]
    UnknownOperator { field: String, token: String },
    #[error("malformed value for field {field}: {reason}")]
    MalformedValue { field: String, reason: String },
    #[error("malformed condition list: {0}")]
    MalformedConditions(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Encodes condition values to JSON and back, field-type aware
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec<'a> {
    pub yes_label: &'a str,
    pub no_label: &'a str,
}

impl<'a> ValueCodec<'a> {
    pub fn new(yes_label: &'a str, no_label: &'a str) -> Self {
        Self { yes_label, no_label }
    }

    /// Encode a condition value for `operator` on `field`
    pub fn encode(&self, field: &FieldDescriptor, operator: Operator, value: &ConditionValue) -> Value {
        match value {
            ConditionValue::Text(text) => {
                if operator.is_like() {
                    return Value::String(wrap_wildcards(text));
                }
                if field.field_type == FieldType::Boolean {
                    if text == self.yes_label {
                        return Value::from(1);
                    }
                    if text == self.no_label {
                        return Value::from(0);
                    }
                }
                Value::String(text.clone())
            }
            ConditionValue::Range { from, to } => {
                Value::Array(vec![Value::String(from.clone()), Value::String(to.clone())])
            }
            ConditionValue::List(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            ConditionValue::Timespan(timespan) => Value::String(timespan.as_str().to_string()),
            ConditionValue::Presence(presence) => Value::String(presence.as_str().to_string()),
        }
    }

    /// Decode a wire value into the shape `operator` expects
    pub fn decode(
        &self,
        field: &FieldDescriptor,
        operator: Operator,
        raw: &Value,
    ) -> Result<ConditionValue, CompileError> {
        let malformed = |reason: &str| CompileError::MalformedValue {
            field: field.name.clone(),
            reason: reason.to_string(),
        };
        match operator.value_shape() {
            ValueShape::Scalar => {
                let text = scalar_to_string(raw).ok_or_else(|| malformed("expected a scalar"))?;
                if operator.is_like() {
                    return Ok(ConditionValue::Text(strip_wildcards(&text).to_string()));
                }
                if field.field_type == FieldType::Boolean {
                    match text.to_ascii_lowercase().as_str() {
                        "1" | "true" => return Ok(ConditionValue::text(self.yes_label)),
                        "0" | "false" => return Ok(ConditionValue::text(self.no_label)),
                        _ => {}
                    }
                }
                Ok(ConditionValue::Text(text))
            }
            ValueShape::List => match raw {
                Value::Array(items) => items
                    .iter()
                    .map(|v| scalar_to_string(v).ok_or_else(|| malformed("list items must be scalars")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ConditionValue::List),
                Value::String(s) => Ok(ConditionValue::List(split_list(s))),
                _ => Err(malformed("expected a list")),
            },
            ValueShape::Range => match raw {
                Value::Array(items) if items.len() == 2 => {
                    let from = scalar_to_string(&items[0]).ok_or_else(|| malformed("range bounds must be scalars"))?;
                    let to = scalar_to_string(&items[1]).ok_or_else(|| malformed("range bounds must be scalars"))?;
                    Ok(ConditionValue::range(from, to))
                }
                Value::String(s) => match s.split_once(',') {
                    Some((from, to)) => Ok(ConditionValue::range(from.trim(), to.trim())),
                    None => Err(malformed("expected two comma separated bounds")),
                },
                _ => Err(malformed("expected a two item range")),
            },
            ValueShape::Timespan => raw
                .as_str()
                .and_then(|s| s.trim().parse().ok())
                .map(ConditionValue::Timespan)
                .ok_or_else(|| malformed("unknown timespan")),
            ValueShape::Presence => raw
                .as_str()
                .and_then(|s| s.trim().parse().ok())
                .map(ConditionValue::Presence)
                .ok_or_else(|| malformed("expected \"set\" or \"not set\"")),
        }
    }
}

/// Stringify a JSON scalar for editing; numbers keep their JSON rendering
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Wrap a bare value as a contains pattern; values already carrying a `%`
/// are user patterns and pass through untouched
pub fn wrap_wildcards(value: &str) -> String {
    if value.contains('%') {
        value.to_string()
    } else {
        format!("%{value}%")
    }
}

/// Remove one wrapping `%` pair, if both ends carry one
pub fn strip_wildcards(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('%') && value.ends_with('%') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
