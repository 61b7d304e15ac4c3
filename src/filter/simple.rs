//! SimpleFilterAdapter: flat per-field filters and their correspondence with a single AND group
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::FilterSettings;
use crate::core::FieldCatalog;
use crate::filter::operator::{Operator, OperatorCatalog};
use crate::filter::tree::{Condition, Conjunction, Group, Node};
use crate::filter::validate::{self, InvalidReason};
use crate::filter::value::ConditionValue;
use crate::filter::wire::{CompileError, ValueCodec, WirePayload};

/// Operator and value of one simple-mode row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
pub struct SimpleFilter {
    pub operator: Operator,
    pub value: ConditionValue,
}

impl SimpleFilter {
    pub fn new(operator: Operator, value: ConditionValue) -> Self {
        Self { operator, value }
    }

    pub fn equals(value: impl Into<String>) -> Self {
        Self::new(Operator::Equals, ConditionValue::text(value))
    }
}

/// Field name to filter, at most one entry per field, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
pub struct SimpleFilterMap {
    entries: Vec<(String, SimpleFilter)>,
}

impl SimpleFilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter for `field`, replacing an existing one in place
    pub fn insert(&mut self, field: impl Into<String>, filter: SimpleFilter) -> Option<SimpleFilter> {
        let field = field.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => Some(std::mem::replace(existing, filter)),
            None => {
                self.entries.push((field, filter));
                None
            }
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<SimpleFilter> {
        let index = self.entries.iter().position(|(name, _)| name == field)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, field: &str) -> Option<&SimpleFilter> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, filter)| filter)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SimpleFilter)> {
        self.entries.iter().map(|(name, filter)| (name.as_str(), filter))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: Into<String>> FromIterator<(S, SimpleFilter)> for SimpleFilterMap {
    fn from_iter<T: IntoIterator<Item = (S, SimpleFilter)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (field, filter) in iter {
            map.insert(field, filter);
        }
        map
    }
}

/// Why a tree has no simple-mode equivalent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotRepresentable {
    #[error("nested groups cannot be shown as simple filters")]
    NestedGroup,
    #[error("OR groups cannot be shown as simple filters")]
    OrConjunction,
    #[error("field {0} is filtered more than once")]
    DuplicateField(String),
    #[error(transparent)]
    Incomplete(#[from] InvalidReason),
}

/// Wire entries split into field filters and reserved keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPayload {
    pub filters: SimpleFilterMap,
    pub reserved: Map<String, Value>,
}

/// Converts between simple filter maps, flat AND groups and wire entries
pub struct SimpleFilterAdapter<'a> {
    catalog: &'a FieldCatalog,
    settings: &'a FilterSettings,
}

impl<'a> SimpleFilterAdapter<'a> {
    pub fn new(catalog: &'a FieldCatalog, settings: &'a FilterSettings) -> Self {
        Self { catalog, settings }
    }

    fn codec(&self) -> ValueCodec<'a> {
        ValueCodec::new(&self.settings.yes_label, &self.settings.no_label)
    }

    /// One AND group with a condition per entry, in map order
    pub fn to_tree(&self, map: &SimpleFilterMap) -> Group {
        let children = map
            .iter()
            .map(|(field, filter)| {
                Node::Condition(Condition::new(
                    self.catalog.resolve(field),
                    filter.operator,
                    filter.value.clone(),
                ))
            })
            .collect();
        Group::and(children)
    }

    /// Flatten a tree back into a map; only a flat AND group of complete,
    /// distinct-field conditions qualifies. A lone condition under OR is
    /// accepted since the conjunction has no effect there.
    pub fn to_map(&self, tree: &Group) -> Result<SimpleFilterMap, NotRepresentable> {
        if !tree.is_flat() {
            return Err(NotRepresentable::NestedGroup);
        }
        if tree.conjunction == Conjunction::Or && tree.len() > 1 {
            return Err(NotRepresentable::OrConjunction);
        }
        let mut map = SimpleFilterMap::new();
        for (index, node) in tree.children.iter().enumerate() {
            let Node::Condition(condition) = node else {
                return Err(NotRepresentable::NestedGroup);
            };
            validate::validate_condition(condition).map_err(|reason| with_index(reason, index))?;
            let (Some(field), Some(operator)) = (&condition.field, condition.operator) else {
                continue;
            };
            if map.contains(&field.name) {
                return Err(NotRepresentable::DuplicateField(field.name.clone()));
            }
            map.insert(field.name.clone(), SimpleFilter::new(operator, condition.value.clone()));
        }
        Ok(map)
    }

    /// Wire form of one entry: bare scalar for equals, `[token, value]` otherwise
    pub fn entry_to_wire(&self, field: &str, filter: &SimpleFilter) -> Value {
        let descriptor = self.catalog.resolve(field);
        let value = self.codec().encode(&descriptor, filter.operator, &filter.value);
        match filter.operator {
            Operator::Equals => value,
            operator => Value::Array(vec![Value::String(operator.wire_token().to_string()), value]),
        }
    }

    /// Read one wire entry. A non-list value is an implicit equals; a list is
    /// `[operator token, value]`.
    pub fn entry_from_wire(&self, field: &str, raw: &Value) -> Result<SimpleFilter, CompileError> {
        let descriptor = self.catalog.resolve(field);
        let (operator, raw_value) = match raw {
            Value::Array(pair) => {
                let [token, value] = pair.as_slice() else {
                    return Err(CompileError::MalformedValue {
                        field: field.to_string(),
                        reason: format!("expected [operator, value], got {raw}"),
                    });
                };
                let token = token.as_str().unwrap_or_default();
                let operator = Operator::from_wire(token).ok_or_else(|| CompileError::UnknownOperator {
                    field: field.to_string(),
                    token: token.to_string(),
                })?;
                (operator, value)
            }
            scalar => (Operator::Equals, scalar),
        };
        let value = self.codec().decode(&descriptor, operator, raw_value)?;
        Ok(SimpleFilter::new(operator, value))
    }

    /// Ordinary entries of a map as wire key/value pairs
    pub fn map_to_wire(&self, map: &SimpleFilterMap) -> WirePayload {
        let mut payload = WirePayload::new();
        for (field, filter) in map.iter() {
            payload.insert(field.to_string(), self.entry_to_wire(field, filter));
        }
        payload
    }

    /// Split a payload into field filters and reserved keys, kept verbatim
    pub fn map_from_wire(&self, payload: &WirePayload) -> Result<SplitPayload, CompileError> {
        let mut split = SplitPayload::default();
        for (key, raw) in payload.iter() {
            if self.settings.is_reserved(key, self.catalog) {
                debug!("Keeping reserved filter key {}", key);
                split.reserved.insert(key.clone(), raw.clone());
                continue;
            }
            let filter = self.entry_from_wire(key, raw)?;
            split.filters.insert(key.clone(), filter);
        }
        Ok(split)
    }

    /// Operators the simple row for `field` may use
    pub fn operators_for(&self, operators: &OperatorCatalog, field: &str) -> &'static [Operator] {
        let descriptor = self.catalog.resolve(field);
        operators.operators_for(descriptor.field_type, &descriptor.name)
    }
}

/// Re-root a single-condition validation error at the child index it came from
fn with_index(reason: InvalidReason, index: usize) -> InvalidReason {
    let relocate = |mut path: Vec<usize>| {
        path.insert(0, index);
        path
    };
    match reason {
        InvalidReason::EmptyGroup { path } => InvalidReason::EmptyGroup { path: relocate(path) },
        InvalidReason::MissingField { path } => InvalidReason::MissingField { path: relocate(path) },
        InvalidReason::MissingOperator { path } => InvalidReason::MissingOperator { path: relocate(path) },
        InvalidReason::ShapeMismatch { path, expected } => InvalidReason::ShapeMismatch {
            path: relocate(path),
            expected,
        },
        InvalidReason::EmptyValue { path } => InvalidReason::EmptyValue { path: relocate(path) },
        InvalidReason::IncompleteRange { path } => InvalidReason::IncompleteRange { path: relocate(path) },
    }
}
