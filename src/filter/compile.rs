//! FilterCompiler: condition trees to wire payloads and back
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::FilterSettings;
use crate::core::FieldCatalog;
use crate::filter::controller::FilterMode;
use crate::filter::operator::Operator;
use crate::filter::simple::{SimpleFilterAdapter, SimpleFilterMap};
use crate::filter::tree::{Condition, Conjunction, Group, Node};
use crate::filter::validate;
use crate::filter::wire::{CompileError, ValueCodec, WirePayload};

/// Editing state recovered from a payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hydrated {
    pub mode: FilterMode,
    pub tree: Group,
    /// Ordinary entries; empty in advanced mode
    pub simple: SimpleFilterMap,
    /// Reserved keys other than the advanced key, verbatim
    pub reserved: Map<String, Value>,
}

pub struct FilterCompiler<'a> {
    catalog: &'a FieldCatalog,
    settings: &'a FilterSettings,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(catalog: &'a FieldCatalog, settings: &'a FilterSettings) -> Self {
        Self { catalog, settings }
    }

    fn adapter(&self) -> SimpleFilterAdapter<'a> {
        SimpleFilterAdapter::new(self.catalog, self.settings)
    }

    fn codec(&self) -> ValueCodec<'a> {
        ValueCodec::new(&self.settings.yes_label, &self.settings.no_label)
    }

    /// Compile for the given mode. Simple mode requires a tree the simple view can show.
    pub fn compile(&self, tree: &Group, mode: FilterMode) -> Result<WirePayload, CompileError> {
        match mode {
            FilterMode::Simple => {
                let map = self.adapter().to_map(tree)?;
                Ok(self.compile_simple(&map))
            }
            FilterMode::Advanced => self.compile_tree(tree),
        }
    }

    /// Plain key/value payload; equals collapses to the bare value
    pub fn compile_simple(&self, map: &SimpleFilterMap) -> WirePayload {
        self.adapter().map_to_wire(map)
    }

    /// Advanced payload: the condition list under the advanced key
    pub fn compile_tree(&self, tree: &Group) -> Result<WirePayload, CompileError> {
        validate::validate(tree)?;
        let mut payload = WirePayload::new();
        payload.insert(self.settings.advanced_key.clone(), self.conditions_to_wire(tree));
        Ok(payload)
    }

    /// `[item, "and", item, ...]` with leaves as `[field, token, value]` and groups as sublists
    pub fn conditions_to_wire(&self, group: &Group) -> Value {
        let mut items = Vec::with_capacity(group.children.len() * 2);
        for (i, child) in group.children.iter().enumerate() {
            if i > 0 {
                items.push(Value::String(group.conjunction.as_str().to_string()));
            }
            match child {
                Node::Condition(condition) => items.push(self.leaf_to_wire(condition)),
                Node::Group(inner) => items.push(self.conditions_to_wire(inner)),
            }
        }
        Value::Array(items)
    }

    fn leaf_to_wire(&self, condition: &Condition) -> Value {
        let (Some(field), Some(operator)) = (&condition.field, condition.operator) else {
            return Value::Null;
        };
        Value::Array(vec![
            Value::String(field.name.clone()),
            Value::String(operator.wire_token().to_string()),
            self.codec().encode(field, operator, &condition.value),
        ])
    }

    /// Rebuild a tree from a wire condition list.
    ///
    /// Conjunctions between items default to `and`. When one level mixes
    /// conjunctions the items are grouped left to right, so
    /// `a and b or c` becomes `(a and b) or c`.
    pub fn conditions_from_wire(&self, raw: &Value) -> Result<Group, CompileError> {
        match raw {
            Value::String(text) => {
                let parsed: Value = serde_json::from_str(text)
                    .map_err(|e| CompileError::MalformedConditions(e.to_string()))?;
                self.conditions_from_wire(&parsed)
            }
            Value::Array(items) if is_leaf(items) => Ok(Group::and(vec![Node::Condition(self.leaf_from_wire(items)?)])),
            Value::Array(items) => self.group_from_wire(items),
            Value::Null => Ok(Group::default()),
            other => Err(CompileError::MalformedConditions(format!("expected a list, got {other}"))),
        }
    }

    fn group_from_wire(&self, items: &[Value]) -> Result<Group, CompileError> {
        let mut group: Option<Group> = None;
        let mut pending: Option<Conjunction> = None;
        for item in items {
            let node = match item {
                Value::String(token) => {
                    let conjunction = Conjunction::from_token(token).ok_or_else(|| {
                        CompileError::MalformedConditions(format!("unknown conjunction {token:?}"))
                    })?;
                    pending = Some(conjunction);
                    continue;
                }
                Value::Array(inner) if is_leaf(inner) => Node::Condition(self.leaf_from_wire(inner)?),
                Value::Array(inner) => {
                    let nested = self.group_from_wire(inner)?;
                    if nested.is_empty() {
                        warn!("Dropping empty nested condition list");
                        continue;
                    }
                    Node::Group(nested)
                }
                other => {
                    return Err(CompileError::MalformedConditions(format!(
                        "unexpected item {other}"
                    )));
                }
            };
            let conjunction = pending.take().unwrap_or_default();
            group = Some(match group {
                None => Group {
                    conjunction,
                    children: vec![node],
                },
                Some(mut current) => {
                    if current.children.len() == 1 {
                        current.conjunction = conjunction;
                    } else if current.conjunction != conjunction {
                        current = Group {
                            conjunction,
                            children: vec![Node::Group(current)],
                        };
                    }
                    current.children.push(node);
                    current
                }
            });
        }
        let mut group = group.unwrap_or_default();
        // A single leading item carries no conjunction of its own
        if group.children.len() == 1 {
            group.conjunction = Conjunction::And;
        }
        Ok(group)
    }

    fn leaf_from_wire(&self, items: &[Value]) -> Result<Condition, CompileError> {
        let [field, token, raw] = items else {
            return Err(CompileError::MalformedConditions(format!(
                "expected [field, operator, value], got {} items",
                items.len()
            )));
        };
        let field = field.as_str().unwrap_or_default();
        let token = token.as_str().unwrap_or_default();
        let operator = Operator::from_wire(token).ok_or_else(|| CompileError::UnknownOperator {
            field: field.to_string(),
            token: token.to_string(),
        })?;
        let descriptor = self.catalog.resolve(field);
        let value = self.codec().decode(&descriptor, operator, raw)?;
        Ok(Condition::new(descriptor, operator, value))
    }

    /// Recover editing state from an applied payload.
    ///
    /// The advanced key forces advanced mode. Ordinary entries sent alongside it
    /// are folded into the tree as leading AND conditions so nothing is lost.
    pub fn hydrate(&self, payload: &WirePayload) -> Result<Hydrated, CompileError> {
        let split = self.adapter().map_from_wire(payload)?;
        let mut reserved = split.reserved;
        let Some(advanced) = reserved.remove(&self.settings.advanced_key) else {
            let tree = self.adapter().to_tree(&split.filters);
            return Ok(Hydrated {
                mode: FilterMode::Simple,
                tree,
                simple: split.filters,
                reserved,
            });
        };

        let parsed = self.conditions_from_wire(&advanced)?;
        let tree = if split.filters.is_empty() {
            parsed
        } else {
            warn!(
                "Payload mixes {} plain filters with an advanced list; merging them",
                split.filters.len()
            );
            let mut merged = self.adapter().to_tree(&split.filters);
            if parsed.conjunction == Conjunction::And || parsed.len() <= 1 {
                merged.children.extend(parsed.children);
            } else {
                merged.children.push(Node::Group(parsed));
            }
            merged
        };
        Ok(Hydrated {
            mode: FilterMode::Advanced,
            tree,
            simple: SimpleFilterMap::new(),
            reserved,
        })
    }
}

/// Number of leaf conditions in a tree, at any depth
pub fn count_leaves(tree: &Group) -> usize {
    tree.count_leaves()
}

/// A leaf is `[field, operator, value]` where neither of the first two is a conjunction
fn is_leaf(items: &[Value]) -> bool {
    if items.len() != 3 {
        return false;
    }
    let is_word = |v: &Value| v.as_str().is_some_and(|s| Conjunction::from_token(s).is_none());
    is_word(&items[0]) && is_word(&items[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldDescriptor, FieldType};
    use crate::filter::simple::SimpleFilter;
    use crate::filter::value::ConditionValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            FieldDescriptor::new("status", FieldType::SingleSelect).with_options(["Open", "Replied", "Closed"]),
            FieldDescriptor::new("priority", FieldType::SingleSelect).with_options(["Low", "Medium", "High"]),
            FieldDescriptor::new("subject", FieldType::Text),
            FieldDescriptor::new("opening_date", FieldType::Date),
        ])
        .with_standard_fields("HD Ticket")
    }

    fn leaf(catalog: &FieldCatalog, field: &str, operator: Operator, value: &str) -> Node {
        Node::Condition(Condition::new(catalog.resolve(field), operator, ConditionValue::text(value)))
    }

    #[test]
    fn implicit_equals_collapses_to_scalar() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let map: SimpleFilterMap = vec![("priority", SimpleFilter::equals("High"))].into_iter().collect();
        assert_eq!(compiler.compile_simple(&map).into_value(), json!({"priority": "High"}));
    }

    #[test]
    fn or_tree_compiles_to_flat_list() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let tree = Group::or(vec![
            leaf(&catalog, "status", Operator::Equals, "Open"),
            leaf(&catalog, "status", Operator::Equals, "Replied"),
        ]);

        let payload = compiler.compile_tree(&tree).unwrap();
        assert_eq!(
            payload.into_value(),
            json!({"_conditions": [["status", "=", "Open"], "or", ["status", "=", "Replied"]]})
        );
        assert_eq!(count_leaves(&tree), 2);
    }

    #[test]
    fn like_values_are_wrapped_once() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let tree = Group::and(vec![leaf(&catalog, "subject", Operator::Like, "abc")]);

        let first = compiler.compile_tree(&tree).unwrap();
        assert_eq!(first.get("_conditions"), Some(&json!([["subject", "LIKE", "%abc%"]])));

        let rehydrated = compiler.hydrate(&first).unwrap();
        let second = compiler.compile_tree(&rehydrated.tree).unwrap();
        assert_eq!(first, second);

        let prewrapped = Group::and(vec![leaf(&catalog, "subject", Operator::Like, "%abc%")]);
        assert_eq!(compiler.compile_tree(&prewrapped).unwrap(), first);
    }

    #[test]
    fn anchored_like_patterns_survive_hydrate_and_compile() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);

        let map: SimpleFilterMap = vec![("subject", SimpleFilter::new(Operator::Like, ConditionValue::text("abc%")))]
            .into_iter()
            .collect();
        assert_eq!(compiler.compile_simple(&map).into_value(), json!({"subject": ["LIKE", "abc%"]}));

        for payload in [
            json!({"subject": ["LIKE", "abc%"]}),
            json!({"subject": ["NOT LIKE", "%abc"]}),
            json!({"_conditions": [["subject", "LIKE", "abc%"], "or", ["subject", "LIKE", "%abc"]]}),
        ] {
            let payload = WirePayload::from_value(payload).unwrap();
            let hydrated = compiler.hydrate(&payload).unwrap();
            assert_eq!(compiler.compile(&hydrated.tree, hydrated.mode).unwrap(), payload);
        }
    }

    #[test]
    fn plain_payload_hydrates_to_simple_mode() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let payload = WirePayload::from_value(json!({"status": "Open"})).unwrap();

        let hydrated = compiler.hydrate(&payload).unwrap();
        assert_eq!(hydrated.mode, FilterMode::Simple);
        assert_eq!(hydrated.simple.len(), 1);
        assert_eq!(hydrated.simple.get("status"), Some(&SimpleFilter::equals("Open")));
        assert_eq!(hydrated.tree.len(), 1);
    }

    #[test]
    fn flat_and_tree_survives_simple_round_trip() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let tree = Group::and(vec![
            leaf(&catalog, "status", Operator::NotEquals, "Closed"),
            leaf(&catalog, "subject", Operator::Like, "printer"),
            Node::Condition(Condition::new(
                catalog.resolve("opening_date"),
                Operator::Between,
                ConditionValue::range("2024-01-01", "2024-01-31"),
            )),
        ]);

        let payload = compiler.compile(&tree, FilterMode::Simple).unwrap();
        assert_eq!(
            payload.clone().into_value(),
            json!({
                "status": ["!=", "Closed"],
                "subject": ["LIKE", "%printer%"],
                "opening_date": ["between", ["2024-01-01", "2024-01-31"]]
            })
        );
        let hydrated = compiler.hydrate(&payload).unwrap();
        assert_eq!(hydrated.tree, tree);
    }

    #[test]
    fn nested_tree_round_trips_through_advanced_key() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let tree = Group::and(vec![
            leaf(&catalog, "status", Operator::Equals, "Open"),
            Node::Group(Group::or(vec![
                leaf(&catalog, "priority", Operator::Equals, "High"),
                leaf(&catalog, "subject", Operator::Like, "urgent"),
            ])),
        ]);

        let payload = compiler.compile(&tree, FilterMode::Advanced).unwrap();
        assert_eq!(
            payload.get("_conditions"),
            Some(&json!([
                ["status", "=", "Open"],
                "and",
                [["priority", "=", "High"], "or", ["subject", "LIKE", "%urgent%"]]
            ]))
        );
        let hydrated = compiler.hydrate(&payload).unwrap();
        assert_eq!(hydrated.mode, FilterMode::Advanced);
        assert_eq!(hydrated.tree, tree);
        assert_eq!(count_leaves(&hydrated.tree), 3);
    }

    #[test]
    fn mixed_conjunctions_group_left_to_right() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let raw = json!([
            ["status", "=", "Open"],
            "AND",
            ["priority", "=", "High"],
            "or",
            ["subject", "like", "%printer%"]
        ]);

        let tree = compiler.conditions_from_wire(&raw).unwrap();
        assert_eq!(
            tree,
            Group::or(vec![
                Node::Group(Group::and(vec![
                    leaf(&catalog, "status", Operator::Equals, "Open"),
                    leaf(&catalog, "priority", Operator::Equals, "High"),
                ])),
                leaf(&catalog, "subject", Operator::Like, "printer"),
            ])
        );
    }

    #[test]
    fn missing_conjunctions_default_to_and() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let raw = json!([["status", "=", "Open"], ["priority", "=", "High"], []]);

        let tree = compiler.conditions_from_wire(&raw).unwrap();
        assert_eq!(tree.conjunction, Conjunction::And);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn single_leaf_and_string_encoded_lists_hydrate() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);

        let single = compiler.conditions_from_wire(&json!(["status", "=", "Open"])).unwrap();
        assert_eq!(single, Group::and(vec![leaf(&catalog, "status", Operator::Equals, "Open")]));

        let encoded = compiler
            .conditions_from_wire(&json!(r#"[["status", "=", "Open"], "or", ["status", "=", "Closed"]]"#))
            .unwrap();
        assert_eq!(encoded.conjunction, Conjunction::Or);
        assert_eq!(encoded.len(), 2);
    }

    #[test]
    fn malformed_lists_are_errors() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);

        assert!(matches!(
            compiler.conditions_from_wire(&json!([["status", "~", "Open"]])),
            Err(CompileError::UnknownOperator { .. })
        ));
        assert!(matches!(
            compiler.conditions_from_wire(&json!([["status", "=", "Open"], "xor", ["status", "=", "Closed"]])),
            Err(CompileError::MalformedConditions(_))
        ));
        assert!(matches!(
            compiler.conditions_from_wire(&json!({"status": "Open"})),
            Err(CompileError::MalformedConditions(_))
        ));
    }

    #[test]
    fn invalid_tree_does_not_compile() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let tree = Group::and(vec![Node::Condition(Condition::blank())]);
        assert!(matches!(compiler.compile_tree(&tree), Err(CompileError::Invalid(_))));
        assert!(matches!(compiler.compile_tree(&Group::default()), Err(CompileError::Invalid(_))));

        let or_tree = Group::or(vec![
            leaf(&catalog, "status", Operator::Equals, "Open"),
            leaf(&catalog, "status", Operator::Equals, "Closed"),
        ]);
        assert!(matches!(
            compiler.compile(&or_tree, FilterMode::Simple),
            Err(CompileError::NotRepresentable(_))
        ));
    }

    #[test]
    fn reserved_keys_and_plain_entries_beside_advanced_list() {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        let payload = WirePayload::from_value(json!({
            "status": "Open",
            "_tags": ["billing"],
            "_conditions": [["priority", "=", "High"], "or", ["priority", "=", "Medium"]]
        }))
        .unwrap();

        let hydrated = compiler.hydrate(&payload).unwrap();
        assert_eq!(hydrated.mode, FilterMode::Advanced);
        assert_eq!(hydrated.reserved.get("_tags"), Some(&json!(["billing"])));
        assert!(!hydrated.reserved.contains_key("_conditions"));
        assert_eq!(hydrated.tree.conjunction, Conjunction::And);
        assert_eq!(hydrated.tree.len(), 2);
        assert_eq!(count_leaves(&hydrated.tree), 3);
    }
}
