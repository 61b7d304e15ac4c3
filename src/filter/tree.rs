//! ConditionTree: leaf conditions and nested AND/OR groups, addressed by index paths
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::core::FieldDescriptor;
use crate::filter::operator::Operator;
use crate::filter::validate::{self, InvalidReason};
use crate::filter::value::ConditionValue;

/// Single field/operator/value constraint.
///
/// A freshly added row has neither field nor operator; it stays in the tree
/// and is edited in place until validation accepts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
pub struct Condition {
    pub field: Option<FieldDescriptor>,
    pub operator: Option<Operator>,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: FieldDescriptor, operator: Operator, value: ConditionValue) -> Self {
        Self {
            field: Some(field),
            operator: Some(operator),
            value,
        }
    }

    /// Empty row, as inserted by "add condition"
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn fieldname(&self) -> &str {
        self.field.as_ref().map(|f| f.name.as_str()).unwrap_or("")
    }

    /// Format the condition as a one-line summary for the list view
    pub fn summary(&self) -> String {
        let field = self
            .field
            .as_ref()
            .map(|f| f.label.as_str())
            .unwrap_or("<field>");
        match self.operator {
            Some(op) => format!("{} {} {}", field, op, self.value),
            None => format!("{field} <operator>"),
        }
    }
}

/// Combinator shared by every sibling of one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    /// Lowercase token used between items on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Item of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Condition(Condition),
    Group(Group),
}

/// Ordered items joined by one conjunction; the whole filter is the root group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
pub struct Group {
    pub conjunction: Conjunction,
    pub children: Vec<Node>,
}

/// Line of the indented tree view: (indent, label, path)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    pub indent: usize,
    pub label: String,
    pub path: Vec<usize>,
}

/// Refused tree edit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error(transparent)]
    Invalid(#[from] InvalidReason),
    #[error("no group at {0:?}")]
    NoSuchGroup(Vec<usize>),
    #[error("no item at {0:?}")]
    NoSuchItem(Vec<usize>),
    #[error("no condition at {0:?}")]
    NotACondition(Vec<usize>),
    #[error("the root group cannot be removed")]
    RootRemoval,
}

impl Group {
    pub fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            children: Vec::new(),
        }
    }

    pub fn and(children: Vec<Node>) -> Self {
        Self {
            conjunction: Conjunction::And,
            children,
        }
    }

    pub fn or(children: Vec<Node>) -> Self {
        Self {
            conjunction: Conjunction::Or,
            children,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when no child is itself a group
    pub fn is_flat(&self) -> bool {
        self.children.iter().all(|c| matches!(c, Node::Condition(_)))
    }

    /// Number of leaf conditions at any depth
    pub fn count_leaves(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Condition(_) => 1,
                Node::Group(group) => group.count_leaves(),
            })
            .sum()
    }

    /// Get node at a non-empty path, or None if invalid
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (last, parent) = path.split_last()?;
        self.group_at(parent)?.children.get(*last)
    }

    /// Get mutable reference to node at a non-empty path, or None if invalid
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (last, parent) = path.split_last()?;
        self.group_at_mut(parent)?.children.get_mut(*last)
    }

    /// Group at path; the empty path is the root
    pub fn group_at(&self, path: &[usize]) -> Option<&Group> {
        let mut group = self;
        for &i in path {
            match group.children.get(i)? {
                Node::Group(inner) => group = inner,
                Node::Condition(_) => return None,
            }
        }
        Some(group)
    }

    pub fn group_at_mut(&mut self, path: &[usize]) -> Option<&mut Group> {
        let mut group = self;
        for &i in path {
            match group.children.get_mut(i)? {
                Node::Group(inner) => group = inner,
                Node::Condition(_) => return None,
            }
        }
        Some(group)
    }

    pub fn condition_at(&self, path: &[usize]) -> Option<&Condition> {
        match self.node_at(path)? {
            Node::Condition(condition) => Some(condition),
            Node::Group(_) => None,
        }
    }

    pub fn condition_at_mut(&mut self, path: &[usize]) -> Option<&mut Condition> {
        match self.node_at_mut(path)? {
            Node::Condition(condition) => Some(condition),
            Node::Group(_) => None,
        }
    }

    /// Insert a condition into the group at `group_path`.
    ///
    /// Refused while any other part of the tree is incomplete. `position` past
    /// the end appends. Returns the path of the new condition.
    pub fn insert_condition(
        &mut self,
        group_path: &[usize],
        position: usize,
        condition: Condition,
    ) -> Result<Vec<usize>, TreeError> {
        self.insert_node(group_path, position, Node::Condition(condition))
    }

    /// Insert an empty nested group; it must receive a condition before the tree validates
    pub fn insert_group(
        &mut self,
        group_path: &[usize],
        position: usize,
        conjunction: Conjunction,
    ) -> Result<Vec<usize>, TreeError> {
        self.insert_node(group_path, position, Node::Group(Group::new(conjunction)))
    }

    fn insert_node(&mut self, group_path: &[usize], position: usize, node: Node) -> Result<Vec<usize>, TreeError> {
        if self.group_at(group_path).is_none() {
            return Err(TreeError::NoSuchGroup(group_path.to_vec()));
        }
        validate::validate_for_insert(self, group_path)?;
        let group = self
            .group_at_mut(group_path)
            .ok_or_else(|| TreeError::NoSuchGroup(group_path.to_vec()))?;
        let index = position.min(group.children.len());
        group.children.insert(index, node);
        let mut path = group_path.to_vec();
        path.push(index);
        debug!("Inserted filter node at {:?}", path);
        Ok(path)
    }

    /// Replace the condition at `path` by a one-item group holding it
    pub fn wrap_in_group(&mut self, path: &[usize], conjunction: Conjunction) -> Result<(), TreeError> {
        let node = self
            .node_at_mut(path)
            .ok_or_else(|| TreeError::NoSuchItem(path.to_vec()))?;
        let inner = std::mem::replace(node, Node::Group(Group::new(conjunction)));
        if let Node::Group(group) = node {
            group.children.push(inner);
        }
        Ok(())
    }

    /// Replace the condition at `path`
    pub fn replace_condition(&mut self, path: &[usize], condition: Condition) -> Result<(), TreeError> {
        match self.node_at_mut(path) {
            Some(Node::Condition(existing)) => {
                *existing = condition;
                Ok(())
            }
            Some(Node::Group(_)) => Err(TreeError::NotACondition(path.to_vec())),
            None => Err(TreeError::NoSuchItem(path.to_vec())),
        }
    }

    /// Remove the item at `path`. A nested group left empty is removed from its
    /// parent in turn; the root is never removed.
    ///
    /// Returns the path to select afterwards: previous sibling, next sibling, or parent.
    pub fn remove_item(&mut self, path: &[usize]) -> Result<Vec<usize>, TreeError> {
        if path.is_empty() {
            return Err(TreeError::RootRemoval);
        }
        let mut current = path.to_vec();
        loop {
            let Some((&index, parent_path)) = current.split_last() else {
                break;
            };
            let parent_path = parent_path.to_vec();
            let parent = self
                .group_at_mut(&parent_path)
                .ok_or_else(|| TreeError::NoSuchItem(current.clone()))?;
            if index >= parent.children.len() {
                return Err(TreeError::NoSuchItem(current));
            }
            parent.children.remove(index);
            debug!("Removed filter node at {:?}", current);

            if !parent.children.is_empty() || parent_path.is_empty() {
                let remaining = parent.children.len();
                let mut selection = parent_path;
                if remaining > 0 {
                    selection.push(index.saturating_sub(1).min(remaining - 1));
                }
                return Ok(selection);
            }
            // Empty nested group: remove it too
            current = parent_path;
        }
        Ok(Vec::new())
    }

    /// Set the conjunction of the group at `group_path`
    pub fn set_conjunction(&mut self, group_path: &[usize], conjunction: Conjunction) -> Result<(), TreeError> {
        let group = self
            .group_at_mut(group_path)
            .ok_or_else(|| TreeError::NoSuchGroup(group_path.to_vec()))?;
        group.conjunction = conjunction;
        Ok(())
    }

    /// Render the tree as indented lines with the path of each node
    pub fn render_lines(&self) -> Vec<TreeLine> {
        let mut lines = Vec::new();
        let mut path = Vec::new();
        self.render_into(&mut path, 0, &mut lines);
        lines
    }

    fn render_into(&self, path: &mut Vec<usize>, indent: usize, lines: &mut Vec<TreeLine>) {
        let label = if indent == 0 {
            format!("Root {}", self.conjunction)
        } else {
            self.conjunction.to_string()
        };
        lines.push(TreeLine { indent, label, path: path.clone() });
        for (i, child) in self.children.iter().enumerate() {
            path.push(i);
            match child {
                Node::Condition(condition) => lines.push(TreeLine {
                    indent: indent + 1,
                    label: condition.summary(),
                    path: path.clone(),
                }),
                Node::Group(group) => group.render_into(path, indent + 1, lines),
            }
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldType;
    use pretty_assertions::assert_eq;

    fn cond(field: &str, value: &str) -> Condition {
        Condition::new(
            FieldDescriptor::new(field, FieldType::Text),
            Operator::Equals,
            ConditionValue::text(value),
        )
    }

    fn sample() -> Group {
        // status = Open AND (priority = High OR priority = Urgent)
        Group::and(vec![
            Node::Condition(cond("status", "Open")),
            Node::Group(Group::or(vec![
                Node::Condition(cond("priority", "High")),
                Node::Condition(cond("priority", "Urgent")),
            ])),
        ])
    }

    #[test]
    fn count_leaves_ignores_nesting() {
        assert_eq!(sample().count_leaves(), 3);
        assert_eq!(Group::default().count_leaves(), 0);

        let deep = Group::or(vec![Node::Group(Group::and(vec![Node::Group(sample())]))]);
        assert_eq!(deep.count_leaves(), 3);
    }

    #[test]
    fn insert_appends_past_the_end() {
        let mut tree = sample();
        let path = tree.insert_condition(&[1], 99, cond("priority", "Low")).unwrap();
        assert_eq!(path, vec![1, 2]);
        assert_eq!(tree.count_leaves(), 4);
    }

    #[test]
    fn insert_into_empty_root() {
        let mut tree = Group::default();
        let path = tree.insert_condition(&[], 0, cond("status", "Open")).unwrap();
        assert_eq!(path, vec![0]);
    }

    #[test]
    fn insert_refused_while_a_condition_is_incomplete() {
        let mut tree = sample();
        tree.insert_condition(&[], 1, Condition::blank()).unwrap();
        let before = tree.clone();

        let refused = tree.insert_condition(&[], 0, cond("subject", "x"));
        assert_eq!(refused, Err(TreeError::Invalid(InvalidReason::MissingField { path: vec![1] })));
        assert_eq!(tree, before);

        let refused = tree.insert_group(&[1], 0, Conjunction::And);
        assert_eq!(refused, Err(TreeError::NoSuchGroup(vec![1])));
    }

    #[test]
    fn insert_refused_beside_an_empty_group() {
        let mut tree = sample();
        let group_path = tree.insert_group(&[], 2, Conjunction::Or).unwrap();
        assert_eq!(group_path, vec![2]);

        assert!(tree.insert_condition(&[], 0, cond("subject", "x")).is_err());
        assert_eq!(tree.insert_condition(&group_path, 0, cond("subject", "x")), Ok(vec![2, 0]));
    }

    #[test]
    fn remove_collapses_emptied_groups() {
        let mut tree = Group::and(vec![
            Node::Condition(cond("status", "Open")),
            Node::Group(Group::or(vec![Node::Group(Group::and(vec![Node::Condition(cond(
                "priority", "High",
            ))]))])),
        ]);

        let selection = tree.remove_item(&[1, 0, 0]).unwrap();
        assert_eq!(tree, Group::and(vec![Node::Condition(cond("status", "Open"))]));
        assert_eq!(selection, vec![0]);
    }

    #[test]
    fn remove_selects_previous_sibling() {
        let mut tree = sample();
        assert_eq!(tree.remove_item(&[1, 1]).unwrap(), vec![1, 0]);
        assert_eq!(tree.remove_item(&[0]).unwrap(), vec![0]);
        assert_eq!(tree.count_leaves(), 1);
    }

    #[test]
    fn remove_last_root_item_leaves_empty_root() {
        let mut tree = Group::and(vec![Node::Condition(cond("status", "Open"))]);
        assert_eq!(tree.remove_item(&[0]).unwrap(), Vec::<usize>::new());
        assert!(tree.is_empty());
        assert_eq!(tree.remove_item(&[]), Err(TreeError::RootRemoval));
        assert_eq!(tree.remove_item(&[3]), Err(TreeError::NoSuchItem(vec![3])));
    }

    #[test]
    fn wrap_and_set_conjunction() {
        let mut tree = sample();
        tree.wrap_in_group(&[0], Conjunction::Or).unwrap();
        tree.set_conjunction(&[0], Conjunction::And).unwrap();
        match tree.node_at(&[0]) {
            Some(Node::Group(group)) => {
                assert_eq!(group.conjunction, Conjunction::And);
                assert_eq!(group.len(), 1);
            }
            other => panic!("expected group, got {other:?}"),
        }
        assert_eq!(tree.set_conjunction(&[1, 0], Conjunction::Or), Err(TreeError::NoSuchGroup(vec![1, 0])));
    }

    #[test]
    fn replace_condition_only_targets_leaves() {
        let mut tree = sample();
        tree.replace_condition(&[1, 0], cond("priority", "Low")).unwrap();
        assert_eq!(tree.node_at(&[1, 0]), Some(&Node::Condition(cond("priority", "Low"))));
        assert_eq!(tree.replace_condition(&[1], cond("x", "y")), Err(TreeError::NotACondition(vec![1])));
    }

    #[test]
    fn render_lines_indent_by_depth() {
        let lines = sample().render_lines();
        let rendered: Vec<(usize, &str)> = lines.iter().map(|l| (l.indent, l.label.as_str())).collect();
        assert_eq!(
            rendered,
            vec![
                (0, "Root AND"),
                (1, "status equals \"Open\""),
                (1, "OR"),
                (2, "priority equals \"High\""),
                (2, "priority equals \"Urgent\""),
            ]
        );
        assert_eq!(lines[3].path, vec![1, 0]);
    }
}
