//! ConditionValidator: structural and completeness checks on a condition tree
use thiserror::Error;

use crate::filter::operator::ValueShape;
use crate::filter::tree::{Condition, Group, Node};
use crate::filter::value::ConditionValue;

/// Why a tree may not be applied or grown. Paths are child-index paths from the root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("group at {path:?} has no conditions")]
    EmptyGroup { path: Vec<usize> },
    #[error("condition at {path:?} has no field")]
    MissingField { path: Vec<usize> },
    #[error("condition at {path:?} has no operator")]
    MissingOperator { path: Vec<usize> },
    #[error("condition at {path:?} expects a {expected} value")]
    ShapeMismatch { path: Vec<usize>, expected: ValueShape },
    #[error("condition at {path:?} has an empty value")]
    EmptyValue { path: Vec<usize> },
    #[error("between condition at {path:?} needs both bounds")]
    IncompleteRange { path: Vec<usize> },
}

/// Validate a whole tree: every group non-empty, every condition complete
pub fn validate(group: &Group) -> Result<(), InvalidReason> {
    check_group(group, &mut Vec::new(), None)
}

/// Validate before adding a sibling inside `target`; only that group may still be empty
pub fn validate_for_insert(group: &Group, target: &[usize]) -> Result<(), InvalidReason> {
    check_group(group, &mut Vec::new(), Some(target))
}

/// Validate a single condition
pub fn validate_condition(condition: &Condition) -> Result<(), InvalidReason> {
    check_condition(condition, &[])
}

fn check_group(group: &Group, path: &mut Vec<usize>, allow_empty: Option<&[usize]>) -> Result<(), InvalidReason> {
    if group.children.is_empty() && allow_empty != Some(path.as_slice()) {
        return Err(InvalidReason::EmptyGroup { path: path.clone() });
    }
    for (i, child) in group.children.iter().enumerate() {
        path.push(i);
        match child {
            Node::Condition(condition) => check_condition(condition, path)?,
            Node::Group(inner) => check_group(inner, path, allow_empty)?,
        }
        path.pop();
    }
    Ok(())
}

fn check_condition(condition: &Condition, path: &[usize]) -> Result<(), InvalidReason> {
    let at = || path.to_vec();
    if condition.field.as_ref().is_none_or(|f| f.name.trim().is_empty()) {
        return Err(InvalidReason::MissingField { path: at() });
    }
    let Some(operator) = condition.operator else {
        return Err(InvalidReason::MissingOperator { path: at() });
    };
    let expected = operator.value_shape();
    if condition.value.shape() != expected {
        return Err(InvalidReason::ShapeMismatch { path: at(), expected });
    }
    match &condition.value {
        ConditionValue::Text(value) if value.trim().is_empty() => Err(InvalidReason::EmptyValue { path: at() }),
        ConditionValue::List(values) if values.iter().all(|v| v.trim().is_empty()) => {
            Err(InvalidReason::EmptyValue { path: at() })
        }
        ConditionValue::Range { from, to } if from.trim().is_empty() || to.trim().is_empty() => {
            Err(InvalidReason::IncompleteRange { path: at() })
        }
        _ => Ok(()),
    }
}
