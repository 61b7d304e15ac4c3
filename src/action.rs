use serde::{Deserialize, Serialize};
use strum::Display;

use crate::filter::{ConditionValue, Conjunction, FilterMode, Operator, WirePayload};

/// Edits and notifications exchanged with the filter controller.
/// Paths are child-index paths from the root group.
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
pub enum Action {
    /// Append a blank condition to a group
    AddCondition { group: Vec<usize> },
    /// Append a nested group, seeded with one blank condition
    AddGroup { group: Vec<usize>, conjunction: Conjunction },
    RemoveItem { path: Vec<usize> },
    SetConjunction { group: Vec<usize>, conjunction: Conjunction },
    /// Choose a field for a condition; operator and value reset to the field's defaults
    SetField { path: Vec<usize>, fieldname: String },
    SetOperator { path: Vec<usize>, operator: Operator },
    SetValue { path: Vec<usize>, value: ConditionValue },
    /// Raw widget text, parsed according to the condition's operator
    SetValueInput { path: Vec<usize>, input: String },
    SetSimpleFilter {
        fieldname: String,
        operator: Operator,
        value: ConditionValue,
    },
    RemoveSimpleFilter { fieldname: String },
    SetTags(Vec<String>),
    SwitchMode(FilterMode),
    ApplyFilters,
    DiscardFilters,
    ClearFilters,
    /// Emitted after the list collaborator received a new payload
    FiltersApplied(WirePayload),
    /// A refused edit, with the reason shown to the user
    Error(String),
}
