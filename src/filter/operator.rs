//! OperatorCatalog: which operators a field type offers and which widget edits the value
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::config::FilterSettings;
use crate::core::{FieldDescriptor, FieldType};
use crate::filter::value::{ConditionValue, Presence, Timespan};

/// Filter operator as presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[strum(serialize = "equals")]
    Equals,
    #[strum(serialize = "not equals")]
    NotEquals,
    #[strum(serialize = "like")]
    Like,
    #[strum(serialize = "not like")]
    NotLike,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<=")]
    LessOrEqual,
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "between")]
    Between,
    #[strum(serialize = "timespan")]
    Timespan,
}

/// Shape of the value an operator expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ValueShape {
    Scalar,
    Range,
    List,
    Timespan,
    Presence,
}

impl Operator {
    /// Token the backend expects on the wire
    pub fn wire_token(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::Between => "between",
            Self::Timespan => "timespan",
        }
    }

    /// Reverse of [`Operator::wire_token`]; tolerant of case and the `==`/`not_in` spellings
    pub fn from_wire(token: &str) -> Option<Self> {
        let op = match token.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "equals" => Self::Equals,
            "!=" | "not equals" => Self::NotEquals,
            "like" => Self::Like,
            "not like" => Self::NotLike,
            "in" => Self::In,
            "not in" | "not_in" => Self::NotIn,
            "is" => Self::Is,
            "<" => Self::LessThan,
            ">" => Self::GreaterThan,
            "<=" => Self::LessOrEqual,
            ">=" => Self::GreaterOrEqual,
            "between" => Self::Between,
            "timespan" => Self::Timespan,
            _ => return None,
        };
        Some(op)
    }

    pub fn value_shape(&self) -> ValueShape {
        match self {
            Self::In | Self::NotIn => ValueShape::List,
            Self::Between => ValueShape::Range,
            Self::Timespan => ValueShape::Timespan,
            Self::Is => ValueShape::Presence,
            _ => ValueShape::Scalar,
        }
    }

    pub fn is_like(&self) -> bool {
        matches!(self, Self::Like | Self::NotLike)
    }
}

/// Input control used to edit a condition value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValueWidget {
    Text,
    Number,
    Select(Vec<String>),
    BooleanSelect { yes: String, no: String },
    Date,
    DateRange,
    TimespanSelect(Vec<String>),
    Rating,
}

const BOOLEAN_OPERATORS: &[Operator] = &[Operator::Equals];

const SELECT_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::In,
    Operator::NotIn,
    Operator::Is,
];

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Like,
    Operator::NotLike,
    Operator::In,
    Operator::NotIn,
    Operator::Is,
];

const NUMERIC_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Like,
    Operator::NotLike,
    Operator::In,
    Operator::NotIn,
    Operator::Is,
    Operator::LessThan,
    Operator::GreaterThan,
    Operator::LessOrEqual,
    Operator::GreaterOrEqual,
];

const DATE_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Is,
    Operator::LessThan,
    Operator::GreaterThan,
    Operator::LessOrEqual,
    Operator::GreaterOrEqual,
    Operator::Between,
    Operator::Timespan,
];

const RATING_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Is,
    Operator::LessThan,
    Operator::GreaterThan,
    Operator::LessOrEqual,
    Operator::GreaterOrEqual,
];

const ASSIGNEE_OPERATORS: &[Operator] = &[Operator::Like, Operator::NotLike, Operator::Is];

/// Operator and value-widget resolution per field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorCatalog {
    assignee_field: String,
    yes_label: String,
    no_label: String,
}

impl Default for OperatorCatalog {
    fn default() -> Self {
        Self::new(&FilterSettings::default())
    }
}

impl OperatorCatalog {
    pub fn new(settings: &FilterSettings) -> Self {
        Self {
            assignee_field: settings.assignee_field.clone(),
            yes_label: settings.yes_label.clone(),
            no_label: settings.no_label.clone(),
        }
    }

    fn is_assignee(&self, field_name: &str) -> bool {
        field_name == self.assignee_field
    }

    /// Operators offered for a field, in display order
    pub fn operators_for(&self, field_type: FieldType, field_name: &str) -> &'static [Operator] {
        if self.is_assignee(field_name) {
            return ASSIGNEE_OPERATORS;
        }
        match field_type {
            FieldType::Boolean => BOOLEAN_OPERATORS,
            FieldType::SingleSelect => SELECT_OPERATORS,
            FieldType::Link | FieldType::DynamicLink => TEXT_OPERATORS,
            FieldType::Text | FieldType::LongText | FieldType::Duration => TEXT_OPERATORS,
            FieldType::Numeric => NUMERIC_OPERATORS,
            FieldType::Date | FieldType::Datetime => DATE_OPERATORS,
            FieldType::Rating => RATING_OPERATORS,
        }
    }

    pub fn supports(&self, field: &FieldDescriptor, operator: Operator) -> bool {
        self.operators_for(field.field_type, &field.name).contains(&operator)
    }

    pub fn default_operator(&self, field_type: FieldType, field_name: &str) -> Operator {
        if self.is_assignee(field_name) {
            return Operator::Like;
        }
        if field_type.is_date() {
            Operator::Between
        } else {
            Operator::Equals
        }
    }

    /// Initial value for a freshly chosen field, shaped for its default operator
    pub fn default_value(&self, field_type: FieldType, options: &[String]) -> ConditionValue {
        match field_type {
            FieldType::Boolean => ConditionValue::text(self.yes_label.clone()),
            FieldType::SingleSelect => {
                ConditionValue::text(options.first().cloned().unwrap_or_default())
            }
            FieldType::Date | FieldType::Datetime => ConditionValue::range("", ""),
            _ => ConditionValue::default(),
        }
    }

    /// Default operator and value for a field, taking the assignee case into account
    pub fn defaults_for(&self, field: &FieldDescriptor) -> (Operator, ConditionValue) {
        let operator = self.default_operator(field.field_type, &field.name);
        let value = self.default_value(field.field_type, &field.options);
        // A date-typed assignee defaults to `like`, which takes a scalar
        if value.shape() != operator.value_shape() {
            return (operator, ConditionValue::empty_for(operator));
        }
        (operator, value)
    }

    /// Widget used to edit the value of `operator` on a field of `field_type`
    pub fn value_widget(&self, field_type: FieldType, operator: Operator, options: &[String]) -> ValueWidget {
        match operator {
            Operator::Is => return ValueWidget::Select(Presence::tokens()),
            Operator::Timespan => return ValueWidget::TimespanSelect(Timespan::tokens()),
            Operator::Like | Operator::NotLike | Operator::In | Operator::NotIn => {
                return ValueWidget::Text;
            }
            Operator::Between => return ValueWidget::DateRange,
            _ => {}
        }
        match field_type {
            FieldType::Boolean => ValueWidget::BooleanSelect {
                yes: self.yes_label.clone(),
                no: self.no_label.clone(),
            },
            FieldType::SingleSelect => ValueWidget::Select(options.to_vec()),
            FieldType::Numeric => ValueWidget::Number,
            FieldType::Date | FieldType::Datetime => ValueWidget::Date,
            FieldType::Rating => ValueWidget::Rating,
            FieldType::Link
            | FieldType::DynamicLink
            | FieldType::Text
            | FieldType::LongText
            | FieldType::Duration => ValueWidget::Text,
        }
    }
}
