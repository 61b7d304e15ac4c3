//! Condition values and the fixed token vocabularies (timespans, is set / is not set)
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::filter::operator::{Operator, ValueShape};

/// Relative date range understood by the backend's `timespan` operator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "&'static str")]
#[strum(ascii_case_insensitive)]
pub enum Timespan {
    #[strum(serialize = "today")]
    Today,
    #[strum(serialize = "yesterday")]
    Yesterday,
    #[strum(serialize = "tomorrow")]
    Tomorrow,
    #[strum(serialize = "this week")]
    ThisWeek,
    #[strum(serialize = "this month")]
    ThisMonth,
    #[strum(serialize = "this quarter")]
    ThisQuarter,
    #[strum(serialize = "this year")]
    ThisYear,
    #[strum(serialize = "last week")]
    LastWeek,
    #[strum(serialize = "last month")]
    LastMonth,
    #[strum(serialize = "last quarter")]
    LastQuarter,
    #[strum(serialize = "last year")]
    LastYear,
    #[strum(serialize = "next week")]
    NextWeek,
    #[strum(serialize = "next month")]
    NextMonth,
    #[strum(serialize = "next quarter")]
    NextQuarter,
    #[strum(serialize = "next year")]
    NextYear,
    #[strum(serialize = "last 6 months")]
    Last6Months,
    #[strum(serialize = "next 6 months")]
    Next6Months,
}

impl Timespan {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// All tokens in selector order
    pub fn tokens() -> Vec<String> {
        Self::iter().map(|t| t.to_string()).collect()
    }
}

impl TryFrom<String> for Timespan {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// Value token of the `is` operator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "&'static str")]
#[strum(ascii_case_insensitive)]
pub enum Presence {
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "not set")]
    NotSet,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    pub fn tokens() -> Vec<String> {
        Self::iter().map(|p| p.to_string()).collect()
    }
}

impl TryFrom<String> for Presence {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// Tokens appear in schemas as plain strings
#[cfg(feature = "json_schema")]
macro_rules! token_schema {
    ($($ty:ident),*) => {$(
        impl schemars::JsonSchema for $ty {
            fn schema_name() -> String {
                stringify!($ty).to_string()
            }

            fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
                <String as schemars::JsonSchema>::json_schema(generator)
            }
        }
    )*};
}

#[cfg(feature = "json_schema")]
token_schema!(Timespan, Presence);

/// Value of a leaf condition; the variant must match the operator's [`ValueShape`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConditionValue {
    Text(String),
    Range { from: String, to: String },
    List(Vec<String>),
    Timespan(Timespan),
    Presence(Presence),
}

impl Default for ConditionValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ConditionValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn range(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Range { from: from.into(), to: to.into() }
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            Self::Text(_) => ValueShape::Scalar,
            Self::Range { .. } => ValueShape::Range,
            Self::List(_) => ValueShape::List,
            Self::Timespan(_) => ValueShape::Timespan,
            Self::Presence(_) => ValueShape::Presence,
        }
    }

    /// Blank value of the shape `operator` expects
    pub fn empty_for(operator: Operator) -> Self {
        match operator.value_shape() {
            ValueShape::Scalar => Self::Text(String::new()),
            ValueShape::Range => Self::range("", ""),
            ValueShape::List => Self::List(Vec::new()),
            ValueShape::Timespan => Self::Timespan(Timespan::Today),
            ValueShape::Presence => Self::Presence(Presence::Set),
        }
    }

    /// Interpret free-text widget input for `operator`.
    ///
    /// Lists and ranges are comma separated. Unknown tokens for the fixed
    /// vocabularies are kept as text so validation reports the mismatch.
    pub fn parse_input(operator: Operator, raw: &str) -> Self {
        match operator.value_shape() {
            ValueShape::Scalar => Self::Text(raw.to_string()),
            ValueShape::List => Self::List(split_list(raw)),
            ValueShape::Range => {
                let (from, to) = raw.split_once(',').unwrap_or((raw, ""));
                Self::range(from.trim(), to.trim())
            }
            ValueShape::Timespan => raw
                .trim()
                .parse()
                .map(Self::Timespan)
                .unwrap_or_else(|_| Self::Text(raw.to_string())),
            ValueShape::Presence => raw
                .trim()
                .parse()
                .map(Self::Presence)
                .unwrap_or_else(|_| Self::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "\"{s}\""),
            Self::Range { from, to } => write!(f, "{from} and {to}"),
            Self::List(values) => {
                // Long lists are abbreviated for the list view
                if values.len() > 3 {
                    write!(f, "[{}, {}... ({} total)]", values[0], values[1], values.len())
                } else {
                    write!(f, "[{}]", values.join(", "))
                }
            }
            Self::Timespan(t) => write!(f, "{t}"),
            Self::Presence(p) => write!(f, "{p}"),
        }
    }
}

/// Split a comma-separated list, trimming items and dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
