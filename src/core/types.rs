use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field type as far as filtering is concerned.
///
/// The backend reports a richer vocabulary (`Data`, `Small Text`, `Int`, ...);
/// [`FieldType::from_fieldtype`] folds it into these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Link,
    DynamicLink,
    Numeric,
    SingleSelect,
    Text,
    LongText,
    Date,
    Datetime,
    Rating,
    Duration,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Link => "link",
            Self::DynamicLink => "dynamic_link",
            Self::Numeric => "numeric",
            Self::SingleSelect => "single_select",
            Self::Text => "text",
            Self::LongText => "long_text",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Rating => "rating",
            Self::Duration => "duration",
        }
    }

    /// Map a backend `fieldtype` name onto a filter field type.
    pub fn from_fieldtype(fieldtype: &str) -> Option<Self> {
        match fieldtype {
            "Check" => Some(Self::Boolean),
            "Link" => Some(Self::Link),
            "Dynamic Link" => Some(Self::DynamicLink),
            "Int" | "Float" | "Currency" | "Percent" => Some(Self::Numeric),
            "Select" => Some(Self::SingleSelect),
            "Data" | "Small Text" | "Text" => Some(Self::Text),
            "Long Text" | "Text Editor" => Some(Self::LongText),
            "Date" => Some(Self::Date),
            "Datetime" => Some(Self::Datetime),
            "Rating" => Some(Self::Rating),
            "Duration" => Some(Self::Duration),
            _ => None,
        }
    }

    /// Date-like fields get `between`/`timespan` operators and date widgets
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date | Self::Datetime)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(Self::Boolean),
            "link" => Ok(Self::Link),
            "dynamic_link" => Ok(Self::DynamicLink),
            "numeric" => Ok(Self::Numeric),
            "single_select" => Ok(Self::SingleSelect),
            "text" => Ok(Self::Text),
            "long_text" => Ok(Self::LongText),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::Datetime),
            "rating" => Ok(Self::Rating),
            "duration" => Ok(Self::Duration),
            _ => Err(format!("Unknown field type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_conversion() {
        assert_eq!(FieldType::from_str("single_select").unwrap(), FieldType::SingleSelect);
        assert_eq!(FieldType::Datetime.as_str(), "datetime");

        assert!(FieldType::from_str("invalid").is_err());
    }

    #[test]
    fn test_backend_fieldtypes_fold_into_kinds() {
        assert_eq!(FieldType::from_fieldtype("Check"), Some(FieldType::Boolean));
        assert_eq!(FieldType::from_fieldtype("Small Text"), Some(FieldType::Text));
        assert_eq!(FieldType::from_fieldtype("Text Editor"), Some(FieldType::LongText));
        assert_eq!(FieldType::from_fieldtype("Float"), Some(FieldType::Numeric));
        assert_eq!(FieldType::from_fieldtype("Table"), None);
    }

    #[test]
    fn test_field_type_serialization() {
        let json = serde_json::to_string(&FieldType::DynamicLink).unwrap();
        assert_eq!(json, "\"dynamic_link\"");
        let restored: FieldType = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, FieldType::DynamicLink);
    }
}
