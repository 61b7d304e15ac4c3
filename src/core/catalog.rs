//! FieldCatalog: the filterable fields of a record list and their types
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::FieldType;

/// A single filterable field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    /// Choices for single-select fields, the link target for link fields
    #[serde(default)]
    pub options: Vec<String>,
}

impl FieldDescriptor {
    /// Create a descriptor whose label is the field name
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            field_type,
            options: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Raw field row as returned by the backend's filterable-fields endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRow {
    pub fieldname: String,
    #[serde(default)]
    pub label: Option<String>,
    pub fieldtype: String,
    #[serde(default)]
    pub options: Option<String>,
}

impl FieldRow {
    /// Convert to a descriptor, or None when the field type cannot be filtered
    pub fn into_descriptor(self) -> Option<FieldDescriptor> {
        let Some(field_type) = FieldType::from_fieldtype(&self.fieldtype) else {
            debug!("Skipping field {} with unfilterable type {}", self.fieldname, self.fieldtype);
            return None;
        };
        // Select choices arrive newline separated, links carry a single target
        let options = match (field_type, self.options) {
            (FieldType::SingleSelect, Some(raw)) => raw
                .split('\n')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            (FieldType::Link | FieldType::DynamicLink, Some(raw)) if !raw.trim().is_empty() => {
                vec![raw.trim().to_string()]
            }
            _ => Vec::new(),
        };
        let label = self
            .label
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.fieldname.clone());
        Some(FieldDescriptor {
            name: self.fieldname,
            label,
            field_type,
            options,
        })
    }
}

/// Ordered, read-only snapshot of the filterable fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        let mut catalog = Self::default();
        for field in fields {
            catalog.push(field);
        }
        catalog
    }

    /// Build a catalog from backend rows, dropping unfilterable field types
    pub fn from_rows(rows: Vec<FieldRow>) -> Self {
        Self::new(rows.into_iter().filter_map(FieldRow::into_descriptor).collect())
    }

    /// Parse the backend's JSON array of field rows
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let rows: Vec<FieldRow> = serde_json::from_str(json)?;
        Ok(Self::from_rows(rows))
    }

    /// Append the record fields every list has, unless the backend already sent them
    pub fn with_standard_fields(mut self, doctype: &str) -> Self {
        let standard = [
            FieldDescriptor::new("name", FieldType::Link)
                .with_label("ID")
                .with_options([doctype]),
            FieldDescriptor::new("owner", FieldType::Link)
                .with_label("Created By")
                .with_options(["User"]),
            FieldDescriptor::new("modified_by", FieldType::Link)
                .with_label("Last Updated By")
                .with_options(["User"]),
            FieldDescriptor::new("creation", FieldType::Datetime).with_label("Created On"),
            FieldDescriptor::new("modified", FieldType::Datetime).with_label("Last Updated On"),
        ];
        for field in standard {
            self.push(field);
        }
        self
    }

    /// Field names are unique; a later duplicate is ignored
    fn push(&mut self, field: FieldDescriptor) {
        if self.contains(&field.name) {
            debug!("Ignoring duplicate catalog field {}", field.name);
            return;
        }
        self.fields.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Catalog descriptor for `name`, or a plain text descriptor for fields the
    /// catalog does not know (e.g. a payload written against an older catalog)
    pub fn resolve(&self, name: &str) -> FieldDescriptor {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| FieldDescriptor::new(name, FieldType::Text))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
