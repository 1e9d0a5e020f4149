use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::FilterError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Control kind of a filterable field. Only the presentation layer branches on this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
    },
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn date(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: FieldKind::Date,
        }
    }

    pub fn select(
        name: impl Into<String>,
        label: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: FieldKind::Select { options },
        }
    }
}

/// An ordered field list whose names are known to be unique and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, FilterError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for f in &fields {
            if f.name.trim().is_empty() {
                return Err(FilterError::schema("field name must not be empty"));
            }
            if !seen.insert(f.name.as_str()) {
                return Err(FilterError::schema(format!(
                    "duplicate field name: {}",
                    f.name
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Parses descriptors as delivered by the form-schema service.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, FilterError> {
        let fields: Vec<FieldDescriptor> = serde_json::from_value(value.clone())
            .map_err(|e| FilterError::schema(e.to_string()))?;
        Self::new(fields)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
