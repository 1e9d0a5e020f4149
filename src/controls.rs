use serde::Serialize;

use crate::filters::FilterState;
use crate::schema::{FieldKind, Schema, SelectOption};

/// Label of the catch-all option every select control starts with.
pub const ANY_OPTION_LABEL: &str = "All";

/// What the drawer should render for one field, with its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "camelCase")]
pub enum Control {
    TextInput {
        name: String,
        label: String,
        value: String,
    },
    Select {
        name: String,
        label: String,
        value: String,
        options: Vec<SelectOption>,
    },
    DatePicker {
        name: String,
        label: String,
        value: String,
    },
}

impl Control {
    pub fn name(&self) -> &str {
        match self {
            Control::TextInput { name, .. }
            | Control::Select { name, .. }
            | Control::DatePicker { name, .. } => name,
        }
    }
}

pub fn render_controls(schema: &Schema, state: &FilterState) -> Vec<Control> {
    schema
        .fields()
        .iter()
        .map(|f| {
            let name = f.name.clone();
            let label = f.label.clone();
            let value = state.get(&f.name).cloned().unwrap_or_default();
            match &f.kind {
                FieldKind::Text => Control::TextInput { name, label, value },
                FieldKind::Date => Control::DatePicker { name, label, value },
                FieldKind::Select { options } => {
                    let mut opts = Vec::with_capacity(options.len() + 1);
                    opts.push(SelectOption::new("", ANY_OPTION_LABEL));
                    opts.extend(options.iter().filter(|o| !o.value.is_empty()).cloned());
                    Control::Select {
                        name,
                        label,
                        value,
                        options: opts,
                    }
                }
            }
        })
        .collect()
}
