//! Field descriptors.
//!
//! A descriptor tells the editor how to render and validate one resource
//! field. Descriptors are rebuilt every time a resource is opened.

use crate::document::{schema, Category, FieldType, FieldValue, Resource};

/// Algorithms offered for `algo` fields.
pub const ALGO_OPTIONS: &[&str] = &["round_robin", "hash:url", "hash:ip", "hash:path"];

/// Rendering and validation strategy for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
    Number,
    Duration,
    Addrs,
    /// Listen addresses: like `Addrs` without weights.
    ListenAddrs,
    Select { options: Vec<String> },
    HealthCheck,
    List,
    Headers,
}

impl WidgetKind {
    /// Whether the widget edits an ordered list rather than a single value.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            WidgetKind::Addrs | WidgetKind::ListenAddrs | WidgetKind::List | WidgetKind::Headers
        )
    }

    fn default_width(&self) -> u8 {
        match self {
            WidgetKind::Number | WidgetKind::Duration => 4,
            WidgetKind::Text | WidgetKind::Select { .. } => 6,
            WidgetKind::ListenAddrs => 6,
            WidgetKind::Addrs | WidgetKind::HealthCheck | WidgetKind::List | WidgetKind::Headers => 12,
        }
    }
}

/// Metadata for one editable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: String,
    pub label: String,
    /// Current value of the field; `None` when the resource does not carry it.
    pub default_value: Option<FieldValue>,
    /// Layout width on a 12 column grid.
    pub display_width: u8,
    pub kind: WidgetKind,
    /// Absent or empty values fail validation.
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, kind: WidgetKind) -> Self {
        let id = id.into();
        Self {
            label: label_for(&id),
            display_width: kind.default_width(),
            id,
            default_value: None,
            kind,
            required: false,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn display_width(mut self, width: u8) -> Self {
        self.display_width = width.clamp(1, 12);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// "connection_timeout" → "Connection Timeout"
fn label_for(id: &str) -> String {
    id.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn widget_for(kind: FieldType, current: Option<&FieldValue>) -> WidgetKind {
    match kind {
        FieldType::Text => WidgetKind::Text,
        FieldType::Number => WidgetKind::Number,
        FieldType::Duration => WidgetKind::Duration,
        FieldType::Addrs => WidgetKind::Addrs,
        FieldType::ListenAddrs => WidgetKind::ListenAddrs,
        FieldType::HealthCheck => WidgetKind::HealthCheck,
        FieldType::List => WidgetKind::List,
        FieldType::Headers => WidgetKind::Headers,
        FieldType::Algo => {
            let mut options: Vec<String> = ALGO_OPTIONS.iter().map(|s| s.to_string()).collect();
            // Keep custom selectors such as hash:header:X-User selectable.
            if let Some(custom) = current.and_then(FieldValue::as_text) {
                if !custom.is_empty() && !options.iter().any(|o| o == custom) {
                    options.push(custom.to_string());
                }
            }
            WidgetKind::Select { options }
        }
    }
}

/// Descriptors for a resource of `category`, defaulted from `resource`.
///
/// Fields the server sent that the side-table does not know are appended as
/// plain text or list widgets so they survive an edit.
pub fn descriptors_for(category: Category, resource: Option<&Resource>) -> Vec<FieldDescriptor> {
    let current = |id: &str| resource.and_then(|r| r.get(id));

    let mut items: Vec<FieldDescriptor> = schema::fields_of(category)
        .iter()
        .map(|spec| FieldDescriptor {
            default_value: current(spec.id).cloned(),
            required: spec.required,
            ..FieldDescriptor::new(spec.id, widget_for(spec.kind, current(spec.id)))
        })
        .collect();

    if let Some(resource) = resource {
        for (id, value) in resource.fields() {
            if schema::lookup(category, id).is_some() {
                continue;
            }
            let kind = match value {
                FieldValue::Text(_) => WidgetKind::Text,
                FieldValue::List(_) => WidgetKind::List,
            };
            items.push(FieldDescriptor::new(id.clone(), kind).default_value(value.clone()));
        }
    }
    items
}
