//! Configuration document model.
//!
//! # Data Flow
//! ```text
//! remote service (whole document)
//!     → ConfigurationDocument (one ResourceMap per Category)
//!     → Resource (field id → FieldValue)
//!     → schema.rs (per-category side-table of legal fields)
//! ```
//!
//! # Design Decisions
//! - Resources are flat maps keyed by field id, not one struct per category
//! - Field values stay in wire form (strings and string lists); parsing
//!   happens at the edges in the form validators
//! - Unknown fields sent by the server are kept verbatim

pub mod schema;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use schema::{FieldSpec, FieldType};

/// A named group of same-shaped resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Upstreams,
    Locations,
    Servers,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Upstreams, Category::Locations, Category::Servers];

    /// Wire name of the category (also the document key).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Upstreams => "upstreams",
            Category::Locations => "locations",
            Category::Servers => "servers",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts both the plural wire name and the singular form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upstreams" | "upstream" => Ok(Category::Upstreams),
            "locations" | "location" => Ok(Category::Locations),
            "servers" | "server" => Ok(Category::Servers),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// A single field value as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::List(value.into_iter().map(String::from).collect())
    }
}

/// Partial or whole set of field values, keyed by field id.
pub type Fields = BTreeMap<String, FieldValue>;

/// One named configuration entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    fields: Fields,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.fields.get(id).and_then(FieldValue::as_text)
    }

    pub fn list(&self, id: &str) -> Option<&[String]> {
        self.fields.get(id).and_then(FieldValue::as_list)
    }

    pub fn set(&mut self, id: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(id.into(), value.into());
    }

    /// Overwrite the named fields, leaving every other field untouched.
    pub fn merge(&mut self, partial: Fields) {
        self.fields.extend(partial);
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Required fields of `category` that are absent.
    pub fn missing_required(&self, category: Category) -> Vec<&'static str> {
        schema::fields_of(category)
            .iter()
            .filter(|spec| spec.required && !self.fields.contains_key(spec.id))
            .map(|spec| spec.id)
            .collect()
    }
}

/// Resources of one category, keyed by name.
pub type ResourceMap = BTreeMap<String, Resource>;

/// Root configuration object held by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationDocument {
    pub upstreams: ResourceMap,
    pub locations: ResourceMap,
    pub servers: ResourceMap,
}

impl ConfigurationDocument {
    pub fn resources(&self, category: Category) -> &ResourceMap {
        match category {
            Category::Upstreams => &self.upstreams,
            Category::Locations => &self.locations,
            Category::Servers => &self.servers,
        }
    }

    pub fn resources_mut(&mut self, category: Category) -> &mut ResourceMap {
        match category {
            Category::Upstreams => &mut self.upstreams,
            Category::Locations => &mut self.locations,
            Category::Servers => &mut self.servers,
        }
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&Resource> {
        self.resources(category).get(name)
    }

    /// Replace (or create) one entry.
    pub fn put(&mut self, category: Category, name: impl Into<String>, resource: Resource) {
        self.resources_mut(category).insert(name.into(), resource);
    }

    pub fn take(&mut self, category: Category, name: &str) -> Option<Resource> {
        self.resources_mut(category).remove(name)
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.resources(*c).is_empty())
    }
}
