//! Per-category field side-table.
//!
//! Declares which field ids a resource of each category may carry and the
//! semantic type of each. The form engine maps these types to widgets.

use super::Category;

/// Semantic type of a resource field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free text.
    Text,
    /// Non-negative integer, transmitted as a string.
    Number,
    /// Duration string such as `30s` or `1m30s`.
    Duration,
    /// Ordered list of `host:port[ weight]` entries.
    Addrs,
    /// Ordered list of `host:port` listen addresses.
    ListenAddrs,
    /// Load balancing algorithm selector.
    Algo,
    /// Health check directive (`http://...`, `tcp://...`).
    HealthCheck,
    /// Ordered list of plain strings.
    List,
    /// Ordered list of `Name: value` header lines.
    Headers,
}

/// One legal field of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: &'static str,
    pub kind: FieldType,
    pub required: bool,
}

const fn field(id: &'static str, kind: FieldType) -> FieldSpec {
    FieldSpec { id, kind, required: false }
}

const fn required(id: &'static str, kind: FieldType) -> FieldSpec {
    FieldSpec { id, kind, required: true }
}

const UPSTREAM_FIELDS: &[FieldSpec] = &[
    required("addrs", FieldType::Addrs),
    field("algo", FieldType::Algo),
    field("health_check", FieldType::HealthCheck),
    field("connection_timeout", FieldType::Duration),
    field("total_connection_timeout", FieldType::Duration),
    field("read_timeout", FieldType::Duration),
    field("write_timeout", FieldType::Duration),
    field("idle_timeout", FieldType::Duration),
    field("sni", FieldType::Text),
    field("remark", FieldType::Text),
];

const LOCATION_FIELDS: &[FieldSpec] = &[
    required("upstream", FieldType::Text),
    field("path", FieldType::Text),
    field("host", FieldType::Text),
    field("rewrite", FieldType::Text),
    field("proxy_set_headers", FieldType::Headers),
    field("proxy_add_headers", FieldType::Headers),
    field("client_max_body_size", FieldType::Text),
    field("weight", FieldType::Number),
    field("remark", FieldType::Text),
];

const SERVER_FIELDS: &[FieldSpec] = &[
    required("addr", FieldType::ListenAddrs),
    field("locations", FieldType::List),
    field("access_log", FieldType::Text),
    field("threads", FieldType::Number),
    field("remark", FieldType::Text),
];

/// Legal fields of `category`, in display order.
pub fn fields_of(category: Category) -> &'static [FieldSpec] {
    match category {
        Category::Upstreams => UPSTREAM_FIELDS,
        Category::Locations => LOCATION_FIELDS,
        Category::Servers => SERVER_FIELDS,
    }
}

pub fn lookup(category: Category, id: &str) -> Option<&'static FieldSpec> {
    fields_of(category).iter().find(|spec| spec.id == id)
}
