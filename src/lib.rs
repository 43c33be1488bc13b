//! Configuration console core for a reverse proxy control plane.
//!
//! A client-side store caching the proxy's configuration document and a
//! schema-driven form engine that edits one resource at a time through it.

pub mod config;
pub mod document;
pub mod form;
pub mod observability;
pub mod remote;
pub mod store;

pub use document::{Category, ConfigurationDocument, FieldValue, Fields, Resource};
pub use form::{FieldDescriptor, FormEditor, WidgetKind};
pub use store::ConfigStore;
