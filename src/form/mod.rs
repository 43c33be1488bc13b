//! Schema-driven form editing.
//!
//! # Data Flow
//! ```text
//! Resource from ConfigStore
//!     → descriptor.rs (FieldDescriptor per field, widget by semantic type)
//!     → editor.rs (FormEditor holds one EditDraft)
//!     → draft.rs (typed edits, list add/remove/reorder)
//!     → validate.rs (per-widget rules, all errors keyed by field)
//!     → Upsert callback (usually StoreUpsert → ConfigStore::update)
//! ```
//!
//! # Design Decisions
//! - The engine knows nothing about categories or transport
//! - Submissions carry only the fields that changed; the store merges them

pub mod descriptor;
pub mod draft;
pub mod editor;
pub mod validate;

pub use descriptor::{descriptors_for, FieldDescriptor, WidgetKind};
pub use draft::{DraftError, EditDraft};
pub use editor::{EditorStatus, FormEditor, StoreUpsert, SubmitError, Upsert, UpsertError};
pub use validate::{parse_addr, validate_field, FieldError, FieldErrors};
