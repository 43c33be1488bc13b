//! Console settings.
//!
//! # Data Flow
//! ```text
//! console.toml
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ConsoleConfig (validated, immutable)
//!     → CLI flags override individual fields
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ConsoleConfig, ObservabilityConfig, RemoteConfig, RemoteKind};
pub use validation::{validate_config, ValidationError};
