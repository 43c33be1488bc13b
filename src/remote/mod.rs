//! Remote configuration service.
//!
//! # Data Flow
//! ```text
//! ConfigStore
//!     → ConfigService::fetch   (whole document)
//!     → ConfigService::upsert  (one resource, whole record)
//!     → ConfigService::delete  (one resource)
//!
//! Implementations:
//!     → http.rs   (admin API over reqwest)
//!     → file.rs   (TOML document on disk, + watcher.rs for reloads)
//!     → memory.rs (in-process, with fault injection)
//! ```
//!
//! # Design Decisions
//! - An upsert either fully applies or fully fails
//! - Timeouts belong to the transport, never to the store
//! - No retries at this layer

pub mod file;
pub mod http;
pub mod memory;
pub mod watcher;

use async_trait::async_trait;
use thiserror::Error;

use crate::document::{Category, ConfigurationDocument, Resource};

pub use file::FileService;
pub use http::HttpService;
pub use memory::MemoryService;
pub use watcher::FileWatcher;

/// Failure reported by a remote configuration service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by remote (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode document: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Remote source of truth for the configuration document.
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Fetch the whole document.
    async fn fetch(&self) -> Result<ConfigurationDocument, RemoteError>;

    /// Create or replace one resource.
    async fn upsert(
        &self,
        category: Category,
        name: &str,
        resource: &Resource,
    ) -> Result<(), RemoteError>;

    /// Delete one resource.
    async fn delete(&self, category: Category, name: &str) -> Result<(), RemoteError>;
}
