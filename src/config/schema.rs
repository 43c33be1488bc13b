//! Console settings schema.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root settings for the console.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Where the configuration document lives.
    pub remote: RemoteConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Which `ConfigService` backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// Admin API over HTTP.
    #[default]
    Http,
    /// TOML document on local disk.
    File,
    /// In-process document, nothing persisted.
    Memory,
}

/// Remote configuration service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,

    /// Admin API base URL (kind = "http").
    pub url: String,

    /// Bearer token for the admin API.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Document path (kind = "file").
    pub path: String,

    /// Refresh interval in seconds for `watch` when the document is not a
    /// local file.
    pub poll_secs: u64,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::Http,
            url: "http://127.0.0.1:3018".to_string(),
            api_key: None,
            timeout_secs: 10,
            path: "pingap.toml".to_string(),
            poll_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}
