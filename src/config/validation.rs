//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ConsoleConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use url::Url;

use super::schema::{ConsoleConfig, RemoteKind};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("remote.url '{0}' is not an http(s) URL")]
    InvalidRemoteUrl(String),

    #[error("remote.path must be set when remote.kind = \"file\"")]
    MissingDocumentPath,

    #[error("remote.timeout_secs must be greater than 0")]
    ZeroTimeout,

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

pub fn validate_config(config: &ConsoleConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let remote = &config.remote;

    match remote.kind {
        RemoteKind::Http => {
            let valid = Url::parse(&remote.url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                errors.push(ValidationError::InvalidRemoteUrl(remote.url.clone()));
            }
            if remote.timeout_secs == 0 {
                errors.push(ValidationError::ZeroTimeout);
            }
        }
        RemoteKind::File => {
            if remote.path.trim().is_empty() {
                errors.push(ValidationError::MissingDocumentPath);
            }
        }
        RemoteKind::Memory => {}
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
