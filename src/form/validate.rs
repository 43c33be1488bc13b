//! Per-widget validation rules.
//!
//! # Design Decisions
//! - Validation is synchronous and runs before every submission
//! - Every invalid field is reported, keyed by field id
//! - Absent optional fields are always valid; empty values are valid unless
//!   the field is required

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use url::Url;

use super::descriptor::{FieldDescriptor, WidgetKind};
use crate::document::FieldValue;

static HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("host pattern"));

const HEALTH_CHECK_SCHEMES: &[&str] = &["http", "https", "tcp", "grpc"];

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("value is required")]
    Required,

    #[error("expected a single value")]
    ExpectedText,

    #[error("expected a list of values")]
    ExpectedList,

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid duration (e.g. 500ms, 30s, 1m30s)")]
    InvalidDuration(String),

    #[error("entry {index} '{value}': {reason}")]
    InvalidAddr { index: usize, value: String, reason: String },

    #[error("address '{0}' is listed more than once")]
    DuplicateAddr(String),

    #[error("'{value}' is not one of: {options}")]
    NotAnOption { value: String, options: String },

    #[error("invalid health check '{value}': {reason}")]
    InvalidHealthCheck { value: String, reason: String },

    #[error("entry {0} is empty")]
    EmptyEntry(usize),

    #[error("invalid header '{value}': {reason}")]
    InvalidHeader { value: String, reason: String },

    #[error("invalid name '{0}': must be non-empty without '/' or whitespace")]
    InvalidName(String),
}

/// Validation failures keyed by field id.
pub type FieldErrors = BTreeMap<String, FieldError>;

/// An address entry split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr {
    pub host: String,
    pub port: u16,
    pub weight: Option<u32>,
}

/// Parse `host:port[ weight]`; IPv6 hosts must be bracketed.
pub fn parse_addr(entry: &str) -> Result<Addr, String> {
    let mut parts = entry.split_whitespace();
    let host_port = parts.next().ok_or_else(|| "empty address".to_string())?;
    let weight = match parts.next() {
        Some(w) => match w.parse::<u32>() {
            Ok(w) if w > 0 => Some(w),
            _ => return Err(format!("weight '{}' must be a positive integer", w)),
        },
        None => None,
    };
    if parts.next().is_some() {
        return Err("expected 'host:port' optionally followed by a weight".to_string());
    }

    let (host, port) = if let Some(rest) = host_port.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| "bracketed host must be followed by ':port'".to_string())?;
        host.parse::<std::net::Ipv6Addr>()
            .map_err(|_| format!("'{}' is not an IPv6 address", host))?;
        (host, port)
    } else {
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| "missing ':port'".to_string())?;
        if !HOST.is_match(host) {
            return Err(format!("'{}' is not a valid host", host));
        }
        (host, port)
    };

    let port = match port.parse::<u16>() {
        Ok(p) if p > 0 => p,
        _ => return Err(format!("port '{}' must be between 1 and 65535", port)),
    };

    Ok(Addr {
        host: host.to_string(),
        port,
        weight,
    })
}

/// Resource names key the document, so they cannot contain separators.
pub fn validate_name(name: &str) -> Result<(), FieldError> {
    if name.is_empty() || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(FieldError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn text<'a>(value: &'a FieldValue) -> Result<&'a str, FieldError> {
    value.as_text().ok_or(FieldError::ExpectedText)
}

fn list<'a>(value: &'a FieldValue) -> Result<&'a [String], FieldError> {
    value.as_list().ok_or(FieldError::ExpectedList)
}

/// Listen addresses (`weighted == false`) must not carry a weight.
fn validate_addrs(entries: &[String], weighted: bool) -> Result<(), FieldError> {
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let invalid = |reason: String| FieldError::InvalidAddr {
            index,
            value: entry.clone(),
            reason,
        };
        let addr = parse_addr(entry).map_err(invalid)?;
        if !weighted && addr.weight.is_some() {
            return Err(invalid("listen address takes no weight".to_string()));
        }
        if !seen.insert((addr.host, addr.port)) {
            return Err(FieldError::DuplicateAddr(entry.trim().to_string()));
        }
    }
    Ok(())
}

fn validate_health_check(value: &str) -> Result<(), FieldError> {
    let invalid = |reason: String| FieldError::InvalidHealthCheck {
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !HEALTH_CHECK_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(format!(
            "scheme must be one of {}",
            HEALTH_CHECK_SCHEMES.join(", ")
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

fn validate_header(line: &str) -> Result<(), FieldError> {
    let invalid = |reason: &str| FieldError::InvalidHeader {
        value: line.to_string(),
        reason: reason.to_string(),
    };
    let (name, value) = line.split_once(':').ok_or_else(|| invalid("expected 'Name: value'"))?;
    HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid("bad header name"))?;
    HeaderValue::from_str(value.trim()).map_err(|_| invalid("bad header value"))?;
    Ok(())
}

/// Check one field's value against its widget rules.
pub fn validate_field(item: &FieldDescriptor, value: Option<&FieldValue>) -> Result<(), FieldError> {
    let Some(value) = value else {
        return if item.required { Err(FieldError::Required) } else { Ok(()) };
    };

    if item.kind.is_list() {
        let entries = list(value)?;
        if entries.is_empty() {
            return if item.required { Err(FieldError::Required) } else { Ok(()) };
        }
        if let Some(index) = entries.iter().position(|e| e.trim().is_empty()) {
            return Err(FieldError::EmptyEntry(index));
        }
        return match &item.kind {
            WidgetKind::Addrs => validate_addrs(entries, true),
            WidgetKind::ListenAddrs => validate_addrs(entries, false),
            WidgetKind::Headers => entries.iter().try_for_each(|line| validate_header(line)),
            _ => Ok(()),
        };
    }

    let raw = text(value)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        // Empty string is a legal explicit value for optional fields.
        return if item.required { Err(FieldError::Required) } else { Ok(()) };
    }

    match &item.kind {
        WidgetKind::Text => Ok(()),
        WidgetKind::Number => trimmed
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| FieldError::InvalidNumber(raw.to_string())),
        WidgetKind::Duration => humantime::parse_duration(trimmed)
            .map(|_| ())
            .map_err(|_| FieldError::InvalidDuration(raw.to_string())),
        WidgetKind::Select { options } => {
            if options.iter().any(|o| o == trimmed) {
                Ok(())
            } else {
                Err(FieldError::NotAnOption {
                    value: raw.to_string(),
                    options: options.join(", "),
                })
            }
        }
        WidgetKind::HealthCheck => validate_health_check(trimmed),
        WidgetKind::Addrs | WidgetKind::ListenAddrs | WidgetKind::List | WidgetKind::Headers => {
            Err(FieldError::ExpectedList)
        }
    }
}

/// Validate every field; returns all failures, not just the first.
pub fn validate_all<'a, F>(items: &[FieldDescriptor], value_of: F) -> Result<(), FieldErrors>
where
    F: Fn(&str) -> Option<&'a FieldValue>,
{
    let errors: FieldErrors = items
        .iter()
        .filter_map(|item| {
            validate_field(item, value_of(item.id.as_str()))
                .err()
                .map(|e| (item.id.clone(), e))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(kind: WidgetKind, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        validate_field(&FieldDescriptor::new("f", kind), Some(&value.into()))
    }

    #[test]
    fn test_parse_addr() {
        assert_eq!(
            parse_addr("10.0.0.1:80").unwrap(),
            Addr { host: "10.0.0.1".into(), port: 80, weight: None }
        );
        assert_eq!(parse_addr("backend.local:8080 10").unwrap().weight, Some(10));
        assert_eq!(parse_addr("[::1]:443").unwrap().host, "::1");

        assert!(parse_addr("10.0.0.1").is_err());
        assert!(parse_addr("10.0.0.1:0").is_err());
        assert!(parse_addr("10.0.0.1:70000").is_err());
        assert!(parse_addr("10.0.0.1:80 0").is_err());
        assert!(parse_addr("10.0.0.1:80 5 extra").is_err());
        assert!(parse_addr("::1:80").is_err());
        assert!(parse_addr(":80").is_err());
    }

    #[test]
    fn test_durations() {
        for ok in ["500ms", "30s", "1m30s", "2h", "1m 30s", "10sec"] {
            assert!(check(WidgetKind::Duration, ok).is_ok(), "{}", ok);
        }
        // Fractions are not part of the proxy's duration grammar.
        for bad in ["30", "s", "thirty seconds", "-1s", "1.5s", "0.0001ns"] {
            assert!(
                matches!(check(WidgetKind::Duration, bad), Err(FieldError::InvalidDuration(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_addrs_rules() {
        assert!(check(WidgetKind::Addrs, vec!["10.0.0.1:80", "10.0.0.2:80 5"]).is_ok());
        assert!(matches!(
            check(WidgetKind::Addrs, vec!["10.0.0.1:80", "nope"]),
            Err(FieldError::InvalidAddr { index: 1, .. })
        ));
        assert!(matches!(
            check(WidgetKind::Addrs, vec!["10.0.0.1:80", "10.0.0.1:80 3"]),
            Err(FieldError::DuplicateAddr(_))
        ));
        assert!(matches!(
            check(WidgetKind::Addrs, vec!["10.0.0.1:80", " "]),
            Err(FieldError::EmptyEntry(1))
        ));
        assert_eq!(check(WidgetKind::Addrs, "10.0.0.1:80"), Err(FieldError::ExpectedList));
    }

    #[test]
    fn test_listen_addrs_reject_weight() {
        let items = crate::form::descriptors_for(crate::document::Category::Servers, None);
        let addr = items.iter().find(|item| item.id == "addr").unwrap();

        assert!(validate_field(addr, Some(&FieldValue::from(vec!["0.0.0.0:6188", "[::]:6188"]))).is_ok());
        assert!(matches!(
            validate_field(addr, Some(&FieldValue::from(vec!["0.0.0.0:6188 10"]))),
            Err(FieldError::InvalidAddr { index: 0, .. })
        ));
        assert!(matches!(
            check(WidgetKind::ListenAddrs, vec!["0.0.0.0:6188", "0.0.0.0:6188"]),
            Err(FieldError::DuplicateAddr(_))
        ));
    }

    #[test]
    fn test_empty_addrs_only_rejected_when_required() {
        let optional = FieldDescriptor::new("addrs", WidgetKind::Addrs);
        let required = FieldDescriptor::new("addrs", WidgetKind::Addrs).required();
        let empty = FieldValue::List(Vec::new());

        assert!(validate_field(&optional, Some(&empty)).is_ok());
        assert_eq!(validate_field(&required, Some(&empty)), Err(FieldError::Required));
        assert_eq!(validate_field(&required, None), Err(FieldError::Required));
    }

    #[test]
    fn test_empty_text_is_legal_unless_required() {
        assert!(check(WidgetKind::Text, "").is_ok());
        assert!(check(WidgetKind::Duration, "").is_ok());
        let required = FieldDescriptor::new("upstream", WidgetKind::Text).required();
        assert_eq!(
            validate_field(&required, Some(&FieldValue::from(""))),
            Err(FieldError::Required)
        );
    }

    #[test]
    fn test_select_and_number() {
        let algo = WidgetKind::Select { options: vec!["round_robin".into(), "hash:ip".into()] };
        assert!(check(algo.clone(), "hash:ip").is_ok());
        assert!(matches!(check(algo, "random"), Err(FieldError::NotAnOption { .. })));

        assert!(check(WidgetKind::Number, "4").is_ok());
        assert!(matches!(check(WidgetKind::Number, "-4"), Err(FieldError::InvalidNumber(_))));
    }

    #[test]
    fn test_health_check() {
        assert!(check(WidgetKind::HealthCheck, "http://charts/ping?connection_timeout=3s").is_ok());
        assert!(check(WidgetKind::HealthCheck, "tcp://charts").is_ok());
        assert!(matches!(
            check(WidgetKind::HealthCheck, "ftp://charts"),
            Err(FieldError::InvalidHealthCheck { .. })
        ));
        assert!(matches!(
            check(WidgetKind::HealthCheck, "charts/ping"),
            Err(FieldError::InvalidHealthCheck { .. })
        ));
    }

    #[test]
    fn test_headers() {
        assert!(check(WidgetKind::Headers, vec!["X-Request-Id: $request_id", "Host:charts"]).is_ok());
        assert!(matches!(
            check(WidgetKind::Headers, vec!["no separator"]),
            Err(FieldError::InvalidHeader { .. })
        ));
        assert!(matches!(
            check(WidgetKind::Headers, vec!["Bad Name: v"]),
            Err(FieldError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_names() {
        assert!(validate_name("charts").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a b").is_err());
    }

    #[test]
    fn test_validate_all_reports_every_field() {
        let items = vec![
            FieldDescriptor::new("addrs", WidgetKind::Addrs).required(),
            FieldDescriptor::new("read_timeout", WidgetKind::Duration),
            FieldDescriptor::new("remark", WidgetKind::Text),
        ];
        let timeout = FieldValue::from("soon");
        let errors = validate_all(&items, |id| match id {
            "read_timeout" => Some(&timeout),
            _ => None,
        })
        .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors["addrs"], FieldError::Required);
        assert!(matches!(errors["read_timeout"], FieldError::InvalidDuration(_)));
    }
}
