//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::{Component, Path};

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `config` for values serde cannot reject on its own.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.content.root.as_os_str().is_empty() {
        errors.push(ValidationError::new("content.root", "must not be empty"));
    }
    if !is_single_component(&config.content.cache_dir) {
        errors.push(ValidationError::new(
            "content.cache_dir",
            format!("'{}' must be a single directory name", config.content.cache_dir),
        ));
    }

    if HeaderName::from_bytes(config.descriptor.header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "descriptor.header",
            format!("'{}' is not a valid header name", config.descriptor.header),
        ));
    }
    if config.descriptor.product.trim().is_empty() {
        errors.push(ValidationError::new("descriptor.product", "must not be empty"));
    }

    if config.compiler.program.trim().is_empty() {
        errors.push(ValidationError::new("compiler.program", "must not be empty"));
    }
    if config.compiler.timeout_secs == 0 {
        errors.push(ValidationError::new("compiler.timeout_secs", "must be greater than 0"));
    }
    if config.compiler.max_workers == 0 {
        errors.push(ValidationError::new("compiler.max_workers", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "localhost".into();
        config.content.cache_dir = "../lib".into();
        config.descriptor.header = "bad header".into();
        config.compiler.max_workers = 0;
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "content.cache_dir",
                "descriptor.header",
                "compiler.max_workers",
                "timeouts.request_secs",
            ]
        );
    }

    #[test]
    fn test_cache_dir_names() {
        assert!(is_single_component(".lib"));
        assert!(is_single_component("build"));
        assert!(!is_single_component(""));
        assert!(!is_single_component("a/b"));
        assert!(!is_single_component(".."));
        assert!(!is_single_component("/tmp"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }
}
