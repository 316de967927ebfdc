//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: Settings → Result<(), Vec<ValidationError>>
//! - Runs after every override layer has been applied

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::Settings;
use crate::discovery::docker::DockerEndpoint;

/// A single semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let prefix = &settings.label_prefix;
    if prefix.is_empty() {
        errors.push(ValidationError::new("label_prefix", "must not be empty"));
    } else if prefix.contains(char::is_whitespace) || prefix.contains('.') {
        errors.push(ValidationError::new(
            "label_prefix",
            format!("'{}' must not contain whitespace or dots", prefix),
        ));
    }

    if settings.timing.polling_interval.is_zero() {
        errors.push(ValidationError::new("timing.polling_interval", "must be > 0"));
    }
    if settings.timing.debounce.is_zero() {
        errors.push(ValidationError::new("timing.debounce", "must be > 0"));
    }

    if let Err(e) = DockerEndpoint::parse(&settings.docker.host) {
        errors.push(ValidationError::new("docker.host", e.to_string()));
    }

    let admin = &settings.caddy.admin_url;
    if !admin.is_empty() && url::Url::parse(admin).is_err() {
        errors.push(ValidationError::new(
            "caddy.admin_url",
            format!("'{}' is not a valid URL", admin),
        ));
    }

    let observability = &settings.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
