//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! All problems are reported at once rather than stopping at the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::PulseConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

/// Placeholder key shipped in earlier sample configs. Never accepted.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

pub fn validate_config(config: &PulseConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if !config.tracing.api_prefix.starts_with('/') {
        errors.push(ValidationError::new("tracing.api_prefix", "must start with '/'"));
    }
    for prefix in &config.tracing.excluded_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "tracing.excluded_prefixes",
                format!("'{prefix}' must start with '/'"),
            ));
        }
    }
    if config.tracing.stream_queue_capacity == 0 {
        errors.push(ValidationError::new("tracing.stream_queue_capacity", "must be greater than 0"));
    }

    let telemetry = &config.telemetry;
    if telemetry.sample_interval_ms == 0 {
        errors.push(ValidationError::new("telemetry.sample_interval_ms", "must be greater than 0"));
    }
    if telemetry.loop_resolution_ms == 0 || telemetry.loop_resolution_ms >= telemetry.sample_interval_ms {
        errors.push(ValidationError::new(
            "telemetry.loop_resolution_ms",
            "must be greater than 0 and below sample_interval_ms",
        ));
    }
    if telemetry.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("telemetry.probe_timeout_ms", "must be greater than 0"));
    }

    if config.aggregation.enabled && url::Url::parse(&config.aggregation.base_url).is_err() {
        errors.push(ValidationError::new(
            "aggregation.base_url",
            format!("'{}' is not a valid URL", config.aggregation.base_url),
        ));
    }

    let api_key = &config.admin.api_key;
    if !api_key.is_empty() && api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be blank"));
    }
    if api_key.trim() == PLACEHOLDER_API_KEY {
        errors.push(ValidationError::new(
            "admin.api_key",
            "is the published placeholder; set a secret key",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("'{}' is not one of pretty, json", observability.log_format),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
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
