//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, timeouts > 0, address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("pool.capacity must be at least 1")]
    ZeroPoolCapacity,

    #[error("downstream.base_url must not be empty")]
    EmptyDownstreamUrl,

    #[error("downstream.default_timeout_secs must be at least 1")]
    ZeroDownstreamTimeout,

    #[error("listener.request_timeout_secs must be at least 1")]
    ZeroRequestTimeout,
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.pool.capacity == 0 {
        errors.push(ValidationError::ZeroPoolCapacity);
    }

    if config.downstream.base_url.is_empty() {
        errors.push(ValidationError::EmptyDownstreamUrl);
    }

    if config.downstream.default_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDownstreamTimeout);
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
