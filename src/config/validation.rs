//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the routing backend name resolves to a known router
//! - Validate value ranges (drain time > 0, host present)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::ServiceConfig;
use crate::routing::RouterKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.host must not be empty")]
    EmptyHost,

    #[error("server.router {0:?} is not one of mux, tree, axum")]
    UnknownRouter(String),

    #[error("server.drain_time_secs must be greater than zero")]
    ZeroDrainTime,
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if config.server.router.parse::<RouterKind>().is_err() {
        errors.push(ValidationError::UnknownRouter(config.server.router.clone()));
    }

    if config.server.drain_time_secs == 0 {
        errors.push(ValidationError::ZeroDrainTime);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
