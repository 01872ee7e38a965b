//! `ServiceError` (spec §6 "Plugin contract", §7): the single carrier type
//! every plugin failure converts into, whatever its underlying cause
//! (timeout, network, validation, ...), following spec §9's guidance to use
//! "a single carrier with an enumerated kind field" rather than a class
//! hierarchy.

use er_core::{ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("service '{name}' not found in registry")]
    NotRegistered { name: String },
    #[error("service '{name}' is already registered")]
    AlreadyRegistered { name: String },
    #[error("service '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },
    #[error("service '{name}' circuit is open until {reset_at}")]
    Unavailable {
        name: String,
        reset_at: chrono::DateTime<chrono::Utc>,
    },
    #[error("service '{name}' rejected the record: {reason}")]
    Rejected { name: String, reason: String },
    #[error("service '{name}' reported invalid input: {reason}")]
    Validation { name: String, reason: String },
    #[error("service '{name}' found nothing: {reason}")]
    NotFound { name: String, reason: String },
    #[error("service '{name}' network failure: {message}")]
    Network { name: String, message: String },
    #[error("service '{name}' server failure: {message}")]
    Server { name: String, message: String },
    #[error("service '{name}' failed: {message}")]
    Unknown { name: String, message: String },
}

impl ServiceError {
    pub fn name(&self) -> &str {
        match self {
            ServiceError::NotRegistered { name }
            | ServiceError::AlreadyRegistered { name }
            | ServiceError::Timeout { name, .. }
            | ServiceError::Unavailable { name, .. }
            | ServiceError::Rejected { name, .. }
            | ServiceError::Validation { name, .. }
            | ServiceError::NotFound { name, .. }
            | ServiceError::Network { name, .. }
            | ServiceError::Server { name, .. }
            | ServiceError::Unknown { name, .. } => name,
        }
    }
}

impl HasErrorKind for ServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotRegistered { .. } => ErrorKind::Configuration,
            ServiceError::AlreadyRegistered { .. } => ErrorKind::Configuration,
            ServiceError::Timeout { .. } => ErrorKind::Timeout,
            ServiceError::Unavailable { .. } => ErrorKind::Unavailable,
            ServiceError::Rejected { .. } => ErrorKind::Rejected,
            ServiceError::Validation { .. } => ErrorKind::Validation,
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::Network { .. } => ErrorKind::Network,
            ServiceError::Server { .. } => ErrorKind::Server,
            ServiceError::Unknown { .. } => ErrorKind::Unknown,
        }
    }
}

/// Converts a resilience-layer failure (timeout/unavailable/cancelled, or
/// the wrapped plugin error) into a flat [`ServiceError`], preserving the
/// `retryable` flag that `kind()` implies (spec §4.10 "Convert thrown
/// errors to `ServiceError` subclasses... preserving retryable flag").
pub fn from_resilience_error(name: &str, err: er_resilience::ResilienceError<ServiceError>) -> ServiceError {
    match err {
        er_resilience::ResilienceError::Timeout { timeout_ms, .. } => ServiceError::Timeout {
            name: name.to_string(),
            timeout_ms,
        },
        er_resilience::ResilienceError::Unavailable { reset_at, .. } => ServiceError::Unavailable {
            name: name.to_string(),
            reset_at,
        },
        er_resilience::ResilienceError::Cancelled => ServiceError::Timeout {
            name: name.to_string(),
            timeout_ms: 0,
        },
        er_resilience::ResilienceError::Operation(inner) => inner,
    }
}
