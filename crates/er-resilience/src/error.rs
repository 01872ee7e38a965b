//! The error type shared by every resilience primitive (spec §4.9, §7):
//! wraps the wrapped operation's own error while adding the two failure
//! modes resilience itself introduces — a deadline elapsing, and a tripped
//! circuit breaker refusing to let the call through.
//!
//! Implemented as a hand-written `Display`/`Error` pair rather than a
//! `thiserror` derive: the inner `Operation(E)` variant is generic over
//! whatever error the wrapped operation raises, and thiserror's bound
//! inference for generic parameters is not reliable enough to lean on here.

use std::fmt;

use chrono::{DateTime, Utc};
use er_core::{ErrorKind, HasErrorKind};

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ResilienceError<E> {
    Timeout { service_name: String, timeout_ms: u64 },
    Unavailable {
        service_name: String,
        reset_at: DateTime<Utc>,
    },
    Cancelled,
    Operation(E),
}

impl<E> ResilienceError<E> {
    pub fn operation(self) -> Option<E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::Timeout { service_name, timeout_ms } => {
                write!(f, "service '{service_name}' timed out after {timeout_ms}ms")
            }
            ResilienceError::Unavailable { service_name, reset_at } => {
                write!(f, "service '{service_name}' unavailable; circuit open until {reset_at}")
            }
            ResilienceError::Cancelled => write!(f, "operation cancelled"),
            ResilienceError::Operation(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ResilienceError<E> {}

impl<E: HasErrorKind> HasErrorKind for ResilienceError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::Timeout { .. } => ErrorKind::Timeout,
            ResilienceError::Unavailable { .. } => ErrorKind::Unavailable,
            ResilienceError::Cancelled => ErrorKind::Timeout,
            ResilienceError::Operation(e) => e.kind(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            ResilienceError::Timeout { .. } => true,
            ResilienceError::Unavailable { .. } => false,
            ResilienceError::Cancelled => false,
            ResilienceError::Operation(e) => e.retryable(),
        }
    }
}
