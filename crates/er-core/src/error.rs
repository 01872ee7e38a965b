//! The shared failure-category vocabulary used across every crate's
//! `thiserror` error type (spec §7 "Error taxonomy surfaced to callers").
//!
//! Individual crates still define their own error enums with their own
//! variants and messages — this is deliberately *not* a single god error
//! type (spec §9 warns against deep inheritance) — but each implements
//! [`HasErrorKind`] so the retry classifier (`er-resilience`) and the
//! service executor's failure conversion (`er-service`) can reason about
//! retryability without knowing every crate's concrete error type.

use serde::{Deserialize, Serialize};

/// The failure category, independent of which crate raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Network,
    Server,
    Validation,
    Configuration,
    Plugin,
    NotFound,
    Rejected,
    Unavailable,
    Unknown,
}

impl ErrorKind {
    /// Default retryability for the kind, absent any explicit override.
    /// Timeout/network/server/unknown are transient by default; everything
    /// else reflects a condition retrying cannot fix.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Network | ErrorKind::Server | ErrorKind::Unknown
        )
    }
}

/// Implemented by every crate-local error type so cross-cutting code
/// (retry, circuit breaker, service result conversion) can classify a
/// failure without downcasting to a concrete type.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;

    /// Whether this particular error instance is retryable. Defaults to
    /// the kind's default, but implementors may override per spec §4.9
    /// ("it exposes `retryable = false` -> never retried").
    fn retryable(&self) -> bool {
        self.kind().default_retryable()
    }
}
