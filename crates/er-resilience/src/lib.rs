//! Resilience primitives for service calls: timeout, retry with backoff and
//! jitter, and a circuit breaker, usable standalone or composed via
//! [`compose::with_resilience`]. Grounded on the teacher's
//! `semantic::resilience` module, generalized to the typed
//! `er_core::HasErrorKind` error vocabulary shared across this workspace.

mod circuit_breaker;
mod compose;
mod error;
mod retry;
mod timeout;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, FailureCallback,
    StateChangeCallback, SuccessCallback,
};
pub use compose::{with_resilience, with_resilience_for_service, ResilienceConfig};
pub use error::ResilienceError;
pub use retry::{
    base_delay, execute_with_retry, execute_with_retry_detailed, is_retryable, jittered_delay,
    AttemptRecord, RetryConfig, RetryOn, RetryOutcome,
};
pub use timeout::{with_timeout, TimeoutConfig, DEFAULT_TIMEOUT};
