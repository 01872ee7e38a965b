//! `withResilience` (spec §4.9): compose timeout, retry, and circuit
//! breaker into the single call shape services actually want, innermost to
//! outermost as `breaker(retry(timeout(op)))` — the breaker gates whether an
//! attempt is allowed at all, retry decides whether to re-attempt, and
//! timeout bounds each individual attempt. A breaker failure is recorded
//! once per call to [`with_resilience`], not once per retry attempt, so a
//! burst of retries against a flaky dependency trips the breaker exactly as
//! fast as one sustained failure would (spec §4.9 "the breaker observes the
//! outcome of the whole retried operation, not each attempt").

use std::future::Future;
use std::sync::Arc;

use er_core::HasErrorKind;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::ResilienceError;
use crate::retry::{execute_with_retry, RetryConfig};
use crate::timeout::{with_timeout, TimeoutConfig};

pub struct ResilienceConfig {
    pub timeout: TimeoutConfig,
    pub retry: RetryConfig,
}

/// Run `op` under timeout + retry + (optionally) a circuit breaker.
///
/// `breaker` is optional: omit it to compose timeout and retry alone (spec
/// §4.9 distinguishes "has no registered breaker" from "breaker open").
pub async fn with_resilience<T, E, F, Fut>(
    mut op: F,
    config: &ResilienceConfig,
    breaker: Option<&CircuitBreaker>,
    cancellation: Option<&CancellationToken>,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasErrorKind + Clone,
{
    if let Some(breaker) = breaker {
        if !breaker.allow_request() {
            return Err(ResilienceError::Unavailable {
                service_name: config.timeout.service_name.clone(),
                reset_at: breaker.reset_at().unwrap_or_else(chrono::Utc::now),
            });
        }
    }

    let timeout_config = config.timeout.clone();
    let result = execute_with_retry(
        move |attempt| {
            let timeout_config = timeout_config.clone();
            let fut = op(attempt);
            async move { with_timeout(fut, &timeout_config, None).await }
        },
        &config.retry,
        None,
        None,
        cancellation,
    )
    .await;

    if let Some(breaker) = breaker {
        match &result {
            Ok(_) => breaker.record_success(),
            Err(_) => breaker.record_failure(),
        }
    }

    result
}

/// As [`with_resilience`], but resolves the breaker from a shared registry
/// keyed by `config.timeout.service_name` rather than requiring the caller
/// to look one up first (spec §4.9 `withResilience` convenience overload).
pub async fn with_resilience_for_service<T, E, F, Fut>(
    op: F,
    config: &ResilienceConfig,
    registry: &crate::circuit_breaker::CircuitBreakerRegistry,
    cancellation: Option<&CancellationToken>,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasErrorKind + Clone,
{
    let breaker: Arc<CircuitBreaker> = registry.get_or_create(&config.timeout.service_name);
    with_resilience(op, config, Some(&breaker), cancellation).await
}
