//! `withRetry` (spec §4.9): exponential backoff with jitter, gated by a
//! pluggable retryability classifier. Grounded on the teacher's
//! `semantic::resilience::retry::execute_with_retry_async`, generalized
//! from string-sniffing (`is_retryable_error`) to the typed
//! `er_core::HasErrorKind` vocabulary shared across the workspace.

use std::future::Future;
use std::time::Duration;

use er_core::{ErrorKind, HasErrorKind};
use tokio_util::sync::CancellationToken;

/// The coarse buckets `retryOn` can name (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    Timeout,
    Network,
    ServerOrUnknown,
    All,
}

fn kind_in_bucket(kind: ErrorKind, bucket: RetryOn) -> bool {
    match bucket {
        RetryOn::Timeout => kind == ErrorKind::Timeout,
        RetryOn::Network => kind == ErrorKind::Network,
        RetryOn::ServerOrUnknown => matches!(kind, ErrorKind::Server | ErrorKind::Unknown),
        RetryOn::All => true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    /// Restricts retries to errors whose kind falls in one of these
    /// buckets. Empty (the default) means "no restriction beyond the
    /// error's own `retryable` flag" — equivalent to `[RetryOn::All]`.
    pub retry_on: Vec<RetryOn>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(5000),
            retry_on: Vec::new(),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_retry_on(mut self, retry_on: Vec<RetryOn>) -> Self {
        self.retry_on = retry_on;
        self
    }
}

/// Backoff delay for attempt `n` (1-based), before jitter: `min(initial *
/// multiplier^(n-1), max)` (spec §4.9).
pub fn base_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let millis =
        config.initial_delay.as_millis() as f64 * config.backoff_multiplier.powi(attempt as i32 - 1);
    let capped = millis.min(config.max_delay.as_millis() as f64);
    Duration::from_millis(capped.round() as u64)
}

/// `base_delay` with multiplicative jitter of ±20% (spec §4.9: `jitter =
/// delay * 0.2 * (rand*2-1)`, floored at zero).
pub fn jittered_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = base_delay(config, attempt).as_millis() as f64;
    let jitter = base * 0.2 * (fastrand::f64() * 2.0 - 1.0);
    Duration::from_millis((base + jitter).max(0.0).round() as u64)
}

/// Whether `error` should be retried, per the cascade in spec §4.9:
/// an explicit `retryable=false` always wins; otherwise a custom
/// `should_retry` predicate is honored if supplied; otherwise a configured
/// `retry_on` allowlist restricts retries to matching kinds; with no
/// restriction configured, the error's own `retryable` flag (already known
/// true at this point) decides.
pub fn is_retryable<E: HasErrorKind>(
    error: &E,
    config: &RetryConfig,
    should_retry: Option<&dyn Fn(&E) -> bool>,
) -> bool {
    if !error.retryable() {
        return false;
    }
    if let Some(predicate) = should_retry {
        return predicate(error);
    }
    if config.retry_on.is_empty() || config.retry_on.contains(&RetryOn::All) {
        return true;
    }
    config
        .retry_on
        .iter()
        .any(|bucket| kind_in_bucket(error.kind(), *bucket))
}

/// Per-attempt trace for [`execute_with_retry_detailed`].
#[derive(Debug, Clone)]
pub struct AttemptRecord<E> {
    pub attempt: u32,
    pub duration: Duration,
    pub error: Option<E>,
    pub delay_before_next: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: Vec<AttemptRecord<E>>,
    pub total_duration: Duration,
}

/// Run `op`, retrying per `config` until it succeeds, a non-retryable error
/// is hit, `max_attempts` is exhausted, or `cancellation` fires.
pub async fn execute_with_retry<T, E, F, Fut>(
    op: F,
    config: &RetryConfig,
    should_retry: Option<&dyn Fn(&E) -> bool>,
    on_retry: Option<&dyn Fn(u32, &E, Duration)>,
    cancellation: Option<&CancellationToken>,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasErrorKind + Clone,
{
    execute_with_retry_detailed(op, config, should_retry, on_retry, cancellation)
        .await
        .result
}

/// As [`execute_with_retry`], but also returns per-attempt timing for
/// diagnostics (spec §4.9 `withRetryDetailed`).
pub async fn execute_with_retry_detailed<T, E, F, Fut>(
    mut op: F,
    config: &RetryConfig,
    should_retry: Option<&dyn Fn(&E) -> bool>,
    on_retry: Option<&dyn Fn(u32, &E, Duration)>,
    cancellation: Option<&CancellationToken>,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasErrorKind + Clone,
{
    let start = std::time::Instant::now();
    let mut attempts = Vec::new();

    for attempt in 1..=config.max_attempts {
        let attempt_start = std::time::Instant::now();
        let result = op(attempt).await;
        let duration = attempt_start.elapsed();

        match result {
            Ok(value) => {
                attempts.push(AttemptRecord {
                    attempt,
                    duration,
                    error: None,
                    delay_before_next: None,
                });
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }
            Err(error) => {
                let can_retry = attempt < config.max_attempts && is_retryable(&error, config, should_retry);
                if !can_retry {
                    attempts.push(AttemptRecord {
                        attempt,
                        duration,
                        error: Some(error.clone()),
                        delay_before_next: None,
                    });
                    return RetryOutcome {
                        result: Err(error),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                }

                let delay = jittered_delay(config, attempt);
                attempts.push(AttemptRecord {
                    attempt,
                    duration,
                    error: Some(error.clone()),
                    delay_before_next: Some(delay),
                });
                if let Some(callback) = on_retry {
                    callback(attempt, &error, delay);
                }

                if sleep_or_cancelled(delay, cancellation).await.is_err() {
                    return RetryOutcome {
                        result: Err(error),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                }
            }
        }
    }
    unreachable!("max_attempts must be >= 1, loop always returns on its last iteration")
}

async fn sleep_or_cancelled(delay: Duration, cancellation: Option<&CancellationToken>) -> Result<(), ()> {
    match cancellation {
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
        Some(token) => tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = token.cancelled() => Err(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use er_core::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(ErrorKind, bool);

    impl HasErrorKind for TestError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
        fn retryable(&self) -> bool {
            self.1
        }
    }

    #[tokio::test]
    async fn succeeds_without_retrying_on_first_try() {
        let config = RetryConfig::default();
        let result: Result<i32, TestError> =
            execute_with_retry(|_attempt| async { Ok(7) }, &config, None, None, None).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_until_success_within_max_attempts() {
        let config = RetryConfig::default()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let result: Result<i32, TestError> = execute_with_retry(
            |_attempt| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError(ErrorKind::Network, true))
                    } else {
                        Ok(99)
                    }
                }
            },
            &config,
            None,
            None,
            None,
        )
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let config = RetryConfig::default().with_initial_delay(Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let result: Result<i32, TestError> = execute_with_retry(
            |_attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(ErrorKind::Validation, false)) }
            },
            &config,
            None,
            None,
            None,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts_then_fails() {
        let config = RetryConfig::default()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let result: Result<i32, TestError> = execute_with_retry(
            |_attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(ErrorKind::Network, true)) }
            },
            &config,
            None,
            None,
            None,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_is_monotonically_increasing_up_to_the_cap() {
        let config = RetryConfig::default()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_millis(1000));
        let d1 = base_delay(&config, 1);
        let d2 = base_delay(&config, 2);
        let d3 = base_delay(&config, 3);
        let d10 = base_delay(&config, 10);
        assert!(d1 <= d2 && d2 <= d3);
        assert_eq!(d10, Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let config = RetryConfig::default().with_initial_delay(Duration::from_millis(1000));
        let base = base_delay(&config, 1).as_millis() as f64;
        for _ in 0..200 {
            let jittered = jittered_delay(&config, 1).as_millis() as f64;
            assert!(jittered >= base * 0.8 - 1.0 && jittered <= base * 1.2 + 1.0);
        }
    }

    #[test]
    fn retry_on_allowlist_restricts_retryable_kinds() {
        let config = RetryConfig::default().with_retry_on(vec![RetryOn::Timeout]);
        let network_err = TestError(ErrorKind::Network, true);
        let timeout_err = TestError(ErrorKind::Timeout, true);
        assert!(!is_retryable(&network_err, &config, None));
        assert!(is_retryable(&timeout_err, &config, None));
    }

    #[test]
    fn explicit_retryable_false_always_wins() {
        let config = RetryConfig::default();
        let err = TestError(ErrorKind::Timeout, false);
        assert!(!is_retryable(&err, &config, None));
    }

    #[test]
    fn custom_should_retry_overrides_default_classification() {
        let config = RetryConfig::default();
        let err = TestError(ErrorKind::Validation, true);
        let predicate: &dyn Fn(&TestError) -> bool = &|_| true;
        assert!(is_retryable(&err, &config, Some(predicate)));
    }
}
