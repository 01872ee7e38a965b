//! `withTimeout` (spec §4.9): race an operation against a deadline and,
//! separately, an external cancellation signal. `tokio::select!` drops
//! whichever branch loses, which disposes the `tokio::time::sleep` timer on
//! every exit path — satisfying spec §9's "manual timer cleanup... release
//! guaranteed whether the promise resolves, rejects, or is cancelled"
//! without any explicit teardown code.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ResilienceError;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub timeout: Duration,
    pub service_name: String,
}

impl TimeoutConfig {
    pub fn new(service_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            timeout,
            service_name: service_name.into(),
        }
    }
}

/// Default per-service timeout (spec §5: "per-service 5000 ms").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Run `op` to completion, or fail with [`ResilienceError::Timeout`] if
/// `config.timeout` elapses first, or [`ResilienceError::Cancelled`] if
/// `cancellation` fires first.
pub async fn with_timeout<T, E, F>(
    op: F,
    config: &TimeoutConfig,
    cancellation: Option<&CancellationToken>,
) -> Result<T, ResilienceError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    let sleep = tokio::time::sleep(config.timeout);
    tokio::pin!(sleep);
    tokio::pin!(op);

    tokio::select! {
        biased;
        result = &mut op => result.map_err(ResilienceError::Operation),
        _ = cancelled(cancellation) => Err(ResilienceError::Cancelled),
        _ = &mut sleep => Err(ResilienceError::Timeout {
            service_name: config.service_name.clone(),
            timeout_ms: config.timeout.as_millis() as u64,
        }),
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_with_the_operations_value() {
        let config = TimeoutConfig::new("svc", Duration::from_millis(50));
        let result: Result<i32, ResilienceError<String>> =
            with_timeout(async { Ok::<_, String>(42) }, &config, None).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn times_out_when_the_operation_is_too_slow() {
        let config = TimeoutConfig::new("svc", Duration::from_millis(10));
        let result: Result<i32, ResilienceError<String>> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, String>(1)
            },
            &config,
            None,
        )
        .await;
        assert!(matches!(result, Err(ResilienceError::Timeout { .. })));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_immediately() {
        let config = TimeoutConfig::new("svc", Duration::from_secs(5));
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<i32, ResilienceError<String>> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(1)
            },
            &config,
            Some(&token),
        )
        .await;
        assert!(matches!(result, Err(ResilienceError::Cancelled)));
    }

    #[tokio::test]
    async fn propagates_the_operations_own_error() {
        let config = TimeoutConfig::new("svc", Duration::from_millis(50));
        let result: Result<i32, ResilienceError<String>> =
            with_timeout(async { Err::<i32, _>("boom".to_string()) }, &config, None).await;
        assert!(matches!(result, Err(ResilienceError::Operation(msg)) if msg == "boom"));
    }
}
