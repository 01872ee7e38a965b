//! Per-service configuration (spec §4.10): how a registered plugin's result
//! is interpreted, and which resilience/cache knobs wrap its execution.

use std::sync::Arc;

use er_cache::SetOptions as CacheSetOptions;
use er_resilience::{CircuitBreakerConfig, RetryConfig, TimeoutConfig};
use serde_json::Value as JsonValue;

use crate::plugin::{ExecutionPoint, ServicePlugin};

/// What to do when a plugin is invalid/not-found/failed (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnOutcome {
    Reject,
    Continue,
    Flag,
}

/// Cache-aside knobs for one service (spec §4.10 "Wrap that with
/// cache-aside using the service's cache config").
#[derive(Debug, Clone)]
pub struct ServiceCacheConfig {
    pub enabled: bool,
    pub set_options: CacheSetOptions,
    pub stale_on_error: bool,
    /// Caller-supplied key function, overriding `serviceName:stableHash(input)`.
    pub key_fn: Option<Arc<dyn Fn(&JsonValue) -> String + Send + Sync>>,
}

impl Default for ServiceCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            set_options: CacheSetOptions::default(),
            stale_on_error: false,
            key_fn: None,
        }
    }
}

impl ServiceCacheConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_stale_on_error(mut self, stale_on_error: bool) -> Self {
        self.stale_on_error = stale_on_error;
        self
    }

    pub fn with_set_options(mut self, set_options: CacheSetOptions) -> Self {
        self.set_options = set_options;
        self
    }

    pub fn with_key_fn(mut self, key_fn: Arc<dyn Fn(&JsonValue) -> String + Send + Sync>) -> Self {
        self.key_fn = Some(key_fn);
        self
    }
}

/// A predicate that re-interprets a raw successful plugin payload as
/// valid/invalid or found/not-found (spec §4.10 `resultPredicate?`).
pub type ResultPredicate = Arc<dyn Fn(&JsonValue) -> bool + Send + Sync>;

/// One registered service's behavior (spec §4.10 "Per-service config").
#[derive(Clone)]
pub struct ServiceConfig {
    pub plugin: Arc<dyn ServicePlugin>,
    pub execution_point: ExecutionPoint,
    pub on_failure: OnOutcome,
    pub on_invalid: OnOutcome,
    pub on_not_found: OnOutcome,
    pub required: bool,
    /// Ascending order within the same execution point, default 100, ties
    /// broken by registration order (spec §4.10 step 2). `execution_order`,
    /// when set, wins outright over `priority`.
    pub priority: i64,
    pub execution_order: Option<i64>,
    pub timeout: TimeoutConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: ServiceCacheConfig,
    /// Dot-paths of the input record this plugin actually consumes; purely
    /// informational unless `field_mapping` also narrows the payload.
    pub fields: Option<Vec<String>>,
    /// Renames input fields before they reach the plugin (source path ->
    /// plugin-facing name).
    pub field_mapping: Option<Vec<(String, String)>>,
    pub result_predicate: Option<ResultPredicate>,
    pub custom_params: Option<JsonValue>,
}

impl ServiceConfig {
    pub fn new(plugin: Arc<dyn ServicePlugin>, execution_point: ExecutionPoint) -> Self {
        let name = plugin.name().to_string();
        Self {
            plugin,
            execution_point,
            on_failure: OnOutcome::Continue,
            on_invalid: OnOutcome::Continue,
            on_not_found: OnOutcome::Continue,
            required: false,
            priority: 100,
            execution_order: None,
            timeout: TimeoutConfig::new(name, er_resilience::DEFAULT_TIMEOUT),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: ServiceCacheConfig::default(),
            fields: None,
            field_mapping: None,
            result_predicate: None,
            custom_params: None,
        }
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn with_on_failure(mut self, on_failure: OnOutcome) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_on_invalid(mut self, on_invalid: OnOutcome) -> Self {
        self.on_invalid = on_invalid;
        self
    }

    pub fn with_on_not_found(mut self, on_not_found: OnOutcome) -> Self {
        self.on_not_found = on_not_found;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_execution_order(mut self, execution_order: i64) -> Self {
        self.execution_order = Some(execution_order);
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_cache(mut self, cache: ServiceCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_result_predicate(mut self, predicate: ResultPredicate) -> Self {
        self.result_predicate = Some(predicate);
        self
    }

    pub fn with_custom_params(mut self, params: JsonValue) -> Self {
        self.custom_params = Some(params);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginKind, ServiceContext, ServiceResult, Timing};
    use async_trait::async_trait;
    use er_core::Record;
    use std::sync::Arc as StdArc;

    struct NoopPlugin;

    #[async_trait]
    impl ServicePlugin for NoopPlugin {
        fn name(&self) -> &str {
            "noop"
        }

        fn kind(&self) -> PluginKind {
            PluginKind::Custom
        }

        async fn execute(&self, _input: &Record, _context: &ServiceContext) -> Result<ServiceResult, crate::error::ServiceError> {
            let now = chrono::Utc::now();
            Ok(ServiceResult::ok(None, Timing::span(now, now)))
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig::new(StdArc::new(NoopPlugin), ExecutionPoint::PreMatch)
    }

    #[test]
    fn apply_to_fills_in_an_untouched_on_failure() {
        let defaults = RegistryDefaults {
            on_failure: OnOutcome::Flag,
            ..RegistryDefaults::default()
        };
        let applied = defaults.apply_to(config());
        assert_eq!(applied.on_failure, OnOutcome::Flag);
    }

    #[test]
    fn apply_to_preserves_an_explicit_on_failure_override() {
        let defaults = RegistryDefaults {
            on_failure: OnOutcome::Flag,
            ..RegistryDefaults::default()
        };
        let explicit = config().with_on_failure(OnOutcome::Reject);
        let applied = defaults.apply_to(explicit);
        assert_eq!(applied.on_failure, OnOutcome::Reject);
    }
}

/// Registry-wide defaults merged into a [`ServiceConfig`] on registration
/// wherever that service's own config didn't already opt into something
/// different (spec §4.10 "Defaults are merged into each service config on
/// registration").
#[derive(Clone)]
pub struct RegistryDefaults {
    pub on_failure: OnOutcome,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            on_failure: OnOutcome::Continue,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RegistryDefaults {
    /// Apply these defaults to `config`, only where the service left the
    /// corresponding knob at `ServiceConfig::new`'s own defaults.
    pub fn apply_to(&self, mut config: ServiceConfig) -> ServiceConfig {
        if config.on_failure == OnOutcome::Continue {
            config.on_failure = self.on_failure;
        }
        if config.retry == RetryConfig::default() {
            config.retry = self.retry.clone();
        }
        if config.circuit_breaker == CircuitBreakerConfig::default() {
            config.circuit_breaker = self.circuit_breaker.clone();
        }
        config
    }
}
