//! The service executor: registry + pre-match/post-match pipeline (spec
//! §4.10). Grounded on the teacher's `semantic::resilience` composition
//! plus `matcher::engine`'s "deterministic ordering over a closed set of
//! steps" shape, generalized to a registry of boxed trait objects instead
//! of a fixed list.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use er_cache::{Cache, CacheConfig, GetOptions, SharedCache};
use er_core::{set_path, stable_stringify, Record, Value};
use er_resilience::{with_resilience, CircuitBreakerRegistry, CircuitState, ResilienceConfig};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{OnOutcome, RegistryDefaults, ServiceConfig};
use crate::error::{from_resilience_error, ServiceError};
use crate::plugin::{ExecutionPoint, HealthState, PluginKind, ServiceContext, ServiceResult, Timing};

struct Registration {
    config: ServiceConfig,
    index: usize,
}

/// Where in the pipeline a batch of services executes (spec §4.10 step 2
/// "Parallel mode runs the selected set with `Promise.all`-equivalent
/// concurrency while preserving result ordering").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// The outcome of running one pipeline phase (spec §4.10 "Result").
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub proceed: bool,
    pub results: BTreeMap<String, ServiceResult>,
    pub enriched_record: Record,
    pub flags: Vec<String>,
    pub score_adjustments: Vec<f64>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub total_duration_ms: i64,
}

/// Health snapshot for one registered plugin (spec §4.10 `getHealthStatus`).
#[derive(Debug, Clone)]
pub struct ServiceHealth {
    pub name: String,
    pub health_check: HealthState,
    pub circuit: CircuitState,
    /// `healthCheck` overlaid with circuit state: an open circuit always
    /// reports unhealthy regardless of what the plugin's own check says
    /// (spec §4.10 "overlays circuit state (open -> unhealthy)").
    pub effective: HealthState,
}

/// Registry of plugins plus the shared cache and circuit-breaker state
/// their execution is wrapped in (spec §3 "Ownership": "the service
/// executor exclusively owns its registry of plugin configs and its
/// circuit-breaker/cache instances").
pub struct ServiceExecutor {
    services: DashMap<String, Registration>,
    registration_counter: AtomicUsize,
    defaults: RegistryDefaults,
    breakers: CircuitBreakerRegistry,
    cache: SharedCache<JsonValue>,
}

impl ServiceExecutor {
    pub fn new(defaults: RegistryDefaults, cache_config: CacheConfig) -> Self {
        Self {
            services: DashMap::new(),
            registration_counter: AtomicUsize::new(0),
            breakers: CircuitBreakerRegistry::default(),
            cache: Cache::shared(cache_config),
            defaults,
        }
    }

    /// Register a plugin under its own config. Rejects a duplicate name
    /// (spec §4.10 `ServiceAlreadyRegisteredError`) and merges registry-wide
    /// defaults into the supplied config.
    pub fn register(&self, config: ServiceConfig) -> Result<(), ServiceError> {
        let name = config.name().to_string();
        if self.services.contains_key(&name) {
            return Err(ServiceError::AlreadyRegistered { name });
        }
        let config = self.defaults.apply_to(config);
        self.breakers.get_or_create_with(&name, Some(config.circuit_breaker.clone()));
        let index = self.registration_counter.fetch_add(1, AtomicOrdering::SeqCst);
        self.services.insert(name, Registration { config, index });
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.services.remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub async fn execute_pre_match(
        &self,
        record: Record,
        correlation_id: Option<String>,
        caller: Option<String>,
        mode: ExecutionMode,
        cancellation: Option<&CancellationToken>,
    ) -> PipelineResult {
        self.run_phase(record, None, ExecutionPoint::PreMatch, correlation_id, caller, mode, cancellation)
            .await
    }

    pub async fn execute_post_match(
        &self,
        record: Record,
        match_result: JsonValue,
        correlation_id: Option<String>,
        caller: Option<String>,
        mode: ExecutionMode,
        cancellation: Option<&CancellationToken>,
    ) -> PipelineResult {
        self.run_phase(
            record,
            Some(match_result),
            ExecutionPoint::PostMatch,
            correlation_id,
            caller,
            mode,
            cancellation,
        )
        .await
    }

    async fn run_phase(
        &self,
        record: Record,
        match_result: Option<JsonValue>,
        phase: ExecutionPoint,
        correlation_id: Option<String>,
        caller: Option<String>,
        mode: ExecutionMode,
        cancellation: Option<&CancellationToken>,
    ) -> PipelineResult {
        let started = Utc::now();
        let correlation_id = correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut keyed: Vec<(ServiceConfig, usize)> = self
            .services
            .iter()
            .filter(|entry| matches_phase(entry.config.execution_point, phase))
            .map(|entry| (entry.config.clone(), entry.index))
            .collect();
        keyed.sort_by_key(|(config, index)| (config.execution_order.unwrap_or(config.priority), *index));
        let selected: Vec<ServiceConfig> = keyed.into_iter().map(|(config, _)| config).collect();

        let mut results = BTreeMap::new();
        let mut flags = Vec::new();
        let mut score_adjustments = Vec::new();
        let mut enriched = record;
        let mut proceed = true;
        let mut rejected_by = None;
        let mut rejection_reason = None;

        match mode {
            ExecutionMode::Sequential => {
                for config in selected {
                    let ctx = self.build_context(&enriched, &correlation_id, caller.clone());
                    let outcome = self.run_one(&config, &enriched, &ctx, cancellation).await;
                    let (stop, reason) =
                        self.apply_outcome(&config, phase, &match_result, outcome, &mut enriched, &mut flags, &mut score_adjustments, &mut results);
                    if stop {
                        proceed = false;
                        rejected_by = Some(config.name().to_string());
                        rejection_reason = reason;
                        break;
                    }
                }
            }
            ExecutionMode::Parallel => {
                let ctx = self.build_context(&enriched, &correlation_id, caller.clone());
                let base_record = enriched.clone();
                let futures_iter = selected.iter().map(|config| {
                    let config = config.clone();
                    let ctx = ctx.clone();
                    let base_record = base_record.clone();
                    async move {
                        let result = self.run_one(&config, &base_record, &ctx, cancellation).await;
                        (config, result)
                    }
                });
                let outcomes = futures::future::join_all(futures_iter).await;
                for (config, outcome) in outcomes {
                    let (stop, reason) =
                        self.apply_outcome(&config, phase, &match_result, outcome, &mut enriched, &mut flags, &mut score_adjustments, &mut results);
                    if stop && proceed {
                        proceed = false;
                        rejected_by = Some(config.name().to_string());
                        rejection_reason = reason;
                    }
                }
            }
        }

        PipelineResult {
            proceed,
            results,
            enriched_record: enriched,
            flags,
            score_adjustments,
            rejected_by,
            rejection_reason,
            total_duration_ms: (Utc::now() - started).num_milliseconds(),
        }
    }

    fn build_context(&self, record: &Record, correlation_id: &str, caller: Option<String>) -> ServiceContext {
        ServiceContext {
            record: record.clone(),
            correlation_id: correlation_id.to_string(),
            started_at: Utc::now(),
            caller,
            metadata: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Runs one plugin through cache-aside + resilience wrapping (spec
    /// §4.10 step 3).
    async fn run_one(
        &self,
        config: &ServiceConfig,
        record: &Record,
        ctx: &ServiceContext,
        cancellation: Option<&CancellationToken>,
    ) -> ServiceResult {
        let started = Utc::now();
        let cache_key = config.cache.enabled.then(|| self.cache_key(config, record));

        if let Some(key) = &cache_key {
            let mut cache = self.cache.lock().unwrap();
            if let Some(outcome) = cache.get(key, GetOptions::default()) {
                if !outcome.is_stale {
                    let timing = Timing::span(started, Utc::now());
                    return ServiceResult::ok(Some(outcome.value), timing).with_cached(true);
                }
            }
        }

        let breaker = self.breakers.get_or_create_with(config.name(), Some(config.circuit_breaker.clone()));
        let resilience_config = ResilienceConfig {
            timeout: config.timeout.clone(),
            retry: config.retry.clone(),
        };
        let plugin = config.plugin.clone();
        let record_for_call = record.clone();
        let ctx_for_call = ctx.clone();
        let call_result = with_resilience(
            move |_attempt| {
                let plugin = plugin.clone();
                let record = record_for_call.clone();
                let ctx = ctx_for_call.clone();
                async move { plugin.execute(&record, &ctx).await }
            },
            &resilience_config,
            Some(&breaker),
            cancellation,
        )
        .await;

        match call_result {
            Ok(result) => {
                if let (Some(key), Some(data)) = (&cache_key, &result.data) {
                    let mut cache = self.cache.lock().unwrap();
                    cache.set(key.clone(), data.clone(), config.cache.set_options.clone());
                }
                result
            }
            Err(err) => {
                if config.cache.stale_on_error {
                    if let Some(key) = &cache_key {
                        let mut cache = self.cache.lock().unwrap();
                        if let Some(outcome) = cache.get(key, GetOptions::allow_stale()) {
                            let timing = Timing::span(started, Utc::now());
                            return ServiceResult::ok(Some(outcome.value), timing).with_cached(true);
                        }
                    }
                }
                let timing = Timing::span(started, Utc::now());
                ServiceResult::failed(from_resilience_error(config.name(), err), timing)
            }
        }
    }

    fn cache_key(&self, config: &ServiceConfig, record: &Record) -> String {
        let canonical = record_to_json(record);
        if let Some(key_fn) = &config.cache.key_fn {
            return format!("{}:{}", config.name(), key_fn(&canonical));
        }
        let stable = stable_stringify(&canonical);
        format!("{}:{}", config.name(), er_core::fnv1a_hex(&stable))
    }

    /// Step 4/5 of the pipeline: interpret the outcome by plugin kind and
    /// apply the service's on-failure/on-invalid/on-not-found policy.
    /// Returns `(should_stop, rejection_reason)`.
    #[allow(clippy::too_many_arguments)]
    fn apply_outcome(
        &self,
        config: &ServiceConfig,
        phase: ExecutionPoint,
        _match_result: &Option<JsonValue>,
        result: ServiceResult,
        enriched: &mut Record,
        flags: &mut Vec<String>,
        score_adjustments: &mut Vec<f64>,
        results: &mut BTreeMap<String, ServiceResult>,
    ) -> (bool, Option<String>) {
        let name = config.name().to_string();
        let _ = phase;

        if !result.success {
            let outcome = if config.required {
                OnOutcome::Reject
            } else {
                config.on_failure
            };
            results.insert(name.clone(), result);
            return match outcome {
                OnOutcome::Reject => (true, Some(format!("service '{name}' failed"))),
                OnOutcome::Flag => {
                    flags.push(format!("{name}:failed"));
                    (false, None)
                }
                OnOutcome::Continue => (false, None),
            };
        }

        match config.plugin.kind() {
            PluginKind::Validation => {
                if result.valid == Some(false) {
                    let outcome = if config.required { OnOutcome::Reject } else { config.on_invalid };
                    results.insert(name.clone(), result);
                    return match outcome {
                        OnOutcome::Reject => (true, Some(format!("service '{name}' reported invalid input"))),
                        OnOutcome::Flag => {
                            flags.push(format!("{name}:invalid"));
                            (false, None)
                        }
                        OnOutcome::Continue => (false, None),
                    };
                }
            }
            PluginKind::Lookup => {
                if result.found == Some(false) {
                    let outcome = if config.required { OnOutcome::Reject } else { config.on_not_found };
                    results.insert(name.clone(), result);
                    return match outcome {
                        OnOutcome::Reject => (true, Some(format!("service '{name}' found nothing"))),
                        OnOutcome::Flag => {
                            flags.push(format!("{name}:not-found"));
                            (false, None)
                        }
                        OnOutcome::Continue => (false, None),
                    };
                }
                if result.found == Some(true) {
                    if let (Some(mapping), Some(data)) = (&config.field_mapping, &result.data) {
                        for (from, to) in mapping {
                            if let Some(value) = get_path_json(data, from) {
                                set_path(enriched, to, value);
                            }
                        }
                    }
                }
            }
            PluginKind::Custom => {
                if let (Some(predicate), Some(data)) = (&config.result_predicate, &result.data) {
                    if !predicate(data) {
                        let outcome = if config.required { OnOutcome::Reject } else { config.on_failure };
                        results.insert(name.clone(), result);
                        return match outcome {
                            OnOutcome::Reject => (true, Some(format!("service '{name}' rejected its own result"))),
                            OnOutcome::Flag => {
                                flags.push(format!("{name}:failed"));
                                (false, None)
                            }
                            OnOutcome::Continue => (false, None),
                        };
                    }
                }
                if let Some(data) = &result.data {
                    if let Some(adjustment) = data.get("scoreAdjustment").and_then(|v| v.as_f64()) {
                        score_adjustments.push(adjustment);
                    }
                    if let Some(JsonValue::Array(items)) = data.get("flags") {
                        for item in items {
                            if let Some(s) = item.as_str() {
                                flags.push(s.to_string());
                            }
                        }
                    }
                }
            }
        }

        results.insert(name, result);
        (false, None)
    }

    /// Aggregated plugin health overlaid with circuit state (spec §4.10
    /// `getHealthStatus`).
    pub async fn get_health_status(&self) -> Vec<ServiceHealth> {
        let mut out = Vec::new();
        for entry in self.services.iter() {
            let name = entry.key().clone();
            let health = entry.config.plugin.health_check().await;
            let circuit = self.breakers.get_or_create(&name).state();
            let effective = if circuit == CircuitState::Open { HealthState::Unhealthy } else { health };
            out.push(ServiceHealth {
                name,
                health_check: health,
                circuit,
                effective,
            });
        }
        out
    }

    /// All breakers' states (spec §4.10 `getCircuitStatus`).
    pub fn get_circuit_status(&self) -> Vec<(String, CircuitState)> {
        self.breakers.get_all_status()
    }

    /// Disposes every plugin and clears internal state (spec §4.10
    /// `dispose()`).
    pub async fn dispose(&self) {
        for entry in self.services.iter() {
            entry.config.plugin.dispose().await;
        }
        self.services.clear();
        self.breakers.clear();
        self.cache.lock().unwrap().clear();
    }
}

fn matches_phase(point: ExecutionPoint, phase: ExecutionPoint) -> bool {
    match phase {
        ExecutionPoint::PreMatch => point.runs_pre_match(),
        ExecutionPoint::PostMatch => point.runs_post_match(),
        ExecutionPoint::Both => true,
    }
}

fn record_to_json(record: &Record) -> JsonValue {
    serde_json::to_value(Value::Object(record.clone())).unwrap_or(JsonValue::Null)
}

fn get_path_json(data: &JsonValue, path: &str) -> Option<Value> {
    let json_at = path.split('.').try_fold(data, |acc, segment| acc.get(segment))?;
    serde_json::from_value(json_at.clone()).ok()
}
