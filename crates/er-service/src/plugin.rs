//! The plugin contract (spec §4.10, §6): three kinds of service — a
//! uniform `execute` entry point, optional health check and disposal.
//! Grounded on the teacher's `matcher`/`semantic` crates exposing a single
//! async trait object rather than a closure registry (spec REDESIGN FLAGS
//! rejects "dynamic registration of arbitrary functions" in favor of
//! tagged variants over a typed trait).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use er_core::Record;
use serde_json::Value as JsonValue;

use crate::error::ServiceError;

/// The three plugin kinds (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Validation,
    Lookup,
    Custom,
}

/// Where in the pipeline a service runs (spec §4.10 `executionPoint`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPoint {
    PreMatch,
    PostMatch,
    Both,
}

impl ExecutionPoint {
    pub fn runs_pre_match(self) -> bool {
        matches!(self, ExecutionPoint::PreMatch | ExecutionPoint::Both)
    }

    pub fn runs_post_match(self) -> bool {
        matches!(self, ExecutionPoint::PostMatch | ExecutionPoint::Both)
    }
}

/// Per-call context passed to a plugin (spec §4.10 step 3: "current
/// (possibly enriched) record, correlation id, start time, caller tag,
/// optional custom metadata, cancellation token").
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub record: Record,
    pub correlation_id: String,
    pub started_at: DateTime<Utc>,
    pub caller: Option<String>,
    pub metadata: Option<JsonValue>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

/// Timing metadata attached to every plugin outcome (spec §6 "Plugin
/// contract").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl Timing {
    pub fn span(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        }
    }
}

/// What a plugin invocation produced (spec §6: `{success, data?, error?,
/// timing, cached}`). `valid`/`found` are the type-specific fields a
/// validation/lookup plugin fills in; a custom plugin leaves them `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResult {
    pub success: bool,
    pub data: Option<JsonValue>,
    pub error: Option<ServiceError>,
    pub timing: Timing,
    pub cached: bool,
    pub valid: Option<bool>,
    pub found: Option<bool>,
}

impl ServiceResult {
    pub fn ok(data: Option<JsonValue>, timing: Timing) -> Self {
        Self {
            success: true,
            data,
            error: None,
            timing,
            cached: false,
            valid: None,
            found: None,
        }
    }

    pub fn failed(error: ServiceError, timing: Timing) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timing,
            cached: false,
            valid: None,
            found: None,
        }
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = Some(valid);
        self
    }

    pub fn with_found(mut self, found: bool) -> Self {
        self.found = Some(found);
        self
    }
}

/// The health of a single plugin (spec §4.10 `getHealthStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A service plugin: validation, lookup, or arbitrary enrichment logic
/// wrapped uniformly by the executor (spec §4.10 "Each plugin exposes
/// `{name, type, description?, execute, healthCheck?, dispose?}`").
#[async_trait]
pub trait ServicePlugin: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> PluginKind;

    fn description(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, input: &Record, context: &ServiceContext) -> Result<ServiceResult, ServiceError>;

    /// Default health check assumes healthy; override for plugins that can
    /// observe a backing dependency's state.
    async fn health_check(&self) -> HealthState {
        HealthState::Healthy
    }

    /// Release any resources held by the plugin (spec §4.10 `dispose()`).
    async fn dispose(&self) {}
}
