//! # Entity Resolution Service Executor (`er-service`)
//!
//! A pluggable pipeline of validation/lookup/custom plugins that runs
//! before and after the matching engine, wrapped in cache-aside plus the
//! `er-resilience` primitives (spec §4.10).
//!
//! [`ServiceExecutor`] owns the plugin registry, the per-service circuit
//! breakers, and a shared result cache; callers drive it with
//! [`ServiceExecutor::execute_pre_match`] / [`ServiceExecutor::execute_post_match`].

pub mod config;
pub mod error;
pub mod executor;
pub mod plugin;

pub use config::{OnOutcome, RegistryDefaults, ResultPredicate, ServiceCacheConfig, ServiceConfig};
pub use error::{from_resilience_error, ServiceError};
pub use executor::{ExecutionMode, PipelineResult, ServiceExecutor, ServiceHealth};
pub use plugin::{
    ExecutionPoint, HealthState, PluginKind, ServiceContext, ServicePlugin, ServiceResult, Timing,
};
