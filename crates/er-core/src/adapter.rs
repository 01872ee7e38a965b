//! Abstract persistence contracts the rest of the workspace is written
//! against (spec §1 "the persistence is defined by an abstract query
//! interface", §6 "Database adapter contract"). No concrete adapter lives
//! here — vendor-specific bindings are explicitly out of scope — but the
//! merge/queue/provenance layers are free to depend on [`Database`] so a
//! caller can plug in a real store without touching this workspace.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{ErrorKind, HasErrorKind};

/// A single filter condition: either an implicit equality against a literal,
/// or an explicit operator (spec §6 `FilterCriteria`).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCriteria {
    Eq(JsonValue),
    Ne(JsonValue),
    Gt(JsonValue),
    Gte(JsonValue),
    Lt(JsonValue),
    Lte(JsonValue),
    In(Vec<JsonValue>),
    Like(String),
}

/// A query filter: field name to the condition it must satisfy.
pub type Filter = BTreeMap<String, FilterCriteria>;

/// Common pagination/projection/ordering knobs (spec §6 `QueryOptions`).
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub limit: usize,
    pub offset: usize,
    pub order_by: Option<String>,
    pub fields: Option<Vec<String>>,
}

impl Default for QueryOptions {
    /// Spec §6: "limit default 1000, offset default 0".
    fn default() -> Self {
        Self {
            limit: 1000,
            offset: 0,
            order_by: None,
            fields: None,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AdapterError {
    #[error("record '{0}' not found")]
    NotFound(String),
    #[error("adapter transaction failed: {0}")]
    TransactionFailed(String),
    #[error("adapter operation failed: {0}")]
    OperationFailed(String),
}

impl HasErrorKind for AdapterError {
    fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::NotFound(_) => ErrorKind::NotFound,
            AdapterError::TransactionFailed(_) | AdapterError::OperationFailed(_) => {
                ErrorKind::Server
            }
        }
    }
}

/// The persistence contract the matching/merge layers consume but never
/// implement beyond an in-memory stub (spec §6 "Database adapter contract",
/// §1 Non-goals: "no vendor-specific database bindings").
///
/// `T` is whatever row shape a concrete adapter stores — this workspace
/// never assumes a particular one, since blocking-key indexing and storage
/// are explicitly upstream concerns.
#[async_trait::async_trait]
pub trait Database<T>: Send + Sync {
    async fn find_by_blocking_keys(
        &self,
        keys: &BTreeMap<String, JsonValue>,
        options: &QueryOptions,
    ) -> Result<Vec<T>, AdapterError>;
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<T>, AdapterError>;
    async fn find_all(&self, options: &QueryOptions) -> Result<Vec<T>, AdapterError>;
    async fn count(&self, filter: Option<&Filter>) -> Result<usize, AdapterError>;
    async fn insert(&self, record: T) -> Result<T, AdapterError>;
    async fn update(&self, id: &str, record: T) -> Result<T, AdapterError>;
    async fn delete(&self, id: &str) -> Result<bool, AdapterError>;
    async fn batch_insert(&self, records: Vec<T>) -> Result<Vec<T>, AdapterError>;
    async fn batch_update(&self, records: Vec<(String, T)>) -> Result<Vec<T>, AdapterError>;
}
