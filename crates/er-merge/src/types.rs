//! Core data model types for the `er-merge` crate (spec §3, §4.3-§4.6).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use er_core::{ErrorKind, HasErrorKind, Record, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One input record to a merge: its payload plus identity/timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub record: Record,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether null/undefined candidate values are skipped or included when a
/// strategy selects among them (spec §4.3 "Null handling policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NullHandling {
    #[default]
    Skip,
    Include,
}

/// Strategy-specific knobs, shared across all built-in strategies so a
/// single `FieldStrategyConfig` can carry whichever ones its strategy reads.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOptions {
    pub null_handling: NullHandling,
    /// `concatenate` join separator.
    pub separator: String,
    /// `preferNewer`/`preferOlder` date source: a field path inside each
    /// source's payload. When absent, the source's own `updated_at` is used.
    pub date_field: Option<String>,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            null_handling: NullHandling::Skip,
            separator: ", ".to_string(),
            date_field: None,
        }
    }
}

/// How the merge executor resolves a detected conflict (spec §4.4 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    UseDefault,
    MarkConflict,
    Error,
}

/// Per-field strategy override. `longest parent-path match` resolution
/// (spec §4.4 step 2) means a config at `"address"` also governs
/// `"address.city"` unless a more specific config exists for that path.
#[derive(Debug, Clone)]
pub struct FieldStrategyConfig {
    pub path: String,
    pub strategy: String,
    pub options: StrategyOptions,
    /// Required when `strategy == "custom"`.
    pub custom_merge: Option<CustomMergeFn>,
}

/// A user-supplied merge function for the `"custom"` strategy.
pub type CustomMergeFn = std::sync::Arc<
    dyn Fn(&[Option<Value>], &[SourceRecord], &StrategyOptions) -> Option<Value> + Send + Sync,
>;

/// Configuration for one merge operation.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub default_strategy: String,
    pub field_strategies: Vec<FieldStrategyConfig>,
    pub track_provenance: bool,
    pub conflict_resolution: ConflictResolution,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default_strategy: "preferNonNull".to_string(),
            field_strategies: Vec::new(),
            track_provenance: true,
            conflict_resolution: ConflictResolution::UseDefault,
        }
    }
}

impl MergeConfig {
    /// Field strategies must not duplicate paths (spec §3).
    pub fn validate(&self) -> Result<(), MergeError> {
        let mut seen = std::collections::HashSet::new();
        for fs in &self.field_strategies {
            if !seen.insert(fs.path.as_str()) {
                return Err(MergeError::Validation(format!(
                    "duplicate field strategy for path '{}'",
                    fs.path
                )));
            }
        }
        Ok(())
    }

    /// Resolve the strategy config to use for `path`: explicit config for
    /// the exact path, else the strategy of the longest configured parent
    /// path, else the default strategy (spec §4.4 step 2).
    pub fn resolve_strategy_for(&self, path: &str) -> (&str, StrategyOptions, Option<CustomMergeFn>) {
        if let Some(exact) = self.field_strategies.iter().find(|fs| fs.path == path) {
            return (
                exact.strategy.as_str(),
                exact.options.clone(),
                exact.custom_merge.clone(),
            );
        }
        let mut best: Option<&FieldStrategyConfig> = None;
        for fs in &self.field_strategies {
            let is_parent = path.starts_with(&fs.path) && path[fs.path.len()..].starts_with('.');
            if is_parent {
                if best.is_none_or(|b| fs.path.len() > b.path.len()) {
                    best = Some(fs);
                }
            }
        }
        match best {
            Some(fs) => (fs.strategy.as_str(), fs.options.clone(), fs.custom_merge.clone()),
            None => (
                self.default_strategy.as_str(),
                StrategyOptions::default(),
                None,
            ),
        }
    }
}

/// A conflict recorded during merge (spec §3, §4.4 step 5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub field: String,
    pub values: Vec<Value>,
    /// `"auto"` (useDefault), `"deferred"` (markConflict).
    pub resolution: String,
    pub resolved_value: Option<Value>,
    pub note: String,
}

/// Provenance for a single field of one golden record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldProvenance {
    pub source_record_id: String,
    pub strategy: String,
    pub candidate_values: Vec<CandidateValue>,
    pub had_conflict: bool,
    pub resolution_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateValue {
    pub record_id: String,
    pub value: Value,
}

/// Whole-record merge provenance (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provenance {
    pub golden_record_id: String,
    pub source_record_ids: Vec<String>,
    pub merged_at: DateTime<Utc>,
    pub merged_by: Option<String>,
    pub queue_item_id: Option<String>,
    pub field_sources: BTreeMap<String, FieldProvenance>,
    pub strategy_used: String,
    pub unmerged: bool,
    pub unmerged_at: Option<DateTime<Utc>>,
    pub unmerged_by: Option<String>,
    pub unmerge_reason: Option<String>,
}

impl Provenance {
    /// Backwards-compat rule from spec §6: presence of `unmerged_at`
    /// without `unmerged == true` must still be treated as unmerged.
    pub fn is_unmerged(&self) -> bool {
        self.unmerged || self.unmerged_at.is_some()
    }
}

/// Per-source contribution counts (spec §4.4 "Output... stats").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MergeStats {
    pub total_fields: usize,
    pub fields_with_conflicts: usize,
    pub contributions_by_source: BTreeMap<String, usize>,
}

/// Input to [`crate::executor::merge`].
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub source_records: Vec<SourceRecord>,
    pub target_record_id: Option<String>,
    pub config: MergeConfig,
    pub merged_by: Option<String>,
    pub queue_item_id: Option<String>,
    /// Optional declared schema: field paths that must be considered even
    /// if no source happens to populate them.
    pub schema: Option<Vec<String>>,
}

/// Output of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub golden_record: Record,
    pub golden_record_id: String,
    pub provenance: Provenance,
    pub source_records: Vec<SourceRecord>,
    pub conflicts: Vec<Conflict>,
    pub stats: MergeStats,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MergeError {
    #[error("at least 2 source records are required for a merge, got {0}")]
    InsufficientSourceRecords(usize),
    #[error("unknown merge strategy '{name}'; available: {available:?}")]
    InvalidStrategy { name: String, available: Vec<String> },
    #[error("field '{path}' uses the custom strategy but no custom_merge function was supplied")]
    CustomStrategyMissing { path: String },
    #[error("unresolved conflict on field '{path}': values {values:?}")]
    MergeConflict { path: String, values: Vec<Value> },
    #[error("field '{path}' has incompatible shapes across sources (scalar vs. object)")]
    FieldShapeMismatch { path: String },
    #[error("no provenance found for golden record '{0}'")]
    ProvenanceNotFound(String),
    #[error("source record '{0}' not found in the archive")]
    SourceRecordNotFound(String),
    #[error("unmerge precondition failed: {0}")]
    Unmerge(String),
    #[error("invalid merge configuration: {0}")]
    Validation(String),
}

impl HasErrorKind for MergeError {
    fn kind(&self) -> ErrorKind {
        match self {
            MergeError::InsufficientSourceRecords(_)
            | MergeError::InvalidStrategy { .. }
            | MergeError::CustomStrategyMissing { .. }
            | MergeError::FieldShapeMismatch { .. }
            | MergeError::Validation(_) => ErrorKind::Validation,
            MergeError::MergeConflict { .. } => ErrorKind::Rejected,
            MergeError::ProvenanceNotFound(_) | MergeError::SourceRecordNotFound(_) => {
                ErrorKind::NotFound
            }
            MergeError::Unmerge(_) => ErrorKind::Validation,
        }
    }
}
