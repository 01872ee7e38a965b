//! Core data model types for the `er-matching` crate (spec §3, §4.2).

use er_core::{Record, Value};
use er_comparators::{ComparatorKind, ComparatorOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One side of a [`RecordPair`]: the record plus per-side metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSide {
    pub id: String,
    pub source: Option<String>,
    pub record: Record,
}

/// Two records being compared by the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPair {
    pub left: PairSide,
    pub right: PairSide,
}

/// Configuration for one field path: which comparator to run, how much it
/// weighs in the total score, and strategy-specific knobs.
#[derive(Debug, Clone)]
pub struct FieldMatchConfig {
    pub path: String,
    pub comparator: ComparatorKind,
    /// Must be positive; the matching engine does not enforce this itself
    /// (callers validate via [`MatchingConfig::validate`]) so field configs
    /// remain cheap to construct in isolation.
    pub weight: f64,
    /// A similarity threshold in `[0, 1]`: below it, the field's
    /// contribution is forced to zero (a veto, not a scale-down).
    pub threshold: Option<f64>,
    pub options: ComparatorOptions,
}

impl FieldMatchConfig {
    pub fn new(path: impl Into<String>, comparator: ComparatorKind, weight: f64) -> Self {
        Self {
            path: path.into(),
            comparator,
            weight,
            threshold: None,
            options: ComparatorOptions::default_for(comparator),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_options(mut self, options: ComparatorOptions) -> Self {
        self.options = options;
        self
    }
}

/// Classification thresholds plus the ordered set of field configs that
/// make up a matching config (spec §3 "Ordered mapping from field path ->
/// field match config").
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub fields: Vec<FieldMatchConfig>,
    /// Below this raw `total`, a pair is classified `NoMatch`.
    pub no_match_threshold: f64,
    /// Above this raw `total`, a pair is classified `DefiniteMatch`.
    pub definite_match_threshold: f64,
}

impl MatchingConfig {
    pub fn new(fields: Vec<FieldMatchConfig>, no_match: f64, definite_match: f64) -> Self {
        Self {
            fields,
            no_match_threshold: no_match,
            definite_match_threshold: definite_match,
        }
    }

    /// Validate `no_match_threshold < definite_match_threshold` and that
    /// every configured weight is positive (spec §3).
    pub fn validate(&self) -> Result<(), MatchingError> {
        if self.no_match_threshold >= self.definite_match_threshold {
            return Err(MatchingError::InvalidConfig(format!(
                "noMatch threshold ({}) must be less than definiteMatch threshold ({})",
                self.no_match_threshold, self.definite_match_threshold
            )));
        }
        for field in &self.fields {
            if field.weight <= 0.0 {
                return Err(MatchingError::InvalidConfig(format!(
                    "field '{}' has non-positive weight {}",
                    field.path, field.weight
                )));
            }
            if let Some(t) = field.threshold {
                if !(0.0..=1.0).contains(&t) {
                    return Err(MatchingError::InvalidConfig(format!(
                        "field '{}' threshold {} is outside [0, 1]",
                        field.path, t
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Per-field contribution to a pair's score (spec §3 "Score breakdown").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldScore {
    pub field: String,
    pub strategy: String,
    pub left_value: Option<Value>,
    pub right_value: Option<Value>,
    pub similarity: f64,
    pub weight: f64,
    pub weighted_score: f64,
}

/// Full score breakdown for one pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub fields: Vec<FieldScore>,
    pub total: f64,
    pub normalized_total: f64,
}

/// Classification of a pair's total score against a [`MatchingConfig`]'s
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClassification {
    NoMatch,
    PossibleMatch,
    DefiniteMatch,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MatchingError {
    #[error("invalid matching config: {0}")]
    InvalidConfig(String),
    #[error("unknown comparator strategy: {0}")]
    InvalidStrategy(String),
}

impl er_core::HasErrorKind for MatchingError {
    fn kind(&self) -> er_core::ErrorKind {
        match self {
            MatchingError::InvalidConfig(_) | MatchingError::InvalidStrategy(_) => {
                er_core::ErrorKind::Validation
            }
        }
    }
}
