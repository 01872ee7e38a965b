//! # Entity Resolution Matching Engine (`er-matching`)
//!
//! Aggregates per-field comparator results into a weighted score for a
//! [`RecordPair`], then classifies the pair as `NoMatch`, `PossibleMatch`,
//! or `DefiniteMatch` against configured thresholds (spec §4.2).

pub mod engine;
pub mod types;

pub use engine::{classify, compare, sort_candidates};
pub use types::{
    FieldMatchConfig, FieldScore, MatchClassification, MatchingConfig, MatchingError, PairSide,
    RecordPair, ScoreBreakdown,
};
