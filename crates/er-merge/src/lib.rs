//! # Entity Resolution Merge Engine (`er-merge`)
//!
//! Combines 2+ source records into a single golden record using
//! per-field strategies, records provenance for every field, and can later
//! undo a merge in full, partial, or split form (spec §4.3-§4.6).

pub mod executor;
pub mod provenance;
pub mod strategies;
pub mod types;
pub mod unmerge;

pub use executor::merge;
pub use provenance::{InMemoryProvenanceStore, ProvenanceStore, QueryOptions, SortOrder};
pub use strategies::StrategyRegistry;
pub use types::{
    CandidateValue, Conflict, ConflictResolution, FieldProvenance, FieldStrategyConfig,
    MergeConfig, MergeError, MergeRequest, MergeResult, MergeStats, NullHandling, Provenance,
    SourceRecord, StrategyOptions,
};
pub use unmerge::{
    can_unmerge, unmerge, InMemorySourceRecordArchive, SourceRecordArchive, UnmergeMode,
    UnmergeRequest, UnmergeResult,
};
