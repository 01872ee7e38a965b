//! # Entity Resolution Review Queue (`er-queue`)
//!
//! The human-review queue: a state machine for match candidates awaiting
//! adjudication, plus the metrics a review dashboard needs (spec §4.7).
//! Storage is behind the [`QueueStore`] trait so a persistent adapter can
//! replace [`InMemoryQueueStore`] without touching callers.

pub mod metrics;
pub mod state_machine;
pub mod store;
pub mod types;

pub use metrics::{aging_report, compute_stats, priority_report, reviewer_accuracy_report, AgingBucket, QueueStats, ReviewerAccuracy};
pub use state_machine::is_legal_transition;
pub use store::{cutoff, InMemoryQueueStore, QueueStore};
pub use types::{
    Decision, DecisionAction, ListOptions, OrderBy, OrderDirection, PotentialMatch, QueueError,
    QueueFilter, QueueItem, QueueStatus,
};
