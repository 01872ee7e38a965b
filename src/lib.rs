//! # Entity Resolution & Golden Record Toolkit
//!
//! This crate wires together the matching engine, merge engine, review
//! queue, cache, resilience primitives, and service executor developed in
//! the workspace's `er-*` crates into a single dependency, mirroring how
//! `ucfp` re-exports its `ingest`/`canonical`/`perceptual`/`semantic`
//! layers behind one umbrella crate.
//!
//! ## Quick start
//!
//! The individual crates are usable standalone (`er_matching::compare`,
//! `er_merge::merge`, ...); [`Pipeline`] additionally threads the spec §2
//! control flow end to end: pre-match services enrich a candidate record,
//! the matching engine scores it against a set of potential matches, and
//! post-match services run over the result before a human confirmation
//! triggers [`er_merge::merge`].
//!
//! ```ignore
//! use entity_resolution::{Pipeline, PipelineError};
//!
//! # async fn demo(pipeline: &Pipeline) -> Result<(), PipelineError> {
//! let candidate = Default::default();
//! let potential_matches = vec![];
//! let outcome = pipeline.evaluate(candidate, potential_matches, None).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Failures produced by any layer converge on [`PipelineError`], which wraps
//! the source crate's own error type without flattening it into strings,
//! following the same pattern as `ucfp::PipelineError`.

pub use er_cache::{
    Cache, CacheConfig, CacheStats, EvictionCallback, EvictionReason, GetOptions, GetOutcome,
    SetOptions, SharedCache,
};
pub use er_comparators::{
    compare_with, ComparatorError, ComparatorKind, ComparatorOptions, ExactOptions,
    JaroWinklerOptions, LevenshteinOptions, MetaphoneOptions, SoundexOptions,
};
pub use er_core::{
    deep_equal, fnv1a_hex, get_path, path_segments, set_path, stable_stringify, walk_paths,
    AdapterError, Database, ErrorKind, Filter, FilterCriteria, HasErrorKind, Record,
    QueryOptions as DatabaseQueryOptions, Value,
};
pub use er_matching::{
    classify, compare, sort_candidates, FieldMatchConfig, FieldScore, MatchClassification,
    MatchingConfig, MatchingError, PairSide, RecordPair, ScoreBreakdown,
};
pub use er_merge::{
    can_unmerge, merge, unmerge, CandidateValue, Conflict, ConflictResolution, FieldProvenance,
    FieldStrategyConfig, InMemoryProvenanceStore, InMemorySourceRecordArchive, MergeConfig,
    MergeError, MergeRequest, MergeResult, MergeStats, NullHandling, Provenance, ProvenanceStore,
    QueryOptions as ProvenanceQueryOptions, SortOrder as ProvenanceSortOrder, SourceRecord,
    SourceRecordArchive, StrategyOptions, StrategyRegistry, UnmergeMode, UnmergeRequest,
    UnmergeResult,
};
pub use er_queue::{
    aging_report, compute_stats, cutoff, is_legal_transition, priority_report,
    reviewer_accuracy_report, AgingBucket, Decision, DecisionAction, InMemoryQueueStore,
    ListOptions, OrderBy, OrderDirection, PotentialMatch, QueueError, QueueFilter, QueueItem,
    QueueStats, QueueStatus, QueueStore, ReviewerAccuracy,
};
pub use er_resilience::{
    with_resilience, with_resilience_for_service, AttemptRecord, CircuitBreaker,
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, ResilienceConfig, ResilienceError,
    RetryConfig, RetryOn, RetryOutcome, TimeoutConfig,
};
pub use er_service::{
    ExecutionMode, ExecutionPoint, HealthState, OnOutcome, PipelineResult as ServicePipelineResult,
    PluginKind, RegistryDefaults, ServiceCacheConfig, ServiceConfig, ServiceContext, ServiceError,
    ServiceExecutor, ServiceHealth, ServicePlugin, ServiceResult, Timing,
};

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

/// Errors that can surface while driving a full pre-match -> classify ->
/// post-match cycle through [`Pipeline::evaluate`] (spec §2 "Control
/// flow"). Each variant wraps the originating crate's own error type rather
/// than flattening it, mirroring `ucfp::PipelineError`'s
/// `Ingest(IngestError)` / `Canonical(CanonicalError)` shape.
#[derive(Debug, Clone)]
pub enum PipelineError {
    Matching(MatchingError),
    Merge(MergeError),
    Queue(QueueError),
    /// A required pre-match or post-match service rejected the record.
    ServiceRejected { service: String, reason: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Matching(err) => write!(f, "matching failure: {err}"),
            PipelineError::Merge(err) => write!(f, "merge failure: {err}"),
            PipelineError::Queue(err) => write!(f, "queue failure: {err}"),
            PipelineError::ServiceRejected { service, reason } => {
                write!(f, "service '{service}' rejected the record: {reason}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<MatchingError> for PipelineError {
    fn from(value: MatchingError) -> Self {
        PipelineError::Matching(value)
    }
}

impl From<MergeError> for PipelineError {
    fn from(value: MergeError) -> Self {
        PipelineError::Merge(value)
    }
}

impl From<QueueError> for PipelineError {
    fn from(value: QueueError) -> Self {
        PipelineError::Queue(value)
    }
}

/// One scored candidate from [`Pipeline::evaluate`]: the potential match's
/// id, its [`ScoreBreakdown`], and the resulting [`MatchClassification`].
#[derive(Debug, Clone)]
pub struct EvaluatedCandidate {
    pub candidate_id: String,
    pub score: ScoreBreakdown,
    pub classification: MatchClassification,
}

/// The outcome of [`Pipeline::evaluate`]: the enriched record, every scored
/// candidate (sorted per spec §4.2's tie-break policy), and the id of any
/// queue item created for a possible match.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub enriched_record: Record,
    pub candidates: Vec<EvaluatedCandidate>,
    pub queued_item_id: Option<String>,
    pub pre_match: ServicePipelineResult,
    pub post_match: ServicePipelineResult,
}

/// Wires the service executor, matching engine, and review queue into the
/// spec §2 control flow: "the service executor runs pre-match services on
/// an input record, invokes the matching engine against candidate pairs,
/// then runs post-match services." Confirming a queued match and running
/// the merge executor is a separate, explicit step ([`Pipeline::confirm_and_merge`])
/// since it requires a human decision per spec §4.7.
pub struct Pipeline {
    pub services: Arc<ServiceExecutor>,
    pub matching_config: MatchingConfig,
    pub queue: Arc<dyn QueueStore>,
    pub provenance: Arc<dyn ProvenanceStore>,
    pub archive: Arc<dyn SourceRecordArchive>,
    pub strategies: StrategyRegistry,
}

impl Pipeline {
    pub fn new(
        services: Arc<ServiceExecutor>,
        matching_config: MatchingConfig,
        queue: Arc<dyn QueueStore>,
        provenance: Arc<dyn ProvenanceStore>,
        archive: Arc<dyn SourceRecordArchive>,
    ) -> Self {
        Self {
            services,
            matching_config,
            queue,
            provenance,
            archive,
            strategies: StrategyRegistry::new(),
        }
    }

    /// Run pre-match services over `candidate`, score the enriched record
    /// against every entry in `potential_matches`, run post-match services
    /// over the top-scoring outcome, and queue a review item for any
    /// `PossibleMatch` (spec §2, §4.2, §4.7).
    pub async fn evaluate(
        &self,
        candidate_id: impl Into<String>,
        candidate: Record,
        potential_matches: Vec<PairSide>,
        correlation_id: Option<String>,
    ) -> Result<EvaluationOutcome, PipelineError> {
        let candidate_id = candidate_id.into();
        let pre_match = self
            .services
            .execute_pre_match(
                candidate,
                correlation_id.clone(),
                None,
                ExecutionMode::Sequential,
                None,
            )
            .await;

        if !pre_match.proceed {
            return Err(PipelineError::ServiceRejected {
                service: pre_match.rejected_by.clone().unwrap_or_default(),
                reason: pre_match.rejection_reason.clone().unwrap_or_default(),
            });
        }

        let left = PairSide {
            id: candidate_id.clone(),
            source: None,
            record: pre_match.enriched_record.clone(),
        };

        let mut candidates = Vec::with_capacity(potential_matches.len());
        for right in &potential_matches {
            let pair = RecordPair {
                left: left.clone(),
                right: right.clone(),
            };
            let score = compare(&pair, &self.matching_config)?;
            let classification = classify(score.total, &self.matching_config);
            candidates.push(EvaluatedCandidate {
                candidate_id: right.id.clone(),
                score,
                classification,
            });
        }
        candidates.sort_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });

        let match_result_json: JsonValue = serde_json::json!({
            "candidateId": candidate_id,
            "topCandidates": candidates
                .iter()
                .map(|c| serde_json::json!({"id": c.candidate_id, "total": c.score.total}))
                .collect::<Vec<_>>(),
        });
        let post_match = self
            .services
            .execute_post_match(
                pre_match.enriched_record.clone(),
                match_result_json,
                correlation_id,
                None,
                ExecutionMode::Sequential,
                None,
            )
            .await;

        if !post_match.proceed {
            return Err(PipelineError::ServiceRejected {
                service: post_match.rejected_by.clone().unwrap_or_default(),
                reason: post_match.rejection_reason.clone().unwrap_or_default(),
            });
        }

        let queued_item_id = if candidates
            .iter()
            .any(|c| c.classification == MatchClassification::PossibleMatch)
        {
            let now = chrono::Utc::now();
            let id = format!("queue-{candidate_id}");
            let potential = candidates
                .iter()
                .map(|c| PotentialMatch {
                    record_id: c.candidate_id.clone(),
                    score: Some(c.score.total),
                    summary: None,
                })
                .collect();
            let item = self.queue.add_batch(vec![QueueItem {
                potential_matches: potential,
                ..QueueItem::new(id.clone(), post_match.enriched_record.clone(), now)
            }])?;
            item.first().map(|i| i.id.clone())
        } else {
            None
        };

        Ok(EvaluationOutcome {
            enriched_record: post_match.enriched_record.clone(),
            candidates,
            queued_item_id,
            pre_match,
            post_match,
        })
    }

    /// After a human confirms a queued match (spec §4.7 `confirm`), run the
    /// merge executor over the chosen source records and persist provenance
    /// (spec §2 "On a human confirmation, the merge executor reconciles
    /// source records into a golden record via strategies, recording
    /// provenance").
    pub fn confirm_and_merge(&self, request: &MergeRequest) -> Result<MergeResult, PipelineError> {
        let result = merge(request, &self.strategies)?;
        if request.config.track_provenance {
            self.provenance.save(result.provenance.clone())?;
        }
        for source in &result.source_records {
            self.archive.save(source.clone())?;
        }
        Ok(result)
    }
}
