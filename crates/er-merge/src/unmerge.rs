//! Reversing a merge: restoring the original source records and, for
//! partial/split modes, re-deriving golden records from what remains
//! (spec §4.6).

use std::sync::Arc;

use dashmap::DashMap;

use crate::executor::merge;
use crate::provenance::ProvenanceStore;
use crate::strategies::StrategyRegistry;
use crate::types::{MergeConfig, MergeError, MergeRequest, MergeResult, Provenance, SourceRecord};

/// Durable lookup of the exact source records a merge consumed, so an
/// unmerge can restore them byte-for-byte rather than reconstructing them
/// from the golden record (which would be lossy).
pub trait SourceRecordArchive: Send + Sync {
    fn save(&self, record: SourceRecord) -> Result<(), MergeError>;
    fn get(&self, id: &str) -> Result<Option<SourceRecord>, MergeError>;
    fn delete(&self, id: &str) -> Result<bool, MergeError>;
}

#[derive(Default)]
pub struct InMemorySourceRecordArchive {
    records: DashMap<String, SourceRecord>,
}

impl InMemorySourceRecordArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl SourceRecordArchive for InMemorySourceRecordArchive {
    fn save(&self, record: SourceRecord) -> Result<(), MergeError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SourceRecord>, MergeError> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    fn delete(&self, id: &str) -> Result<bool, MergeError> {
        Ok(self.records.remove(id).is_some())
    }
}

/// How much of a merge to undo.
#[derive(Debug, Clone)]
pub enum UnmergeMode {
    /// Dissolve the golden record entirely, restoring every source.
    Full,
    /// Remove only the listed sources; the rest are re-merged into a new
    /// golden record. At least 2 sources must remain.
    Partial { exclude_source_ids: Vec<String> },
    /// Partition the original sources into two disjoint groups, each
    /// re-merged into its own golden record.
    Split {
        group_a: Vec<String>,
        group_b: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct UnmergeRequest {
    pub golden_record_id: String,
    pub mode: UnmergeMode,
    pub unmerged_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnmergeResult {
    pub restored_source_records: Vec<SourceRecord>,
    /// Populated for `Partial`/`Split`, `None` for `Full`.
    pub derived_merges: Vec<MergeResult>,
    pub original_provenance: Provenance,
    /// Set when the original golden record was deleted outright (spec §4.6
    /// step 4: `Full` mode dissolves the golden record entirely, so there is
    /// no successor for callers to keep using).
    pub golden_record_deleted: bool,
}

/// Whether `golden_record_id` is in a state that can be unmerged: it must
/// have provenance on record and must not already be unmerged.
pub fn can_unmerge(golden_record_id: &str, store: &dyn ProvenanceStore) -> Result<bool, MergeError> {
    match store.get(golden_record_id)? {
        Some(p) => Ok(!p.is_unmerged()),
        None => Ok(false),
    }
}

pub fn unmerge(
    request: &UnmergeRequest,
    store: &dyn ProvenanceStore,
    archive: &dyn SourceRecordArchive,
    registry: &StrategyRegistry,
) -> Result<UnmergeResult, MergeError> {
    let provenance = store
        .get(&request.golden_record_id)?
        .ok_or_else(|| MergeError::ProvenanceNotFound(request.golden_record_id.clone()))?;

    if provenance.is_unmerged() {
        return Err(MergeError::Unmerge(format!(
            "golden record '{}' was already unmerged",
            request.golden_record_id
        )));
    }

    let all_sources: Result<Vec<SourceRecord>, MergeError> = provenance
        .source_record_ids
        .iter()
        .map(|id| {
            archive
                .get(id)?
                .ok_or_else(|| MergeError::SourceRecordNotFound(id.clone()))
        })
        .collect();
    let all_sources = all_sources?;

    // The ids actually being restored (spec §4.6 step 2-3): in `Full` mode
    // every source leaves the archive; in `Partial` only the excluded ones
    // do, since the rest continue to live on behind a newly derived golden
    // record. `Split` never frees an id — both halves keep their sources
    // archived under their own new golden record.
    let restored_ids: Vec<String>;
    let derived_merges = match &request.mode {
        UnmergeMode::Full => {
            restored_ids = all_sources.iter().map(|s| s.id.clone()).collect();
            Vec::new()
        }
        UnmergeMode::Partial { exclude_source_ids } => {
            let remaining: Vec<SourceRecord> = all_sources
                .iter()
                .filter(|s| !exclude_source_ids.contains(&s.id))
                .cloned()
                .collect();
            if remaining.len() < 2 {
                return Err(MergeError::Unmerge(format!(
                    "partial unmerge of '{}' would leave fewer than 2 source records",
                    request.golden_record_id
                )));
            }
            restored_ids = exclude_source_ids.clone();
            vec![remerge(remaining, &provenance, registry)?]
        }
        UnmergeMode::Split { group_a, group_b } => {
            validate_split(&all_sources, group_a, group_b)?;
            let a = group_by_ids(&all_sources, group_a);
            let b = group_by_ids(&all_sources, group_b);
            restored_ids = Vec::new();
            vec![
                remerge_or_passthrough(a, &provenance, registry)?,
                remerge_or_passthrough(b, &provenance, registry)?,
            ]
        }
    };

    for result in &derived_merges {
        store.save(result.provenance.clone())?;
    }

    for id in &restored_ids {
        archive.delete(id)?;
    }

    let updated_provenance = store.mark_unmerged(
        &request.golden_record_id,
        request.unmerged_by.clone(),
        request.reason.clone(),
    )?;

    let restored_source_records = all_sources
        .iter()
        .filter(|s| restored_ids.contains(&s.id))
        .cloned()
        .collect();

    let golden_record_deleted = matches!(request.mode, UnmergeMode::Full);

    Ok(UnmergeResult {
        restored_source_records,
        derived_merges,
        original_provenance: updated_provenance,
        golden_record_deleted,
    })
}

fn validate_split(
    all_sources: &[SourceRecord],
    group_a: &[String],
    group_b: &[String],
) -> Result<(), MergeError> {
    if group_a.is_empty() || group_b.is_empty() {
        return Err(MergeError::Unmerge(
            "split unmerge requires both groups to be non-empty".to_string(),
        ));
    }
    let mut combined: Vec<&String> = group_a.iter().chain(group_b.iter()).collect();
    combined.sort();
    let mut all_ids: Vec<&String> = all_sources.iter().map(|s| &s.id).collect();
    all_ids.sort();
    if combined != all_ids {
        return Err(MergeError::Unmerge(
            "split unmerge groups must exactly partition the original source records".to_string(),
        ));
    }
    Ok(())
}

fn group_by_ids(all_sources: &[SourceRecord], ids: &[String]) -> Vec<SourceRecord> {
    all_sources
        .iter()
        .filter(|s| ids.contains(&s.id))
        .cloned()
        .collect()
}

fn remerge(
    sources: Vec<SourceRecord>,
    original: &Provenance,
    registry: &StrategyRegistry,
) -> Result<MergeResult, MergeError> {
    let mut config = MergeConfig::default();
    config.default_strategy = original.strategy_used.clone();
    let request = MergeRequest {
        source_records: sources,
        target_record_id: None,
        config,
        merged_by: original.merged_by.clone(),
        queue_item_id: None,
        schema: None,
    };
    merge(&request, registry)
}

/// A single-record group has nothing to merge; its golden record is just
/// that source's payload, with trivial single-source provenance.
fn remerge_or_passthrough(
    sources: Vec<SourceRecord>,
    original: &Provenance,
    registry: &StrategyRegistry,
) -> Result<MergeResult, MergeError> {
    if sources.len() == 1 {
        let only = sources.into_iter().next().expect("length checked above");
        let golden_record_id = only.id.clone();
        let provenance = Provenance {
            golden_record_id: golden_record_id.clone(),
            source_record_ids: vec![only.id.clone()],
            merged_at: chrono::Utc::now(),
            merged_by: original.merged_by.clone(),
            queue_item_id: None,
            field_sources: Default::default(),
            strategy_used: original.strategy_used.clone(),
            unmerged: false,
            unmerged_at: None,
            unmerged_by: None,
            unmerge_reason: None,
        };
        Ok(MergeResult {
            golden_record: only.record.clone(),
            golden_record_id,
            provenance,
            source_records: vec![only],
            conflicts: Vec::new(),
            stats: Default::default(),
        })
    } else {
        remerge(sources, original, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::merge as run_merge;
    use crate::provenance::InMemoryProvenanceStore;
    use chrono::{TimeZone, Utc};
    use er_core::Value;

    fn source(id: &str, fields: Vec<(&str, Value)>) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            record: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    fn setup() -> (InMemoryProvenanceStore, InMemorySourceRecordArchive, StrategyRegistry, String) {
        let store = InMemoryProvenanceStore::new();
        let archive = InMemorySourceRecordArchive::new();
        let registry = StrategyRegistry::new();

        let a = source("a", vec![("name", Value::String("Ada".into()))]);
        let b = source("b", vec![("name", Value::String("Ada Lovelace".into()))]);
        archive.save(a.clone()).unwrap();
        archive.save(b.clone()).unwrap();

        let request = MergeRequest {
            source_records: vec![a, b],
            target_record_id: Some("golden-1".to_string()),
            config: MergeConfig::default(),
            merged_by: None,
            queue_item_id: None,
            schema: None,
        };
        let result = run_merge(&request, &registry).unwrap();
        store.save(result.provenance).unwrap();

        (store, archive, registry, "golden-1".to_string())
    }

    #[test]
    fn full_unmerge_restores_both_sources_and_marks_provenance() {
        let (store, archive, registry, golden_id) = setup();
        assert!(can_unmerge(&golden_id, &store).unwrap());

        let request = UnmergeRequest {
            golden_record_id: golden_id.clone(),
            mode: UnmergeMode::Full,
            unmerged_by: Some("reviewer".to_string()),
            reason: Some("false positive match".to_string()),
        };
        let result = unmerge(&request, &store, &archive, &registry).unwrap();
        assert_eq!(result.restored_source_records.len(), 2);
        assert!(result.derived_merges.is_empty());
        assert!(result.original_provenance.is_unmerged());
        assert!(result.golden_record_deleted);
        assert!(!can_unmerge(&golden_id, &store).unwrap());
    }

    #[test]
    fn unmerging_twice_fails() {
        let (store, archive, registry, golden_id) = setup();
        let request = UnmergeRequest {
            golden_record_id: golden_id.clone(),
            mode: UnmergeMode::Full,
            unmerged_by: None,
            reason: None,
        };
        unmerge(&request, &store, &archive, &registry).unwrap();
        let err = unmerge(&request, &store, &archive, &registry).unwrap_err();
        assert!(matches!(err, MergeError::Unmerge(_)));
    }

    #[test]
    fn split_unmerge_requires_a_full_partition() {
        let (store, archive, registry, golden_id) = setup();
        let request = UnmergeRequest {
            golden_record_id: golden_id,
            mode: UnmergeMode::Split {
                group_a: vec!["a".to_string()],
                group_b: vec!["a".to_string()],
            },
            unmerged_by: None,
            reason: None,
        };
        let err = unmerge(&request, &store, &archive, &registry).unwrap_err();
        assert!(matches!(err, MergeError::Unmerge(_)));
    }
}
