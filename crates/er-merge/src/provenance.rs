//! Provenance storage: where each golden record's fields came from, and the
//! audit trail needed to unmerge it later (spec §4.5).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::types::{FieldProvenance, MergeError, Provenance};

/// Sort order for `mergedAt` in `getBySourceId`/`getMergeTimeline` (spec
/// §4.5 "sort by `mergedAt` (default desc)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// Filters for the provenance queries that scan more than one record.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub source_record_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_unmerged: bool,
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort_order: SortOrder,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            source_record_id: None,
            since: None,
            until: None,
            include_unmerged: false,
            limit: None,
            offset: 0,
            sort_order: SortOrder::default(),
        }
    }
}

/// Storage abstraction for [`Provenance`] records, so the in-memory
/// implementation used in tests and small deployments can be swapped for a
/// durable one without touching the merge/unmerge executors.
pub trait ProvenanceStore: Send + Sync {
    fn save(&self, provenance: Provenance) -> Result<(), MergeError>;
    fn get(&self, golden_record_id: &str) -> Result<Option<Provenance>, MergeError>;
    fn exists(&self, golden_record_id: &str) -> Result<bool, MergeError>;
    fn delete(&self, golden_record_id: &str) -> Result<bool, MergeError>;
    fn count(&self) -> Result<usize, MergeError>;
    fn mark_unmerged(
        &self,
        golden_record_id: &str,
        unmerged_by: Option<String>,
        reason: Option<String>,
    ) -> Result<Provenance, MergeError>;
    fn get_by_source_id(&self, source_record_id: &str, options: &QueryOptions) -> Result<Vec<Provenance>, MergeError>;
    fn get_field_history(&self, golden_record_id: &str, field: &str) -> Result<Option<FieldProvenance>, MergeError>;
    fn get_merge_timeline(&self, options: &QueryOptions) -> Result<Vec<Provenance>, MergeError>;
    fn find_golden_records_by_source(&self, source_record_id: &str) -> Result<Vec<String>, MergeError>;
}

/// Thread-safe in-memory [`ProvenanceStore`], keyed by golden record id.
#[derive(Default)]
pub struct InMemoryProvenanceStore {
    records: DashMap<String, Provenance>,
}

impl InMemoryProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl ProvenanceStore for InMemoryProvenanceStore {
    fn save(&self, provenance: Provenance) -> Result<(), MergeError> {
        self.records.insert(provenance.golden_record_id.clone(), provenance);
        Ok(())
    }

    fn get(&self, golden_record_id: &str) -> Result<Option<Provenance>, MergeError> {
        Ok(self.records.get(golden_record_id).map(|r| r.clone()))
    }

    fn exists(&self, golden_record_id: &str) -> Result<bool, MergeError> {
        Ok(self.records.contains_key(golden_record_id))
    }

    fn delete(&self, golden_record_id: &str) -> Result<bool, MergeError> {
        Ok(self.records.remove(golden_record_id).is_some())
    }

    fn count(&self) -> Result<usize, MergeError> {
        Ok(self.records.len())
    }

    fn mark_unmerged(
        &self,
        golden_record_id: &str,
        unmerged_by: Option<String>,
        reason: Option<String>,
    ) -> Result<Provenance, MergeError> {
        let mut entry = self
            .records
            .get_mut(golden_record_id)
            .ok_or_else(|| MergeError::ProvenanceNotFound(golden_record_id.to_string()))?;
        entry.unmerged = true;
        entry.unmerged_at = Some(Utc::now());
        entry.unmerged_by = unmerged_by;
        entry.unmerge_reason = reason;
        Ok(entry.clone())
    }

    fn get_by_source_id(&self, source_record_id: &str, options: &QueryOptions) -> Result<Vec<Provenance>, MergeError> {
        let mut out: Vec<Provenance> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|p| p.source_record_ids.iter().any(|id| id == source_record_id))
            .filter(|p| options.include_unmerged || !p.is_unmerged())
            .filter(|p| options.since.is_none_or(|since| p.merged_at >= since))
            .filter(|p| options.until.is_none_or(|until| p.merged_at <= until))
            .collect();
        sort_by_merged_at(&mut out, options.sort_order);
        paginate(&mut out, options.offset, options.limit);
        Ok(out)
    }

    fn get_field_history(&self, golden_record_id: &str, field: &str) -> Result<Option<FieldProvenance>, MergeError> {
        Ok(self
            .records
            .get(golden_record_id)
            .and_then(|p| p.field_sources.get(field).cloned()))
    }

    fn get_merge_timeline(&self, options: &QueryOptions) -> Result<Vec<Provenance>, MergeError> {
        let mut out: Vec<Provenance> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|p| {
                options
                    .source_record_id
                    .as_ref()
                    .is_none_or(|id| p.source_record_ids.iter().any(|s| s == id))
            })
            .filter(|p| options.include_unmerged || !p.is_unmerged())
            .filter(|p| options.since.is_none_or(|since| p.merged_at >= since))
            .filter(|p| options.until.is_none_or(|until| p.merged_at <= until))
            .collect();
        sort_by_merged_at(&mut out, options.sort_order);
        paginate(&mut out, options.offset, options.limit);
        Ok(out)
    }

    fn find_golden_records_by_source(&self, source_record_id: &str) -> Result<Vec<String>, MergeError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.source_record_ids.iter().any(|id| id == source_record_id))
            .filter(|entry| !entry.is_unmerged())
            .map(|entry| entry.golden_record_id.clone())
            .collect())
    }
}

fn sort_by_merged_at(records: &mut [Provenance], order: SortOrder) {
    match order {
        SortOrder::Asc => records.sort_by_key(|p| p.merged_at),
        SortOrder::Desc => records.sort_by_key(|p| std::cmp::Reverse(p.merged_at)),
    }
}

/// Applies `offset` (skip before truncate) then `limit`, per spec §4.5
/// `QueryOptions`.
fn paginate(records: &mut Vec<Provenance>, offset: usize, limit: Option<usize>) {
    if offset > 0 {
        if offset >= records.len() {
            records.clear();
        } else {
            records.drain(0..offset);
        }
    }
    if let Some(limit) = limit {
        records.truncate(limit);
    }
}

/// Aggregates each field's most recent contributor across a record's
/// history, for callers that just want "who wrote this field last".
pub fn latest_field_sources(provenance: &Provenance) -> BTreeMap<&str, &str> {
    provenance
        .field_sources
        .iter()
        .map(|(field, fp)| (field.as_str(), fp.source_record_id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldProvenance;
    use std::collections::BTreeMap;

    fn provenance(id: &str, sources: Vec<&str>) -> Provenance {
        Provenance {
            golden_record_id: id.to_string(),
            source_record_ids: sources.into_iter().map(String::from).collect(),
            merged_at: Utc::now(),
            merged_by: None,
            queue_item_id: None,
            field_sources: BTreeMap::new(),
            strategy_used: "preferNonNull".to_string(),
            unmerged: false,
            unmerged_at: None,
            unmerged_by: None,
            unmerge_reason: None,
        }
    }

    #[test]
    fn save_then_get_round_trips() {
        let store = InMemoryProvenanceStore::new();
        store.save(provenance("g1", vec!["a", "b"])).unwrap();
        let fetched = store.get("g1").unwrap().unwrap();
        assert_eq!(fetched.golden_record_id, "g1");
        assert!(store.exists("g1").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn mark_unmerged_sets_audit_fields() {
        let store = InMemoryProvenanceStore::new();
        store.save(provenance("g1", vec!["a", "b"])).unwrap();
        let updated = store
            .mark_unmerged("g1", Some("admin".to_string()), Some("duplicate merge".to_string()))
            .unwrap();
        assert!(updated.is_unmerged());
        assert_eq!(updated.unmerged_by.as_deref(), Some("admin"));
    }

    #[test]
    fn mark_unmerged_missing_record_errors() {
        let store = InMemoryProvenanceStore::new();
        let err = store.mark_unmerged("missing", None, None).unwrap_err();
        assert!(matches!(err, MergeError::ProvenanceNotFound(id) if id == "missing"));
    }

    #[test]
    fn find_golden_records_by_source_matches_any_contributor() {
        let store = InMemoryProvenanceStore::new();
        store.save(provenance("g1", vec!["a", "b"])).unwrap();
        store.save(provenance("g2", vec!["b", "c"])).unwrap();
        let mut found = store.find_golden_records_by_source("b").unwrap();
        found.sort();
        assert_eq!(found, vec!["g1".to_string(), "g2".to_string()]);
    }

    #[test]
    fn find_golden_records_by_source_excludes_unmerged() {
        let store = InMemoryProvenanceStore::new();
        store.save(provenance("g1", vec!["a", "b"])).unwrap();
        store.save(provenance("g2", vec!["b", "c"])).unwrap();
        store.mark_unmerged("g1", None, None).unwrap();
        let found = store.find_golden_records_by_source("b").unwrap();
        assert_eq!(found, vec!["g2".to_string()]);
    }

    #[test]
    fn get_by_source_id_defaults_to_descending_merged_at() {
        let store = InMemoryProvenanceStore::new();
        let mut earlier = provenance("g1", vec!["a"]);
        earlier.merged_at = Utc::now() - chrono::Duration::seconds(60);
        let later = provenance("g2", vec!["a"]);
        store.save(earlier).unwrap();
        store.save(later).unwrap();
        let found = store.get_by_source_id("a", &QueryOptions::default()).unwrap();
        assert_eq!(
            found.iter().map(|p| p.golden_record_id.clone()).collect::<Vec<_>>(),
            vec!["g2".to_string(), "g1".to_string()]
        );
    }

    #[test]
    fn get_by_source_id_offset_skips_before_limit() {
        let store = InMemoryProvenanceStore::new();
        for (i, label) in ["g1", "g2", "g3"].iter().enumerate() {
            let mut p = provenance(label, vec!["a"]);
            p.merged_at = Utc::now() - chrono::Duration::seconds((10 - i as i64) * 60);
            store.save(p).unwrap();
        }
        let options = QueryOptions {
            offset: 1,
            limit: Some(1),
            ..QueryOptions::default()
        };
        let found = store.get_by_source_id("a", &options).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].golden_record_id, "g2");
    }
}
