//! The `merge` operation: combines 2+ source records into one golden
//! record, field by field, recording provenance and conflicts along the
//! way (spec §4.4).

use std::collections::{BTreeMap, BTreeSet};

use er_core::{get_path, set_path, Value};
use tracing::{debug, warn};

use crate::strategies::StrategyRegistry;
use crate::types::{
    CandidateValue, Conflict, ConflictResolution, FieldProvenance, MergeConfig, MergeError,
    MergeRequest, MergeResult, MergeStats, Provenance, SourceRecord,
};

/// Merge `request.source_records` into one golden record per
/// `request.config`.
///
/// # Preconditions
/// - At least 2 source records (spec §4.4 step 1).
/// - `request.config.validate()` passes (no duplicate field strategy paths).
pub fn merge(request: &MergeRequest, registry: &StrategyRegistry) -> Result<MergeResult, MergeError> {
    if request.source_records.len() < 2 {
        return Err(MergeError::InsufficientSourceRecords(
            request.source_records.len(),
        ));
    }
    request.config.validate()?;

    let paths = collect_field_paths(&request.source_records, request.schema.as_deref());
    check_shape_consistency(&request.source_records, &paths)?;

    let golden_record_id = request.target_record_id.clone().unwrap_or_else(|| {
        request
            .source_records
            .first()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    });

    let mut golden_record = er_core::Record::new();
    let mut field_sources = BTreeMap::new();
    let mut conflicts = Vec::new();
    let mut stats = MergeStats::default();

    for path in &paths {
        let values: Vec<Option<Value>> = request
            .source_records
            .iter()
            .map(|s| get_path(&s.record, path).cloned())
            .collect();

        let (strategy_name, options, custom) = request.config.resolve_strategy_for(path);
        let strategy_name = strategy_name.to_string();

        let resolved = if strategy_name == "custom" {
            let custom_fn = custom.ok_or_else(|| MergeError::CustomStrategyMissing {
                path: path.clone(),
            })?;
            custom_fn(&values, &request.source_records, &options)
        } else {
            let strategy = registry.lookup(&strategy_name)?;
            strategy(&values, &request.source_records, &options)
        };

        let distinct_non_null: Vec<&Value> = {
            let mut seen: Vec<&Value> = Vec::new();
            for v in values.iter().flatten() {
                if v.is_null() {
                    continue;
                }
                if !seen.iter().any(|existing| *existing == v) {
                    seen.push(v);
                }
            }
            seen
        };
        let had_conflict = distinct_non_null.len() > 1;

        let candidate_values: Vec<CandidateValue> = request
            .source_records
            .iter()
            .zip(values.iter())
            .filter_map(|(source, value)| {
                value.clone().map(|v| CandidateValue {
                    record_id: source.id.clone(),
                    value: v,
                })
            })
            .collect();

        if had_conflict {
            stats.fields_with_conflicts += 1;
            match request.config.conflict_resolution {
                ConflictResolution::Error => {
                    return Err(MergeError::MergeConflict {
                        path: path.clone(),
                        values: distinct_non_null.into_iter().cloned().collect(),
                    });
                }
                ConflictResolution::UseDefault => {
                    conflicts.push(Conflict {
                        field: path.clone(),
                        values: distinct_non_null.into_iter().cloned().collect(),
                        resolution: "auto".to_string(),
                        resolved_value: resolved.clone(),
                        note: format!("resolved via '{strategy_name}'"),
                    });
                    debug!(field = %path, strategy = %strategy_name, "merge conflict auto-resolved");
                }
                ConflictResolution::MarkConflict => {
                    conflicts.push(Conflict {
                        field: path.clone(),
                        values: distinct_non_null.into_iter().cloned().collect(),
                        resolution: "deferred".to_string(),
                        resolved_value: resolved.clone(),
                        note: "deferred to manual review".to_string(),
                    });
                    warn!(field = %path, "merge conflict deferred to review queue");
                }
            }
        }

        if let Some(value) = &resolved {
            set_path(&mut golden_record, path, value.clone()).map_err(MergeError::Validation)?;
            if let Some(source) = request.source_records.iter().find(|s| {
                get_path(&s.record, path)
                    .map(|v| v == value)
                    .unwrap_or(false)
            }) {
                *stats
                    .contributions_by_source
                    .entry(source.id.clone())
                    .or_insert(0) += 1;
            }
        }
        stats.total_fields += 1;

        if request.config.track_provenance {
            field_sources.insert(
                path.clone(),
                FieldProvenance {
                    source_record_id: candidate_values
                        .iter()
                        .find(|c| resolved.as_ref().is_some_and(|r| c.value == *r))
                        .map(|c| c.record_id.clone())
                        .unwrap_or_else(|| request.source_records[0].id.clone()),
                    strategy: strategy_name.clone(),
                    candidate_values,
                    had_conflict,
                    resolution_note: had_conflict.then(|| match request.config.conflict_resolution {
                        ConflictResolution::UseDefault => format!("auto-resolved via '{strategy_name}'"),
                        ConflictResolution::MarkConflict => "deferred to review".to_string(),
                        ConflictResolution::Error => unreachable!("errors short-circuit above"),
                    }),
                },
            );
        }
    }

    let provenance = Provenance {
        golden_record_id: golden_record_id.clone(),
        source_record_ids: request.source_records.iter().map(|s| s.id.clone()).collect(),
        merged_at: chrono::Utc::now(),
        merged_by: request.merged_by.clone(),
        queue_item_id: request.queue_item_id.clone(),
        field_sources,
        strategy_used: request.config.default_strategy.clone(),
        unmerged: false,
        unmerged_at: None,
        unmerged_by: None,
        unmerge_reason: None,
    };

    Ok(MergeResult {
        golden_record,
        golden_record_id,
        provenance,
        source_records: request.source_records.clone(),
        conflicts,
        stats,
    })
}

fn collect_field_paths(sources: &[SourceRecord], schema: Option<&[String]>) -> Vec<String> {
    let mut paths: BTreeSet<String> = BTreeSet::new();
    for source in sources {
        for path in er_core::walk_paths(&source.record) {
            paths.insert(path);
        }
    }
    if let Some(schema) = schema {
        for path in schema {
            paths.insert(path.clone());
        }
    }
    paths.into_iter().collect()
}

/// A path that is a leaf (scalar/array/null) in one source but an
/// intermediate object in another is an unmergeable schema collision (spec
/// §9 open question, resolved fail-loud in `SPEC_FULL.md` §4): there is no
/// single golden shape for `"address"` if one source has it as a string and
/// another as `{ city, zip }`.
fn check_shape_consistency(sources: &[SourceRecord], _paths: &[String]) -> Result<(), MergeError> {
    let mut leaf_paths: BTreeSet<String> = BTreeSet::new();
    let mut object_paths: BTreeSet<String> = BTreeSet::new();
    for source in sources {
        for path in er_core::walk_paths(&source.record) {
            leaf_paths.insert(path);
        }
        collect_object_paths(&source.record, String::new(), &mut object_paths);
    }
    if let Some(path) = leaf_paths.intersection(&object_paths).next() {
        return Err(MergeError::FieldShapeMismatch { path: path.clone() });
    }
    Ok(())
}

fn collect_object_paths(record: &er_core::Record, prefix: String, out: &mut BTreeSet<String>) {
    for (key, value) in record {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Value::Object(nested) = value {
            if !nested.is_empty() {
                out.insert(path.clone());
                collect_object_paths(nested, path, out);
            }
        }
    }
}

#[cfg(test)]
mod tests;
