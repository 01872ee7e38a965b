use chrono::{TimeZone, Utc};
use er_core::{Record, Value};

use crate::executor::merge;
use crate::strategies::StrategyRegistry;
use crate::types::{
    ConflictResolution, FieldStrategyConfig, MergeConfig, MergeError, MergeRequest, SourceRecord,
    StrategyOptions,
};

fn source(id: &str, updated: i64, fields: Vec<(&str, Value)>) -> SourceRecord {
    SourceRecord {
        id: id.to_string(),
        record: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        created_at: Utc.timestamp_opt(0, 0).unwrap(),
        updated_at: Utc.timestamp_opt(updated, 0).unwrap(),
    }
}

/// Scenario 3 (spec §8): price merge strategies pick the field-configured
/// strategy over the default.
#[test]
fn scenario_field_strategy_overrides_default() {
    let crm = source(
        "crm",
        10,
        vec![("price", Value::Number(19.99)), ("name", Value::String("Widget".into()))],
    );
    let erp = source(
        "erp",
        20,
        vec![("price", Value::Number(21.50)), ("name", Value::String("Widget Pro".into()))],
    );

    let mut config = MergeConfig::default();
    config.field_strategies.push(FieldStrategyConfig {
        path: "price".to_string(),
        strategy: "max".to_string(),
        options: StrategyOptions::default(),
        custom_merge: None,
    });
    config.field_strategies.push(FieldStrategyConfig {
        path: "name".to_string(),
        strategy: "preferNewer".to_string(),
        options: StrategyOptions::default(),
        custom_merge: None,
    });

    let request = MergeRequest {
        source_records: vec![crm, erp],
        target_record_id: Some("golden-1".to_string()),
        config,
        merged_by: Some("operator@example.com".to_string()),
        queue_item_id: None,
        schema: None,
    };

    let result = merge(&request, &StrategyRegistry::new()).unwrap();
    assert_eq!(result.golden_record.get("price"), Some(&Value::Number(21.50)));
    assert_eq!(
        result.golden_record.get("name"),
        Some(&Value::String("Widget Pro".into()))
    );
    assert_eq!(result.conflicts.len(), 2, "price and name differ across sources");
}

/// Scenario 4 (spec §8): a genuine conflict (differing non-null values) is
/// auto-resolved but still recorded when `conflict_resolution` is
/// `UseDefault`.
#[test]
fn scenario_conflict_is_recorded_when_use_default() {
    let a = source("a", 10, vec![("status", Value::String("active".into()))]);
    let b = source("b", 20, vec![("status", Value::String("inactive".into()))]);

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: None,
        config: MergeConfig::default(),
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let result = merge(&request, &StrategyRegistry::new()).unwrap();
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].field, "status");
    assert_eq!(result.conflicts[0].resolution, "auto");
    assert!(result.golden_record.contains_key("status"));
}

#[test]
fn mark_conflict_defers_but_still_populates_the_field() {
    let a = source("a", 10, vec![("status", Value::String("active".into()))]);
    let b = source("b", 20, vec![("status", Value::String("inactive".into()))]);

    let mut config = MergeConfig::default();
    config.conflict_resolution = ConflictResolution::MarkConflict;

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: None,
        config,
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let result = merge(&request, &StrategyRegistry::new()).unwrap();
    assert_eq!(result.conflicts[0].resolution, "deferred");
    assert!(result.golden_record.contains_key("status"));
}

#[test]
fn error_resolution_aborts_the_merge_on_first_conflict() {
    let a = source("a", 10, vec![("status", Value::String("active".into()))]);
    let b = source("b", 20, vec![("status", Value::String("inactive".into()))]);

    let mut config = MergeConfig::default();
    config.conflict_resolution = ConflictResolution::Error;

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: None,
        config,
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let err = merge(&request, &StrategyRegistry::new()).unwrap_err();
    assert!(matches!(err, MergeError::MergeConflict { field, .. } if field == "status"));
}

#[test]
fn fewer_than_two_source_records_is_rejected() {
    let a = source("a", 10, vec![("status", Value::String("active".into()))]);
    let request = MergeRequest {
        source_records: vec![a],
        target_record_id: None,
        config: MergeConfig::default(),
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };
    let err = merge(&request, &StrategyRegistry::new()).unwrap_err();
    assert!(matches!(err, MergeError::InsufficientSourceRecords(1)));
}

#[test]
fn shape_mismatch_across_sources_is_rejected() {
    let a = source("a", 10, vec![("address", Value::String("123 Main St".into()))]);
    let mut nested = Record::new();
    nested.insert("city".to_string(), Value::String("Austin".into()));
    let b = source("b", 20, vec![("address", Value::Object(nested))]);

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: None,
        config: MergeConfig::default(),
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let err = merge(&request, &StrategyRegistry::new()).unwrap_err();
    assert!(matches!(err, MergeError::FieldShapeMismatch { path } if path == "address"));
}

#[test]
fn provenance_tracks_contributing_source_per_field() {
    let a = source("a", 10, vec![("email", Value::String("a@example.com".into()))]);
    let b = source("b", 20, vec![("email", Value::Null)]);

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: Some("golden-2".to_string()),
        config: MergeConfig::default(),
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let result = merge(&request, &StrategyRegistry::new()).unwrap();
    let provenance = result.provenance.field_sources.get("email").unwrap();
    assert_eq!(provenance.source_record_id, "a");
    assert!(!provenance.had_conflict);
}

/// Spec §4.4 step 6: a derived value (e.g. `average`) matches no single
/// source's value by deep-equality, so attribution falls back to the first
/// source record rather than an empty id.
#[test]
fn derived_value_provenance_falls_back_to_first_source() {
    let a = source("a", 10, vec![("price", Value::Number(29.99))]);
    let b = source("b", 20, vec![("price", Value::Number(24.99))]);
    let c = source("c", 30, vec![("price", Value::Number(27.50))]);

    let mut config = MergeConfig::default();
    config.field_strategies.push(FieldStrategyConfig {
        path: "price".to_string(),
        strategy: "average".to_string(),
        options: StrategyOptions::default(),
        custom_merge: None,
    });

    let request = MergeRequest {
        source_records: vec![a, b, c],
        target_record_id: Some("golden-avg".to_string()),
        config,
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let result = merge(&request, &StrategyRegistry::new()).unwrap();
    let provenance = result.provenance.field_sources.get("price").unwrap();
    assert_eq!(provenance.source_record_id, "a");
}

/// Spec §4.4 Output: `goldenRecordId = targetRecordId or first source id or
/// generated`. With no `target_record_id`, the first source's id wins.
#[test]
fn golden_record_id_falls_back_to_first_source_id() {
    let a = source("a", 10, vec![("status", Value::String("active".into()))]);
    let b = source("b", 20, vec![("status", Value::String("active".into()))]);

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: None,
        config: MergeConfig::default(),
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let result = merge(&request, &StrategyRegistry::new()).unwrap();
    assert_eq!(result.golden_record_id, "a");
}

#[test]
fn custom_strategy_without_a_function_is_rejected() {
    let a = source("a", 10, vec![("score", Value::Number(1.0))]);
    let b = source("b", 20, vec![("score", Value::Number(2.0))]);

    let mut config = MergeConfig::default();
    config.field_strategies.push(FieldStrategyConfig {
        path: "score".to_string(),
        strategy: "custom".to_string(),
        options: StrategyOptions::default(),
        custom_merge: None,
    });

    let request = MergeRequest {
        source_records: vec![a, b],
        target_record_id: None,
        config,
        merged_by: None,
        queue_item_id: None,
        schema: None,
    };

    let err = merge(&request, &StrategyRegistry::new()).unwrap_err();
    assert!(matches!(err, MergeError::CustomStrategyMissing { path } if path == "score"));
}
