use er_comparators::{ComparatorKind, ComparatorOptions, JaroWinklerOptions};
use er_core::{Record, Value};

use crate::engine::{classify, compare, sort_candidates};
use crate::types::{FieldMatchConfig, MatchClassification, MatchingConfig, PairSide, RecordPair};

fn record(pairs: Vec<(&str, &str)>) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

fn pair(left: Record, right: Record) -> RecordPair {
    RecordPair {
        left: PairSide {
            id: "left-1".into(),
            source: None,
            record: left,
        },
        right: PairSide {
            id: "right-1".into(),
            source: None,
            record: right,
        },
    }
}

/// Scenario 1 (spec §8): exact equal emails, differing last name.
#[test]
fn scenario_exact_equal_emails_possible_match() {
    let config = MatchingConfig::new(
        vec![
            FieldMatchConfig::new("email", ComparatorKind::Exact, 50.0),
            FieldMatchConfig::new("firstName", ComparatorKind::Exact, 25.0),
            FieldMatchConfig::new("lastName", ComparatorKind::Exact, 25.0),
        ],
        20.0,
        80.0,
    );
    config.validate().unwrap();

    let left = record(vec![
        ("email", "ada@example.com"),
        ("firstName", "Ada"),
        ("lastName", "Lovelace"),
    ]);
    let right = record(vec![
        ("email", "ada@example.com"),
        ("firstName", "Ada"),
        ("lastName", "King"),
    ]);

    let breakdown = compare(&pair(left, right), &config).unwrap();
    assert_eq!(breakdown.total, 75.0);
    assert_eq!(classify(breakdown.total, &config), MatchClassification::PossibleMatch);
}

/// Scenario 2 (spec §8): Jaro-Winkler threshold veto.
#[test]
fn scenario_jaro_winkler_threshold_veto() {
    let mut field = FieldMatchConfig::new("name", ComparatorKind::JaroWinkler, 100.0)
        .with_threshold(0.85);
    field.options = ComparatorOptions::JaroWinkler(JaroWinklerOptions::default());
    let config = MatchingConfig::new(vec![field], 0.0, 1000.0);

    let john_jon = pair(record(vec![("name", "John")]), record(vec![("name", "Jon")]));
    let breakdown = compare(&john_jon, &config).unwrap();
    assert!(breakdown.total > 0.0, "John/Jon should clear the veto");
    assert!((breakdown.total - 88.3).abs() < 1.0, "got {}", breakdown.total);

    let alice_bob = pair(record(vec![("name", "Alice")]), record(vec![("name", "Bob")]));
    let breakdown = compare(&alice_bob, &config).unwrap();
    assert_eq!(breakdown.total, 0.0, "Alice/Bob should be vetoed to zero");
}

#[test]
fn vacuous_match_when_both_sides_missing_field() {
    let config = MatchingConfig::new(
        vec![FieldMatchConfig::new("phone", ComparatorKind::Exact, 10.0)],
        0.0,
        100.0,
    );
    let breakdown = compare(&pair(Record::new(), Record::new()), &config).unwrap();
    assert_eq!(breakdown.fields[0].similarity, 1.0);
    assert_eq!(breakdown.total, 10.0);
}

#[test]
fn normalized_total_is_bounded_and_consistent_with_total() {
    let config = MatchingConfig::new(
        vec![
            FieldMatchConfig::new("a", ComparatorKind::Exact, 30.0),
            FieldMatchConfig::new("b", ComparatorKind::Exact, 70.0),
        ],
        0.0,
        100.0,
    );
    let left = record(vec![("a", "x"), ("b", "y")]);
    let right = record(vec![("a", "x"), ("b", "z")]);
    let breakdown = compare(&pair(left, right), &config).unwrap();

    let sum_weighted: f64 = breakdown.fields.iter().map(|f| f.weighted_score).sum();
    assert_eq!(breakdown.total, sum_weighted);
    assert!((0.0..=1.0).contains(&breakdown.normalized_total));
}

#[test]
fn config_with_no_match_greater_than_definite_is_rejected() {
    let config = MatchingConfig::new(vec![], 90.0, 10.0);
    assert!(config.validate().is_err());
}

#[test]
fn sort_candidates_breaks_ties_by_ids_lexicographically() {
    let mut items = vec![
        (50.0, "b", "x"),
        (50.0, "a", "z"),
        (90.0, "z", "z"),
        (50.0, "a", "y"),
    ];
    sort_candidates(&mut items, |i| i.0, |i| i.1, |i| i.2);
    assert_eq!(
        items,
        vec![
            (90.0, "z", "z"),
            (50.0, "a", "y"),
            (50.0, "a", "z"),
            (50.0, "b", "x"),
        ]
    );
}
