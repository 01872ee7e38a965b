//! Built-in merge strategies and the registry that looks them up by name
//! (spec §4.3).
//!
//! Every strategy has the same shape: given the candidate value extracted
//! from each source record at a field path (in source order, `None` where
//! the source lacks the field), the source records themselves (for
//! timestamp-based strategies), and the resolved options, produce the single
//! value to write into the golden record, or `None` if no candidate
//! qualifies.

use std::collections::HashMap;
use std::sync::Arc;

use er_core::Value;

use crate::types::{MergeError, NullHandling, SourceRecord, StrategyOptions};

pub type StrategyFn =
    dyn Fn(&[Option<Value>], &[SourceRecord], &StrategyOptions) -> Option<Value> + Send + Sync;

/// Name-keyed lookup of merge strategies. Starts pre-populated with all
/// built-ins; `register` lets callers add or override entries (e.g. to give
/// `"custom"` semantics a project-wide default).
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<StrategyFn>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self {
            strategies: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry with no built-ins, for callers that want to define
    /// their own closed strategy set.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registers `name` against `f`, rejecting an empty name (spec §4.3
    /// "registration of an empty name is rejected").
    pub fn register(&mut self, name: impl Into<String>, f: Arc<StrategyFn>) -> Result<(), MergeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MergeError::Validation(
                "merge strategy name must not be empty".to_string(),
            ));
        }
        self.strategies.insert(name, f);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
    }

    pub fn register_builtins(&mut self) {
        self.register("preferFirst", Arc::new(prefer_first)).expect("built-in name is non-empty");
        self.register("preferLast", Arc::new(prefer_last)).expect("built-in name is non-empty");
        self.register("preferNonNull", Arc::new(prefer_non_null)).expect("built-in name is non-empty");
        self.register("preferNewer", Arc::new(prefer_newer)).expect("built-in name is non-empty");
        self.register("preferOlder", Arc::new(prefer_older)).expect("built-in name is non-empty");
        self.register("preferLonger", Arc::new(prefer_longer)).expect("built-in name is non-empty");
        self.register("preferShorter", Arc::new(prefer_shorter)).expect("built-in name is non-empty");
        self.register("concatenate", Arc::new(concatenate)).expect("built-in name is non-empty");
        self.register("union", Arc::new(union)).expect("built-in name is non-empty");
        self.register("mostFrequent", Arc::new(most_frequent)).expect("built-in name is non-empty");
        self.register("average", Arc::new(average)).expect("built-in name is non-empty");
        self.register("sum", Arc::new(sum)).expect("built-in name is non-empty");
        self.register("min", Arc::new(min)).expect("built-in name is non-empty");
        self.register("max", Arc::new(max)).expect("built-in name is non-empty");
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<StrategyFn>, MergeError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| MergeError::InvalidStrategy {
                name: name.to_string(),
                available: self.names(),
            })
    }
}

fn is_skippable(value: &Option<Value>, null_handling: NullHandling) -> bool {
    match null_handling {
        NullHandling::Include => false,
        NullHandling::Skip => match value {
            None => true,
            Some(v) => v.is_null(),
        },
    }
}

fn candidates<'a>(
    values: &'a [Option<Value>],
    options: &StrategyOptions,
) -> Vec<&'a Value> {
    values
        .iter()
        .filter(|v| !is_skippable(v, options.null_handling))
        .filter_map(|v| v.as_ref())
        .collect()
}

pub fn prefer_first(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    values
        .iter()
        .find(|v| !is_skippable(v, options.null_handling))
        .and_then(|v| v.clone())
}

pub fn prefer_last(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    values
        .iter()
        .rev()
        .find(|v| !is_skippable(v, options.null_handling))
        .and_then(|v| v.clone())
}

pub fn prefer_non_null(values: &[Option<Value>], _sources: &[SourceRecord], _options: &StrategyOptions) -> Option<Value> {
    values
        .iter()
        .find(|v| v.as_ref().is_some_and(|x| !x.is_null()))
        .and_then(|v| v.clone())
}

pub fn prefer_newer(values: &[Option<Value>], sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    prefer_extreme_by_timestamp(values, sources, options, true)
}

pub fn prefer_older(values: &[Option<Value>], sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    prefer_extreme_by_timestamp(values, sources, options, false)
}

fn prefer_extreme_by_timestamp(
    values: &[Option<Value>],
    sources: &[SourceRecord],
    options: &StrategyOptions,
    newer: bool,
) -> Option<Value> {
    let mut dated: Vec<(Option<chrono::DateTime<chrono::Utc>>, &Value)> = Vec::new();
    for (value, source) in values.iter().zip(sources.iter()) {
        if is_skippable(value, options.null_handling) {
            continue;
        }
        let Some(v) = value.as_ref() else { continue };
        let ts = match &options.date_field {
            Some(path) => er_core::get_path(&source.record, path).and_then(Value::as_date),
            None => Some(source.updated_at),
        };
        dated.push((ts, v));
    }
    if dated.is_empty() {
        return None;
    }
    if dated.iter().all(|(ts, _)| ts.is_none()) {
        return dated.first().map(|(_, v)| (*v).clone());
    }
    let mut timed: Vec<(chrono::DateTime<chrono::Utc>, &Value)> = dated
        .into_iter()
        .filter_map(|(ts, v)| ts.map(|t| (t, v)))
        .collect();
    if newer {
        timed.sort_by_key(|(ts, _)| *ts);
        timed.last().map(|(_, v)| (*v).clone())
    } else {
        timed.sort_by_key(|(ts, _)| *ts);
        timed.first().map(|(_, v)| (*v).clone())
    }
}

pub fn prefer_longer(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    candidates(values, options)
        .into_iter()
        .max_by_key(|v| v.stringify_lossy().chars().count())
        .cloned()
}

pub fn prefer_shorter(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    candidates(values, options)
        .into_iter()
        .filter(|v| !v.stringify_lossy().is_empty())
        .min_by_key(|v| v.stringify_lossy().chars().count())
        .cloned()
}

pub fn concatenate(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    let parts: Vec<String> = candidates(values, options)
        .into_iter()
        .map(Value::stringify_lossy)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(Value::String(parts.join(&options.separator)))
    }
}

pub fn union(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    let mut out: Vec<Value> = Vec::new();
    for v in candidates(values, options) {
        let elements: Vec<&Value> = match v {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for element in elements {
            if !out.iter().any(|existing| existing == element) {
                out.push(element.clone());
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(Value::Array(out))
    }
}

pub fn most_frequent(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    let pool = candidates(values, options);
    if pool.is_empty() {
        return None;
    }
    let mut groups: Vec<(&Value, usize)> = Vec::new();
    for v in pool {
        if let Some(entry) = groups.iter_mut().find(|(existing, _)| *existing == v) {
            entry.1 += 1;
        } else {
            groups.push((v, 1));
        }
    }
    // `Iterator::max_by_key` returns the *last* maximal element on ties;
    // spec §4.3 requires ties resolved by first occurrence, so fold
    // manually and only replace the running winner on a strict increase.
    let mut winner: Option<(&Value, usize)> = None;
    for (value, count) in groups {
        if winner.is_none_or(|(_, best_count)| count > best_count) {
            winner = Some((value, count));
        }
    }
    winner.map(|(v, _)| v.clone())
}

fn numeric_candidates(values: &[Option<Value>], options: &StrategyOptions) -> Vec<f64> {
    candidates(values, options)
        .into_iter()
        .filter_map(Value::as_f64)
        .collect()
}

pub fn average(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    let nums = numeric_candidates(values, options);
    if nums.is_empty() {
        None
    } else {
        Some(Value::Number(nums.iter().sum::<f64>() / nums.len() as f64))
    }
}

pub fn sum(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    let nums = numeric_candidates(values, options);
    if nums.is_empty() {
        None
    } else {
        Some(Value::Number(nums.iter().sum()))
    }
}

pub fn min(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    numeric_candidates(values, options)
        .into_iter()
        .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.min(n))))
        .map(Value::Number)
}

pub fn max(values: &[Option<Value>], _sources: &[SourceRecord], options: &StrategyOptions) -> Option<Value> {
    numeric_candidates(values, options)
        .into_iter()
        .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.max(n))))
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn source(id: &str, created: i64, updated: i64) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            record: er_core::Record::new(),
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            updated_at: Utc.timestamp_opt(updated, 0).unwrap(),
        }
    }

    fn num(n: f64) -> Option<Value> {
        Some(Value::Number(n))
    }

    #[test]
    fn prefer_first_skips_nulls_by_default() {
        let values = vec![None, Some(Value::Null), num(5.0)];
        let sources = vec![source("a", 0, 0), source("b", 0, 0), source("c", 0, 0)];
        let options = StrategyOptions::default();
        assert_eq!(prefer_first(&values, &sources, &options), num(5.0));
    }

    #[test]
    fn prefer_last_returns_last_non_null() {
        let values = vec![num(1.0), num(2.0), None];
        let sources = vec![source("a", 0, 0), source("b", 0, 0), source("c", 0, 0)];
        assert_eq!(
            prefer_last(&values, &sources, &StrategyOptions::default()),
            num(2.0)
        );
    }

    #[test]
    fn prefer_newer_uses_source_updated_at_by_default() {
        let values = vec![Some(Value::String("old".into())), Some(Value::String("new".into()))];
        let sources = vec![source("a", 0, 10), source("b", 0, 20)];
        assert_eq!(
            prefer_newer(&values, &sources, &StrategyOptions::default()),
            Some(Value::String("new".into()))
        );
    }

    #[test]
    fn prefer_older_picks_earliest_timestamp() {
        let values = vec![Some(Value::String("old".into())), Some(Value::String("new".into()))];
        let sources = vec![source("a", 0, 10), source("b", 0, 20)];
        assert_eq!(
            prefer_older(&values, &sources, &StrategyOptions::default()),
            Some(Value::String("old".into()))
        );
    }

    #[test]
    fn prefer_longer_picks_max_length_string() {
        let values = vec![
            Some(Value::String("hi".into())),
            Some(Value::String("hello there".into())),
        ];
        let sources = vec![source("a", 0, 0), source("b", 0, 0)];
        assert_eq!(
            prefer_longer(&values, &sources, &StrategyOptions::default()),
            Some(Value::String("hello there".into()))
        );
    }

    #[test]
    fn concatenate_joins_non_empty_parts_with_separator() {
        let values = vec![
            Some(Value::String("a".into())),
            None,
            Some(Value::String("b".into())),
        ];
        let sources = vec![source("a", 0, 0), source("b", 0, 0), source("c", 0, 0)];
        assert_eq!(
            concatenate(&values, &sources, &StrategyOptions::default()),
            Some(Value::String("a, b".into()))
        );
    }

    #[test]
    fn union_dedupes_preserving_first_seen_order() {
        let values = vec![
            Some(Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])),
            Some(Value::Array(vec![Value::Number(2.0), Value::Number(3.0)])),
        ];
        let sources = vec![source("a", 0, 0), source("b", 0, 0)];
        assert_eq!(
            union(&values, &sources, &StrategyOptions::default()),
            Some(Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ]))
        );
    }

    #[test]
    fn most_frequent_breaks_ties_by_first_occurrence() {
        let values = vec![num(1.0), num(2.0), num(1.0), num(2.0)];
        let sources = vec![
            source("a", 0, 0),
            source("b", 0, 0),
            source("c", 0, 0),
            source("d", 0, 0),
        ];
        assert_eq!(
            most_frequent(&values, &sources, &StrategyOptions::default()),
            num(1.0)
        );
    }

    #[test]
    fn sum_and_average_ignore_non_numeric_candidates() {
        let values = vec![num(10.0), Some(Value::String("n/a".into())), num(20.0)];
        let sources = vec![source("a", 0, 0), source("b", 0, 0), source("c", 0, 0)];
        let options = StrategyOptions::default();
        assert_eq!(sum(&values, &sources, &options), num(30.0));
        assert_eq!(average(&values, &sources, &options), num(15.0));
    }

    #[test]
    fn register_rejects_empty_name() {
        let mut registry = StrategyRegistry::empty();
        let err = registry.register("", Arc::new(prefer_first)).unwrap_err();
        assert!(matches!(err, MergeError::Validation(_)));
    }

    #[test]
    fn registry_looks_up_builtins_by_name() {
        let registry = StrategyRegistry::new();
        assert!(registry.lookup("preferNonNull").is_ok());
        let err = registry.lookup("doesNotExist").unwrap_err();
        match err {
            MergeError::InvalidStrategy { name, .. } => assert_eq!(name, "doesNotExist"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
