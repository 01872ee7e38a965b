//! The record/value data model shared by every layer of the toolkit.
//!
//! A [`Record`] is a `Value::Object` at the top level: an opaque key→value
//! mapping where keys are plain field names and dot-notated paths (`"a.b.c"`)
//! are used to address nested fields. Values may be primitives, dates,
//! arrays, or nested objects. `BTreeMap` (not `HashMap`) backs every object
//! so that key order is always sorted, which [`crate::stringify::stable_stringify`]
//! and [`crate::equality::deep_equal`] rely on instead of sorting on every call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically-typed value in a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// A record is the top-level object that matching, merging, and the
/// service pipeline all operate on.
pub type Record = BTreeMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Stringified representation used by comparators and length-based
    /// strategies (`preferLonger`/`preferShorter`, `concatenate`). Does not
    /// attempt to be a faithful round-trippable serialization; it mirrors
    /// how a dynamically-typed language would coerce a value to a string.
    pub fn stringify_lossy(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339(),
            Value::Array(items) => items
                .iter()
                .map(Value::stringify_lossy)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Split a dot-notated path into its segments. Empty segments (leading,
/// trailing, or doubled dots) are rejected by the caller layers rather than
/// silently collapsed.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Resolve a dot-path against a record. Returns `None` when any segment is
/// absent, or when a non-leaf segment in the path addresses something other
/// than an object (arrays are always leaves, per the data model: you cannot
/// path *through* an array element).
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path_segments(path).into_iter();
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Assign a value into a record at a dot-path, creating intermediate objects
/// as needed. Fails (returns `Err`) only if an intermediate segment already
/// holds a non-object value, since that would silently discard data.
pub fn set_path(record: &mut Record, path: &str, value: Value) -> Result<(), String> {
    let segments = path_segments(path);
    if segments.iter().any(|s| s.is_empty()) {
        return Err(format!("invalid empty path segment in '{path}'"));
    }
    set_path_in_map(record, &segments, value)
}

fn set_path_in_map(map: &mut Record, segments: &[&str], value: Value) -> Result<(), String> {
    let (head, rest) = segments
        .split_first()
        .expect("set_path_in_map called with empty segments");
    if rest.is_empty() {
        map.insert((*head).to_string(), value);
        return Ok(());
    }
    let entry = map
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(BTreeMap::new()));
    match entry {
        Value::Object(nested) => set_path_in_map(nested, rest, value),
        other => Err(format!(
            "cannot descend into non-object value at path segment '{head}' (found {other:?})"
        )),
    }
}

/// Recursively discover every leaf field path in a record. Nested plain
/// objects are walked; arrays (and everything inside them) are treated as
/// leaves, matching the data model's "arrays are leaves" rule used by both
/// the matching engine's field resolution and the merge executor's
/// field-path collector.
pub fn walk_paths(record: &Record) -> Vec<String> {
    let mut paths = Vec::new();
    walk_paths_into(record, String::new(), &mut paths);
    paths
}

fn walk_paths_into(map: &Record, prefix: String, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => walk_paths_into(nested, path, out),
            _ => out.push(path),
        }
    }
}


impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::equality::deep_equal(self, other)
    }
}
