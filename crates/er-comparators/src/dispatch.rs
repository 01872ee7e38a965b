//! Dispatch from a configured strategy name to a concrete comparator,
//! mirroring how `matcher::types::MatchExpr` in the teacher workspace
//! dispatches over a closed enum rather than a string lookup table.

use er_core::Value;
use thiserror::Error;

use crate::exact::{exact, ExactOptions};
use crate::jaro_winkler::{jaro_winkler, JaroWinklerOptions};
use crate::levenshtein::{levenshtein, LevenshteinOptions};
use crate::metaphone::{metaphone, MetaphoneOptions};
use crate::soundex::{soundex, SoundexOptions};

/// The comparator strategies a field match config may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparatorKind {
    Exact,
    Levenshtein,
    JaroWinkler,
    Soundex,
    Metaphone,
}

impl ComparatorKind {
    pub const ALL_NAMES: &'static [&'static str] =
        &["exact", "levenshtein", "jaro-winkler", "soundex", "metaphone"];

    pub fn from_name(name: &str) -> Result<Self, ComparatorError> {
        match name {
            "exact" => Ok(ComparatorKind::Exact),
            "levenshtein" => Ok(ComparatorKind::Levenshtein),
            "jaro-winkler" | "jaro_winkler" => Ok(ComparatorKind::JaroWinkler),
            "soundex" => Ok(ComparatorKind::Soundex),
            "metaphone" => Ok(ComparatorKind::Metaphone),
            other => Err(ComparatorError::UnknownStrategy {
                name: other.to_string(),
                available: Self::ALL_NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComparatorKind::Exact => "exact",
            ComparatorKind::Levenshtein => "levenshtein",
            ComparatorKind::JaroWinkler => "jaro-winkler",
            ComparatorKind::Soundex => "soundex",
            ComparatorKind::Metaphone => "metaphone",
        }
    }
}

/// Per-comparator options, carried alongside the kind so callers can tune
/// strategy-specific behavior (spec §3 "strategy-specific options").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparatorOptions {
    Exact(ExactOptions),
    Levenshtein(LevenshteinOptions),
    JaroWinkler(JaroWinklerOptions),
    Soundex(SoundexOptions),
    Metaphone(MetaphoneOptions),
}

impl ComparatorOptions {
    pub fn default_for(kind: ComparatorKind) -> Self {
        match kind {
            ComparatorKind::Exact => ComparatorOptions::Exact(ExactOptions::default()),
            ComparatorKind::Levenshtein => {
                ComparatorOptions::Levenshtein(LevenshteinOptions::default())
            }
            ComparatorKind::JaroWinkler => {
                ComparatorOptions::JaroWinkler(JaroWinklerOptions::default())
            }
            ComparatorKind::Soundex => ComparatorOptions::Soundex(SoundexOptions::default()),
            ComparatorKind::Metaphone => ComparatorOptions::Metaphone(MetaphoneOptions::default()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ComparatorError {
    #[error("unknown comparator strategy '{name}'; available: {available:?}")]
    UnknownStrategy {
        name: String,
        available: Vec<String>,
    },
    #[error("options of the wrong kind were supplied for comparator '{kind}'")]
    MismatchedOptions { kind: &'static str },
}

/// Run `kind` over `left`/`right` with `options`. Fails if `options` do not
/// correspond to `kind` (a configuration error, not a data error).
pub fn compare_with(
    kind: ComparatorKind,
    left: &Value,
    right: &Value,
    options: &ComparatorOptions,
) -> Result<f64, ComparatorError> {
    match (kind, options) {
        (ComparatorKind::Exact, ComparatorOptions::Exact(opts)) => Ok(exact(left, right, opts)),
        (ComparatorKind::Levenshtein, ComparatorOptions::Levenshtein(opts)) => {
            Ok(levenshtein(left, right, opts))
        }
        (ComparatorKind::JaroWinkler, ComparatorOptions::JaroWinkler(opts)) => {
            Ok(jaro_winkler(left, right, opts))
        }
        (ComparatorKind::Soundex, ComparatorOptions::Soundex(opts)) => {
            Ok(soundex(left, right, opts))
        }
        (ComparatorKind::Metaphone, ComparatorOptions::Metaphone(opts)) => {
            Ok(metaphone(left, right, opts))
        }
        (kind, _) => Err(ComparatorError::MismatchedOptions { kind: kind.name() }),
    }
}
