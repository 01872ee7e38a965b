//! # Entity Resolution Comparators (`er-comparators`)
//!
//! Field-level similarity functions over two [`er_core::Value`]s, each
//! returning a similarity in `[0, 1]` (spec §4.1). Every comparator here is
//! pure and deterministic — no I/O, no shared state — so the matching
//! engine in `er-matching` can call them directly without synchronization.

pub mod exact;
pub mod jaro_winkler;
pub mod levenshtein;
pub mod metaphone;
pub mod soundex;

mod dispatch;

pub use dispatch::{ComparatorError, ComparatorKind, ComparatorOptions, compare_with};
pub use exact::{exact, ExactOptions};
pub use jaro_winkler::{jaro, jaro_winkler, JaroWinklerOptions};
pub use levenshtein::{edit_distance, levenshtein, LevenshteinOptions};
pub use metaphone::{metaphone, metaphone_code, MetaphoneOptions};
pub use soundex::{soundex, soundex_code, SoundexOptions};
