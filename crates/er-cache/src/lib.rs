//! # Entity Resolution Cache (`er-cache`)
//!
//! A size- and byte-bounded LRU cache with TTL and a stale-on-error window
//! (spec §4.8), backed by an intrusive doubly-linked list (see [`mod@list`])
//! for O(1) get/set/evict.

mod cache;
mod list;
mod types;

pub use cache::{Cache, SharedCache};
pub use types::{
    CacheConfig, CacheStats, EvictionCallback, EvictionReason, GetOptions, GetOutcome,
    SetOptions, DEFAULT_TTL_SECONDS,
};
