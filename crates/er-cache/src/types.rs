//! Configuration and result types for `er-cache` (spec §3 "Cache entry",
//! §4.8).

use chrono::{DateTime, Duration, Utc};

/// Cache-wide bounds: entry count and/or total byte budget.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size: Option<usize>,
    pub max_total_bytes: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: Some(1000),
            max_total_bytes: None,
        }
    }
}

impl CacheConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_max_total_bytes(mut self, max_total_bytes: u64) -> Self {
        self.max_total_bytes = Some(max_total_bytes);
        self
    }

    pub fn unbounded() -> Self {
        Self {
            max_size: None,
            max_total_bytes: None,
        }
    }
}

/// Per-`set` knobs (spec §4.8: `set(key, value, {ttlSeconds, staleWindowSeconds?, sizeBytes?})`).
#[derive(Debug, Clone)]
pub struct SetOptions {
    pub ttl: Duration,
    pub stale_window: Option<Duration>,
    pub size_bytes: Option<u64>,
}

impl SetOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            stale_window: None,
            size_bytes: None,
        }
    }

    pub fn with_stale_window(mut self, window: Duration) -> Self {
        self.stale_window = Some(window);
        self
    }

    pub fn with_size_bytes(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }
}

/// Default TTL (spec §5 "Timeouts & deadlines": "cache TTL 300 s").
pub const DEFAULT_TTL_SECONDS: i64 = 300;

impl Default for SetOptions {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECONDS))
    }
}

/// Per-`get` knobs (spec §4.8 `get`).
#[derive(Debug, Clone, Copy)]
pub struct GetOptions {
    /// When `true`, a stale (past `expiresAt` but within `staleUntil`) entry
    /// is returned with `isStale=true` instead of counting as a miss.
    pub allow_stale: bool,
    /// When `true` (the default), a hit moves the entry to the MRU end and
    /// bumps its access counters.
    pub update_access: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            allow_stale: false,
            update_access: true,
        }
    }
}

impl GetOptions {
    pub fn allow_stale() -> Self {
        Self {
            allow_stale: true,
            update_access: true,
        }
    }
}

/// The result of a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOutcome<V> {
    pub value: V,
    pub is_stale: bool,
}

/// Why an entry left the cache, passed to the eviction callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Lru,
    Expired,
    Manual,
}

/// Called whenever an entry is evicted, with its key and the cause.
pub type EvictionCallback = Box<dyn Fn(&str, EvictionReason) + Send + Sync>;

/// Point-in-time cache health snapshot (spec §4.8 "Stats").
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub evictions: u64,
    pub expirations: u64,
    pub oldest_entry_at: Option<DateTime<Utc>>,
    pub total_bytes: u64,
    pub average_age: Option<Duration>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
