//! The LRU+TTL cache itself (spec §4.8). `Cache<V>` owns both the
//! intrusive LRU list and the key index; every mutation (`set`, `get`,
//! eviction) goes through `&mut self`, matching spec §5's "single owner per
//! instance" rule — callers that need shared access wrap it in
//! `Arc<Mutex<Cache<V>>>` (see [`SharedCache`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::list::IntrusiveList;
use crate::types::{
    CacheConfig, CacheStats, EvictionCallback, EvictionReason, GetOptions, GetOutcome, SetOptions,
};

struct Slot<V> {
    key: String,
    value: V,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    stale_until: DateTime<Utc>,
    size_bytes: Option<u64>,
    access_count: u64,
    last_accessed_at: DateTime<Utc>,
}

/// `Arc<Mutex<Cache<V>>>`, for callers (the service executor's cache-aside
/// wrapper) that need to share one cache instance across concurrent tasks.
pub type SharedCache<V> = Arc<Mutex<Cache<V>>>;

pub struct Cache<V> {
    config: CacheConfig,
    index: HashMap<String, usize>,
    list: IntrusiveList<Slot<V>>,
    total_bytes: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    on_evict: Option<EvictionCallback>,
}

impl<V> Cache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            index: HashMap::new(),
            list: IntrusiveList::new(),
            total_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
            on_evict: None,
        }
    }

    pub fn shared(config: CacheConfig) -> SharedCache<V> {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn with_eviction_callback(mut self, callback: EvictionCallback) -> Self {
        self.on_evict = Some(callback);
        self
    }

    /// Insert or overwrite `key`. On overwrite, the prior entry's byte
    /// accounting is subtracted before the new size is added (spec §4.8
    /// "On overwrite, subtract prior bytes"). Eviction runs afterward if the
    /// entry count or byte budget is now exceeded.
    pub fn set(&mut self, key: impl Into<String>, value: V, options: SetOptions) {
        let key = key.into();
        let now = Utc::now();
        let expires_at = now + options.ttl;
        let stale_until = expires_at + options.stale_window.unwrap_or_else(Duration::zero);

        if let Some(&idx) = self.index.get(&key) {
            if let Some(prev_bytes) = self.list.get(idx).and_then(|s| s.size_bytes) {
                self.total_bytes = self.total_bytes.saturating_sub(prev_bytes);
            }
            let slot = self.list.get_mut(idx).expect("indexed slot must exist");
            slot.value = value;
            slot.cached_at = now;
            slot.expires_at = expires_at;
            slot.stale_until = stale_until;
            slot.size_bytes = options.size_bytes;
            slot.last_accessed_at = now;
            self.list.move_to_back(idx);
            if let Some(bytes) = options.size_bytes {
                self.total_bytes += bytes;
            }
        } else {
            if let Some(max_size) = self.config.max_size {
                while self.index.len() >= max_size {
                    if !self.evict_lru() {
                        break;
                    }
                }
            }
            let slot = Slot {
                key: key.clone(),
                value,
                cached_at: now,
                expires_at,
                stale_until,
                size_bytes: options.size_bytes,
                access_count: 0,
                last_accessed_at: now,
            };
            let idx = self.list.push_back(slot);
            self.index.insert(key, idx);
            if let Some(bytes) = options.size_bytes {
                self.total_bytes += bytes;
            }
        }

        if let Some(max_bytes) = self.config.max_total_bytes {
            while self.total_bytes > max_bytes {
                if !self.evict_lru() {
                    break;
                }
            }
        }
    }

    /// Look up `key`. Expired-beyond-stale entries are deleted and counted
    /// as both an expiration and a miss; stale-but-within-window entries
    /// miss unless `allow_stale` is set (spec §4.8 `get`).
    pub fn get(&mut self, key: &str, options: GetOptions) -> Option<GetOutcome<V>>
    where
        V: Clone,
    {
        let idx = match self.index.get(key).copied() {
            Some(idx) => idx,
            None => {
                self.misses += 1;
                return None;
            }
        };
        let now = Utc::now();
        let (expires_at, stale_until) = {
            let slot = self.list.get(idx).expect("indexed slot must exist");
            (slot.expires_at, slot.stale_until)
        };

        if now > stale_until {
            self.remove_internal(idx, EvictionReason::Expired);
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        let is_stale = now > expires_at;
        if is_stale && !options.allow_stale {
            self.misses += 1;
            return None;
        }

        if options.update_access {
            self.list.move_to_back(idx);
            let slot = self.list.get_mut(idx).expect("indexed slot must exist");
            slot.access_count += 1;
            slot.last_accessed_at = now;
        }

        self.hits += 1;
        let value = self.list.get(idx).expect("indexed slot must exist").value.clone();
        Some(GetOutcome { value, is_stale })
    }

    /// Explicit removal; does not count as an eviction or expiration.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.remove_internal(idx, EvictionReason::Manual);
                true
            }
            None => false,
        }
    }

    /// Remove every entry past its `staleUntil` (spec §4.8 `prune`, "may
    /// run on a timer"). Returns the number of entries removed.
    pub fn prune(&mut self) -> usize {
        let now = Utc::now();
        let stale_keys: Vec<String> = self
            .list
            .iter()
            .filter(|slot| now > slot.stale_until)
            .map(|slot| slot.key.clone())
            .collect();
        for key in &stale_keys {
            if let Some(idx) = self.index.get(key).copied() {
                self.remove_internal(idx, EvictionReason::Expired);
                self.expirations += 1;
            }
        }
        stale_keys.len()
    }

    pub fn get_many(&mut self, keys: &[String], options: GetOptions) -> HashMap<String, GetOutcome<V>>
    where
        V: Clone,
    {
        let mut out = HashMap::new();
        for key in keys {
            if let Some(outcome) = self.get(key, options) {
                out.insert(key.clone(), outcome);
            }
        }
        out
    }

    pub fn set_many(&mut self, entries: Vec<(String, V, SetOptions)>) {
        for (key, value, options) in entries {
            self.set(key, value, options);
        }
    }

    /// Keys currently present (including stale-but-unexpired ones), optionally
    /// filtered by a glob pattern with `*` as the only wildcard.
    pub fn keys(&self, pattern: Option<&str>) -> Vec<String> {
        self.list
            .iter()
            .map(|slot| slot.key.clone())
            .filter(|key| pattern.is_none_or(|p| glob_match(p, key)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop every entry and reset all counters (spec §4.8 "Resettable via
    /// clear").
    pub fn clear(&mut self) {
        self.index.clear();
        self.list = IntrusiveList::new();
        self.total_bytes = 0;
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
        self.expirations = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut age_sum = Duration::zero();
        let mut count = 0i64;
        for slot in self.list.iter() {
            oldest = Some(match oldest {
                Some(current) if current <= slot.cached_at => current,
                _ => slot.cached_at,
            });
            age_sum = age_sum + (now - slot.cached_at);
            count += 1;
        }
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.index.len(),
            evictions: self.evictions,
            expirations: self.expirations,
            oldest_entry_at: oldest,
            total_bytes: self.total_bytes,
            average_age: (count > 0).then(|| age_sum / count as i32),
        }
    }

    fn evict_lru(&mut self) -> bool {
        match self.list.front() {
            Some(idx) => {
                self.remove_internal(idx, EvictionReason::Lru);
                self.evictions += 1;
                true
            }
            None => false,
        }
    }

    fn remove_internal(&mut self, idx: usize, reason: EvictionReason) {
        let slot = self.list.remove(idx);
        self.index.remove(&slot.key);
        if let Some(bytes) = slot.size_bytes {
            self.total_bytes = self.total_bytes.saturating_sub(bytes);
        }
        trace!(key = %slot.key, ?reason, "cache entry evicted");
        if let Some(callback) = &self.on_evict {
            callback(&slot.key, reason);
        }
    }
}

/// Minimal glob matcher supporting `*` as the only wildcard, applied to the
/// whole key (spec §4.8 "`keys(pattern?)` supports glob-style `*`").
fn glob_match(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(segment) {
                return false;
            }
            rest = &rest[segment.len()..];
        } else if i == segments.len() - 1 {
            if !rest.ends_with(segment) {
                return false;
            }
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(ttl_secs: i64) -> SetOptions {
        SetOptions::new(Duration::seconds(ttl_secs))
    }

    #[test]
    fn set_then_get_is_fresh_hit() {
        let mut cache: Cache<&str> = Cache::new(CacheConfig::default());
        cache.set("k", "v", opts(60));
        let outcome = cache.get("k", GetOptions::default()).unwrap();
        assert_eq!(outcome.value, "v");
        assert!(!outcome.is_stale);
    }

    #[test]
    fn get_past_stale_until_is_a_miss_and_removes_entry() {
        let mut cache: Cache<&str> = Cache::new(CacheConfig::default());
        cache.set("k", "v", SetOptions::new(Duration::seconds(-10)));
        assert!(cache.get("k", GetOptions::default()).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn stale_within_window_misses_unless_allow_stale() {
        let mut cache: Cache<&str> = Cache::new(CacheConfig::default());
        cache.set(
            "k",
            "v",
            SetOptions::new(Duration::seconds(-1)).with_stale_window(Duration::seconds(60)),
        );
        assert!(cache.get("k", GetOptions::default()).is_none());
        let outcome = cache.get("k", GetOptions::allow_stale()).unwrap();
        assert!(outcome.is_stale);
    }

    #[test]
    fn lru_eviction_drops_least_recently_used() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let evicted_clone = evicted.clone();
        let mut cache: Cache<i32> = Cache::new(CacheConfig::default().with_max_size(3))
            .with_eviction_callback(Box::new(move |key, reason| {
                evicted_clone.lock().unwrap().push((key.to_string(), reason));
            }));
        cache.set("a", 1, opts(60));
        cache.set("b", 2, opts(60));
        cache.set("c", 3, opts(60));
        cache.get("a", GetOptions::default());
        cache.set("d", 4, opts(60));

        let mut remaining = cache.keys(None);
        remaining.sort();
        assert_eq!(remaining, vec!["a", "c", "d"]);
        assert_eq!(evicted.lock().unwrap()[0], ("b".to_string(), EvictionReason::Lru));
    }

    #[test]
    fn size_cap_is_never_exceeded() {
        let mut cache: Cache<i32> = Cache::new(CacheConfig::default().with_max_size(2));
        for i in 0..10 {
            cache.set(format!("k{i}"), i, opts(60));
            assert!(cache.len() <= 2);
        }
    }

    #[test]
    fn overwrite_subtracts_prior_bytes() {
        let mut cache: Cache<i32> = Cache::new(CacheConfig::unbounded());
        cache.set("k", 1, opts(60).with_size_bytes(100));
        cache.set("k", 2, opts(60).with_size_bytes(40));
        assert_eq!(cache.stats().total_bytes, 40);
    }

    #[test]
    fn byte_cap_evicts_lru_until_under_budget() {
        let mut cache: Cache<i32> =
            Cache::new(CacheConfig::unbounded().with_max_total_bytes(150));
        cache.set("a", 1, opts(60).with_size_bytes(100));
        cache.set("b", 2, opts(60).with_size_bytes(100));
        assert_eq!(cache.keys(None), vec!["b".to_string()]);
        assert_eq!(cache.stats().total_bytes, 100);
    }

    #[test]
    fn prune_removes_only_entries_past_stale_until() {
        let mut cache: Cache<i32> = Cache::new(CacheConfig::default());
        cache.set("fresh", 1, opts(60));
        cache.set("dead", 2, SetOptions::new(Duration::seconds(-10)));
        let removed = cache.prune();
        assert_eq!(removed, 1);
        assert_eq!(cache.keys(None), vec!["fresh".to_string()]);
    }

    #[test]
    fn glob_pattern_filters_keys() {
        let mut cache: Cache<i32> = Cache::new(CacheConfig::default());
        cache.set("user:1", 1, opts(60));
        cache.set("user:2", 2, opts(60));
        cache.set("order:1", 3, opts(60));
        let mut matched = cache.keys(Some("user:*"));
        matched.sort();
        assert_eq!(matched, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[test]
    fn hit_rate_reflects_hits_and_misses() {
        let mut cache: Cache<i32> = Cache::new(CacheConfig::default());
        cache.set("k", 1, opts(60));
        cache.get("k", GetOptions::default());
        cache.get("missing", GetOptions::default());
        let stats = cache.stats();
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
