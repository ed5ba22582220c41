//! Bounded Cache Implementation
//!
//! Size- and idle-time-bounded cache on top of Moka. Values are stored as
//! `Option<V>` so that "definitively absent" is cached like any other
//! result, and concurrent loads of one key collapse into a single loader
//! call.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::{debug, trace};

use crate::config::CacheConfig;

/// Bounded, single-flight cache whose entries may record absence
pub struct BoundedCache<K, V> {
    name: String,
    inner: Cache<K, Option<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache bounded by `config`
    pub fn new(name: &str, config: &CacheConfig) -> Self {
        Self::build(name, config, None)
    }

    /// Create a cache that calls `hook` once for every entry it removes.
    ///
    /// The hook runs for capacity and idle evictions, explicit invalidation
    /// and replacement, and receives the removed value.
    pub fn with_eviction_hook<F>(name: &str, config: &CacheConfig, hook: F) -> Self
    where
        F: Fn(&K, Option<V>, RemovalCause) + Send + Sync + 'static,
    {
        Self::build(name, config, Some(Arc::new(hook)))
    }

    #[allow(clippy::type_complexity)]
    fn build(
        name: &str,
        config: &CacheConfig,
        hook: Option<Arc<dyn Fn(&K, Option<V>, RemovalCause) + Send + Sync>>,
    ) -> Self {
        let mut builder = Cache::builder()
            .name(name)
            .max_capacity(config.max_entries)
            .eviction_policy(EvictionPolicy::lru());

        if let Some(idle) = config.time_to_idle {
            builder = builder.time_to_idle(idle);
        }

        if let Some(hook) = hook {
            let cache_name = name.to_string();
            builder = builder.eviction_listener(move |key: Arc<K>, value: Option<V>, cause| {
                trace!(cache = %cache_name, key = ?key, cause = ?cause, "Cache entry removed");
                hook(&key, value, cause);
            });
        }

        debug!(
            cache = name,
            max_entries = config.max_entries,
            time_to_idle = ?config.time_to_idle,
            "Bounded cache initialized"
        );

        Self {
            name: name.to_string(),
            inner: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get the cached result for `key`, running `loader` on a miss.
    ///
    /// A `None` from the loader is cached. While a load for `key` is in
    /// flight, other callers for the same key wait for it instead of
    /// invoking their own loader.
    pub fn get_or_load<F>(&self, key: &K, loader: F) -> Option<V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let mut loaded = false;
        let value = self.inner.get_with(key.clone(), || {
            loaded = true;
            loader(key)
        });
        self.record(key, loaded);
        value
    }

    /// Like [`get_or_load`](Self::get_or_load) for fallible loaders.
    ///
    /// `Ok(None)` is cached as absence; an `Err` is returned to every
    /// waiting caller and nothing is cached, so the next call retries.
    pub fn try_get_or_load<F, E>(&self, key: &K, loader: F) -> Result<Option<V>, Arc<E>>
    where
        F: FnOnce(&K) -> Result<Option<V>, E>,
        E: Send + Sync + 'static,
    {
        let mut loaded = false;
        let result = self.inner.try_get_with(key.clone(), || {
            loaded = true;
            loader(key)
        });
        self.record(key, loaded);
        result
    }

    fn record(&self, key: &K, loaded: bool) {
        if loaded {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(cache = %self.name, key = ?key, "Cache MISS");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(cache = %self.name, key = ?key, "Cache HIT");
        }
    }

    /// Peek without loading: `None` if unknown, `Some(None)` if known absent
    pub fn get(&self, key: &K) -> Option<Option<V>> {
        self.inner.get(key)
    }

    /// Insert or replace a result
    pub fn insert(&self, key: K, value: Option<V>) {
        self.inner.insert(key, value);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
        debug!(cache = %self.name, key = ?key, "Invalidated cache entry");
    }

    /// Drop every entry; eviction hooks fire as entries are removed
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!(cache = %self.name, "Cleared cache");
    }

    /// Apply pending evictions now instead of on a later cache operation
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get cache statistics
    ///
    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let (hits, misses, hit_rate) = self.stats();
        debug!(
            cache = %self.name,
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            entries = self.inner.entry_count(),
            "Cache metrics"
        );
    }
}
