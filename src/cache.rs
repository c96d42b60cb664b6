//! Guild config cache.
//!
//! Values live in a sharded concurrent map so readers never wait on writers of
//! other guilds. Recency is tracked separately in an LRU list behind a short
//! mutex; every structural change (insert, evict, delete) takes that mutex so
//! the map and the list always hold the same key set. The per-entry
//! `is_request_pending` flag is flipped with compare-and-swap on the entry's
//! config pointer and never touches the mutex.

use crate::errors::{Error, Result};
use crate::models::GuildConfig;
use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const MAX_CAS_ATTEMPTS: usize = 10;

/// Called with the guild ID whenever a stale entry needs a background refresh.
pub type RefreshCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_size: usize,
    /// Hard expiry: older entries are treated as missing.
    pub cache_ttl: Duration,
    /// Soft expiry: older entries are served but trigger a refresh.
    pub refresh_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            cache_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::Config("cache max_size must be positive".to_string()));
        }
        if self.refresh_ttl.is_zero() || self.refresh_ttl >= self.cache_ttl {
            return Err(Error::Config(format!(
                "cache refresh_ttl ({:?}) must be positive and shorter than cache_ttl ({:?})",
                self.refresh_ttl, self.cache_ttl
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        (self.cache_ttl / 4).max(Duration::from_millis(1))
    }
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub pending_requests: u64,
    pub pending_cleared: u64,
    pub hit_ratio: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    pending_requests: AtomicU64,
    pending_cleared: AtomicU64,
}

#[derive(Debug)]
struct Slot {
    config: ArcSwap<GuildConfig>,
    cached_at: Instant,
    refreshed_at: Instant,
}

impl Slot {
    fn new(config: GuildConfig, now: Instant) -> Arc<Self> {
        Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            cached_at: now,
            refreshed_at: now,
        })
    }
}

pub struct GuildConfigCache {
    entries: DashMap<String, Arc<Slot>>,
    lru: Mutex<LruCache<String, ()>>,
    settings: CacheSettings,
    counters: Counters,
    refresh_callback: RwLock<Option<RefreshCallback>>,
}

impl std::fmt::Debug for GuildConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildConfigCache")
            .field("len", &self.entries.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl GuildConfigCache {
    pub fn new(settings: CacheSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            entries: DashMap::new(),
            lru: Mutex::new(LruCache::unbounded()),
            settings,
            counters: Counters::default(),
            refresh_callback: RwLock::new(None),
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn set_refresh_callback(&self, callback: RefreshCallback) {
        *self.refresh_callback.write() = Some(callback);
    }

    /// Looks up a guild. Hard-expired entries are dropped and reported as a
    /// miss; soft-expired entries are still returned but schedule a refresh.
    pub fn get(&self, guild_id: &str) -> Option<GuildConfig> {
        let Some(slot) = self.slot(guild_id) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let now = Instant::now();
        if now.duration_since(slot.cached_at) > self.settings.cache_ttl {
            self.remove_slot(guild_id, &slot);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            trace!(guild_id, "Guild config expired");
            return None;
        }

        let config = slot.config.load_full();
        // A placeholder only marks a retrieval in flight.
        if config.is_placeholder {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.lru.lock().promote(guild_id);

        if now.duration_since(slot.refreshed_at) > self.settings.refresh_ttl
            && !config.is_request_pending
            && self.mark_request_pending(guild_id)
        {
            self.trigger_refresh(guild_id);
        }

        Some(GuildConfig::clone(&config))
    }

    /// Inserts or replaces a guild's config, stamping both timestamps.
    pub fn set(&self, guild_id: &str, mut config: GuildConfig) {
        let stamp = Utc::now();
        config.cached_at = Some(stamp);
        config.refreshed_at = Some(stamp);
        config.is_request_pending = false;
        if config.guild_id.is_empty() {
            config.guild_id = guild_id.to_string();
        }

        let slot = Slot::new(config, Instant::now());
        let mut lru = self.lru.lock();
        if let Some(previous) = self.insert_locked(&mut lru, guild_id, slot)
            && previous.config.load().is_request_pending
        {
            self.counters.pending_cleared.fetch_add(1, Ordering::Relaxed);
        }
        trace!(guild_id, "Cached guild config");
    }

    pub fn delete(&self, guild_id: &str) {
        let mut lru = self.lru.lock();
        self.entries.remove(guild_id);
        lru.pop(guild_id);
    }

    /// Claims the refresh for a guild. Returns `true` only for the caller that
    /// flipped the flag (or created the pending placeholder).
    pub fn mark_request_pending(&self, guild_id: &str) -> bool {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(slot) = self.slot(guild_id) else {
                let mut lru = self.lru.lock();
                if self.entries.contains_key(guild_id) {
                    continue;
                }
                let mut placeholder = GuildConfig::placeholder(guild_id);
                placeholder.is_request_pending = true;
                let stamp = Utc::now();
                placeholder.cached_at = Some(stamp);
                placeholder.refreshed_at = Some(stamp);
                self.insert_locked(&mut lru, guild_id, Slot::new(placeholder, Instant::now()));
                self.counters.pending_requests.fetch_add(1, Ordering::Relaxed);
                return true;
            };

            let current = slot.config.load_full();
            if current.is_request_pending {
                return false;
            }
            let mut next = GuildConfig::clone(&current);
            next.is_request_pending = true;
            let previous = slot.config.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                self.counters.pending_requests.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        warn!(guild_id, "Gave up marking guild config request pending after CAS retries");
        false
    }

    pub fn clear_request_pending(&self, guild_id: &str) {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(slot) = self.slot(guild_id) else {
                return;
            };
            let current = slot.config.load_full();
            if !current.is_request_pending {
                return;
            }
            let mut next = GuildConfig::clone(&current);
            next.is_request_pending = false;
            let previous = slot.config.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                self.counters.pending_cleared.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        warn!(guild_id, "Gave up clearing guild config pending flag after CAS retries");
    }

    /// Drops the entry only if it is still a placeholder.
    pub fn remove_placeholder(&self, guild_id: &str) {
        if let Some(slot) = self.slot(guild_id)
            && slot.config.load().is_placeholder
        {
            self.remove_slot(guild_id, &slot);
        }
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_ratio = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        CacheMetrics {
            hits,
            misses,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            pending_requests: self.counters.pending_requests.load(Ordering::Relaxed),
            pending_cleared: self.counters.pending_cleared.load(Ordering::Relaxed),
            hit_ratio,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, guild_id: &str) -> bool {
        self.entries.contains_key(guild_id)
    }

    /// Removes hard-expired entries. Keys are collected first so no lock is
    /// held across the whole scan.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(String, Arc<Slot>)> = self
            .entries
            .iter()
            .filter(|e| now.duration_since(e.value().cached_at) > self.settings.cache_ttl)
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        let count = expired.len();
        for (guild_id, slot) in expired {
            self.remove_slot(&guild_id, &slot);
        }
        count
    }

    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let interval = self.settings.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Swept expired guild configs");
                        }
                    }
                }
            }
        })
    }

    fn slot(&self, guild_id: &str) -> Option<Arc<Slot>> {
        self.entries.get(guild_id).map(|e| Arc::clone(e.value()))
    }

    fn trigger_refresh(&self, guild_id: &str) {
        let callback = self.refresh_callback.read().clone();
        match callback {
            Some(callback) => {
                debug!(guild_id, "Scheduling background guild config refresh");
                callback(guild_id.to_string());
            }
            None => self.clear_request_pending(guild_id),
        }
    }

    /// Caller holds the LRU lock.
    fn insert_locked(
        &self,
        lru: &mut LruCache<String, ()>,
        guild_id: &str,
        slot: Arc<Slot>,
    ) -> Option<Arc<Slot>> {
        let previous = self.entries.insert(guild_id.to_string(), slot);
        lru.put(guild_id.to_string(), ());
        while lru.len() > self.settings.max_size {
            let Some((evicted, ())) = lru.pop_lru() else {
                break;
            };
            self.entries.remove(&evicted);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(guild_id = %evicted, "Evicted least recently used guild config");
        }
        previous
    }

    /// Removes `slot` unless a newer one replaced it in the meantime.
    fn remove_slot(&self, guild_id: &str, slot: &Arc<Slot>) {
        let mut lru = self.lru.lock();
        if self
            .entries
            .remove_if(guild_id, |_, current| Arc::ptr_eq(current, slot))
            .is_some()
        {
            lru.pop(guild_id);
        }
    }

    /// Map keys and LRU keys, both sorted. Used to check the two stay in step.
    #[cfg(test)]
    pub(crate) fn key_sets(&self) -> (Vec<String>, Vec<String>) {
        let lru = self.lru.lock();
        let mut map_keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut lru_keys: Vec<String> = lru.iter().map(|(k, _)| k.clone()).collect();
        map_keys.sort();
        lru_keys.sort();
        (map_keys, lru_keys)
    }
}
