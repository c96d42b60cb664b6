//! Correlation store: short-lived request context keyed by correlation ID.
//!
//! A user interaction stores its reply handle here before the request goes out
//! on the bus; whichever process instance handles the backend's answer looks
//! the handle up again by the correlation ID carried in the message metadata.
//! Entries expire lazily on access and via an optional background sweep.

use crate::errors::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Discord interaction tokens are valid for 15 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent TTL map, one instance per stored value type.
#[derive(Debug)]
pub struct CorrelationStore<V> {
    entries: DashMap<String, Entry<V>>,
    default_ttl: Duration,
}

impl<V> Default for CorrelationStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> CorrelationStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::validation("correlation key must not be empty"));
        }
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        trace!(key, "Stored correlation entry");
        Ok(())
    }

    /// Returns a clone of the live value without removing it.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }
        // Expired: drop it, but only if nobody refreshed it in between.
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    /// Idempotent.
    pub fn delete(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            trace!(key, "Deleted correlation entry");
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

    /// Removes every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Runs `purge_expired` every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Swept expired correlation entries");
                        }
                    }
                }
            }
        })
    }
}
