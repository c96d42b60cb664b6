//! In-process counters for bus handlers and the guild config resolver.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct HandlerStats {
    invocations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    panics: AtomicU64,
    latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerSnapshot {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub panics: u64,
    pub total_latency: Duration,
}

/// Per-handler invocation counters.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
    stats: DashMap<String, Arc<HandlerStats>>,
}

impl HandlerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stats(&self, handler: &str) -> Arc<HandlerStats> {
        if let Some(stats) = self.stats.get(handler) {
            return Arc::clone(stats.value());
        }
        Arc::clone(
            self.stats
                .entry(handler.to_string())
                .or_default()
                .value(),
        )
    }

    pub fn record_attempt(&self, handler: &str) {
        self.stats(handler)
            .invocations
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, handler: &str, elapsed: Duration) {
        let stats = self.stats(handler);
        stats.successes.fetch_add(1, Ordering::Relaxed);
        add_latency(&stats, elapsed);
    }

    pub fn record_failure(&self, handler: &str, elapsed: Duration) {
        let stats = self.stats(handler);
        stats.failures.fetch_add(1, Ordering::Relaxed);
        add_latency(&stats, elapsed);
    }

    /// A panic also counts as a failure.
    pub fn record_panic(&self, handler: &str) {
        self.stats(handler).panics.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, handler: &str) -> HandlerSnapshot {
        self.stats.get(handler).map_or_else(HandlerSnapshot::default, |s| {
            HandlerSnapshot {
                invocations: s.invocations.load(Ordering::Relaxed),
                successes: s.successes.load(Ordering::Relaxed),
                failures: s.failures.load(Ordering::Relaxed),
                panics: s.panics.load(Ordering::Relaxed),
                total_latency: Duration::from_micros(s.latency_micros.load(Ordering::Relaxed)),
            }
        })
    }
}

fn add_latency(stats: &HandlerStats, elapsed: Duration) {
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    stats.latency_micros.fetch_add(micros, Ordering::Relaxed);
}

/// Resolver failures keyed by classification and by tenant.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    by_type: DashMap<String, AtomicU64>,
    by_tenant: DashMap<String, AtomicU64>,
}

impl ResolverMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, classification: &str, guild_id: &str) {
        self.by_type
            .entry(classification.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        self.by_tenant
            .entry(guild_id.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn errors_by_type(&self, classification: &str) -> u64 {
        self.by_type
            .get(classification)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn errors_for_tenant(&self, guild_id: &str) -> u64 {
        self.by_tenant
            .get(guild_id)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_counters_accumulate() {
        let metrics = HandlerMetrics::new();
        metrics.record_attempt("h");
        metrics.record_success("h", Duration::from_millis(3));
        metrics.record_attempt("h");
        metrics.record_panic("h");
        metrics.record_failure("h", Duration::from_millis(2));

        let snap = metrics.snapshot("h");
        assert_eq!(snap.invocations, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.panics, 1);
        assert_eq!(snap.total_latency, Duration::from_millis(5));
        assert_eq!(metrics.snapshot("unknown"), HandlerSnapshot::default());
    }

    #[test]
    fn test_resolver_errors_by_type_and_tenant() {
        let metrics = ResolverMetrics::new();
        metrics.record_error("permanent", "g1");
        metrics.record_error("temporary", "g1");
        metrics.record_error("permanent", "g2");

        assert_eq!(metrics.errors_by_type("permanent"), 2);
        assert_eq!(metrics.errors_by_type("temporary"), 1);
        assert_eq!(metrics.errors_for_tenant("g1"), 2);
        assert_eq!(metrics.errors_for_tenant("g3"), 0);
    }
}
