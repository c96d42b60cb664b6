//! Guild config resolver.
//!
//! Consumers ask for a guild's config; on a cache miss the first caller for a
//! guild publishes a `ConfigRetrievalRequested` event and every concurrent
//! caller for the same guild waits on that one request. The bus handlers for
//! `guild.config.retrieved` / `guild.config.retrieval_failed` feed the answer
//! back through [`GuildConfigResolver::on_config_received`] and friends.
//!
//! ```text
//! Idle ── caller arrives ──► Pending (leader publishes)
//! Pending ── response received ──► Idle (config stored)
//! Pending ── publish fails    ──► Idle (all waiters get Temporary)
//! Pending ── response_timeout ──► Idle (all waiters get Loading)
//! Pending ── clear called     ──► Idle (all waiters get NotFound)
//! ```

use crate::bus::{BusMessage, Publisher, keys, topics};
use crate::cache::GuildConfigCache;
use crate::errors::{ConfigError, Error, Result};
use crate::metrics::ResolverMetrics;
use crate::models::GuildConfig;
use crate::models::events::ConfigRetrievalRequested;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Longest an interaction waits on a lookup. Discord rejects an initial
/// response sent more than 3s after the interaction.
pub const SETUP_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

const PERMANENT_PATTERNS: &[&str] = &[
    "guild not found",
    "guild does not exist",
    "guild not configured",
    "not configured",
    "invalid guild",
    "unauthorized",
    "forbidden",
    "permission denied",
    "guild setup incomplete",
    "setup required",
];

const TEMPORARY_PATTERNS: &[&str] = &[
    "timeout",
    "connection",
    "network",
    "unavailable",
    "busy",
    "rate limit",
    "database",
    "redis",
    "context deadline",
    "context canceled",
    "service unavailable",
    "internal server error",
    "bad gateway",
    "gateway timeout",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Time allowed for publishing the retrieval request.
    pub request_timeout: Duration,
    /// Time allowed for the backend to answer.
    pub response_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(15),
        }
    }
}

impl ResolverSettings {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() || self.response_timeout.is_zero() {
            return Err(Error::Config(
                "guild config timeouts must be positive".to_string(),
            ));
        }
        if self.response_timeout <= self.request_timeout {
            return Err(Error::Config(format!(
                "response_timeout ({:?}) must be greater than request_timeout ({:?})",
                self.response_timeout, self.request_timeout
            )));
        }
        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(format!(
                "request_timeout ({:?}) must not exceed {:?}",
                self.request_timeout, MAX_REQUEST_TIMEOUT
            )));
        }
        if self.response_timeout > MAX_RESPONSE_TIMEOUT {
            return Err(Error::Config(format!(
                "response_timeout ({:?}) must not exceed {:?}",
                self.response_timeout, MAX_RESPONSE_TIMEOUT
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Permanent,
    Temporary,
}

impl ErrorClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Temporary => "temporary",
        }
    }
}

/// Classifies a backend error message. Permanent patterns win over temporary
/// ones; anything unrecognised is temporary. An empty message is not classified.
#[must_use]
pub fn classify_backend_error(message: &str) -> Option<ErrorClass> {
    let message = message.trim().to_lowercase();
    if message.is_empty() {
        return None;
    }
    if PERMANENT_PATTERNS.iter().any(|p| message.contains(p)) {
        return Some(ErrorClass::Permanent);
    }
    if TEMPORARY_PATTERNS.iter().any(|p| message.contains(p)) {
        return Some(ErrorClass::Temporary);
    }
    Some(ErrorClass::Temporary)
}

/// One in-flight retrieval shared by every caller waiting on the same guild.
/// The first delivered outcome wins; later deliveries are ignored.
#[derive(Debug)]
struct PendingConfigRequest {
    outcome: watch::Sender<Option<ConfigResult<GuildConfig>>>,
}

impl PendingConfigRequest {
    fn new() -> Arc<Self> {
        let (outcome, _) = watch::channel(None);
        Arc::new(Self { outcome })
    }

    fn deliver(&self, result: ConfigResult<GuildConfig>) -> bool {
        self.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        })
    }

    async fn wait(&self) -> ConfigResult<GuildConfig> {
        let mut rx = self.outcome.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot
                .as_ref()
                .cloned()
                .unwrap_or_else(|| Err(ConfigError::temporary("request abandoned"))),
            Err(_) => Err(ConfigError::temporary("request abandoned")),
        }
    }
}

pub struct GuildConfigResolver {
    cache: Arc<GuildConfigCache>,
    publisher: Arc<dyn Publisher>,
    pending: DashMap<String, Arc<PendingConfigRequest>>,
    settings: ResolverSettings,
    metrics: ResolverMetrics,
}

impl std::fmt::Debug for GuildConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildConfigResolver")
            .field("settings", &self.settings)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl GuildConfigResolver {
    /// Builds the resolver and installs it as the cache's refresh callback.
    pub fn new(
        cache: Arc<GuildConfigCache>,
        publisher: Arc<dyn Publisher>,
        settings: ResolverSettings,
    ) -> Result<Arc<Self>> {
        settings.validate()?;
        let resolver = Arc::new(Self {
            cache: Arc::clone(&cache),
            publisher,
            pending: DashMap::new(),
            settings,
            metrics: ResolverMetrics::new(),
        });

        let weak: Weak<Self> = Arc::downgrade(&resolver);
        cache.set_refresh_callback(Arc::new(move |guild_id: String| {
            if let Some(resolver) = weak.upgrade() {
                resolver.schedule_refresh(guild_id);
            }
        }));
        Ok(resolver)
    }

    #[must_use]
    pub const fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<GuildConfigCache> {
        &self.cache
    }

    #[must_use]
    pub const fn metrics(&self) -> &ResolverMetrics {
        &self.metrics
    }

    /// Number of guilds with a retrieval in flight.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Returns the guild's config, fetching it over the bus on a miss.
    ///
    /// Cancelling `cancel` only abandons this caller's wait; the shared
    /// request keeps running for everyone else.
    #[instrument(skip(self, cancel))]
    pub async fn get_config(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        guild_id: &str,
    ) -> ConfigResult<GuildConfig> {
        if guild_id.is_empty() {
            return Err(ConfigError::not_found("guild id is required"));
        }
        if let Some(config) = self.cache.get(guild_id)
            && !config.is_placeholder
        {
            return Ok(config);
        }

        let (request, leader) = match self.pending.entry(guild_id.to_string()) {
            Entry::Occupied(e) => (Arc::clone(e.get()), false),
            Entry::Vacant(e) => {
                let request = PendingConfigRequest::new();
                e.insert(Arc::clone(&request));
                (request, true)
            }
        };

        if leader {
            debug!("Leading guild config retrieval");
            let resolver = Arc::clone(self);
            let request = Arc::clone(&request);
            let guild_id = guild_id.to_string();
            tokio::spawn(async move { resolver.coordinate(guild_id, request).await });
        }

        tokio::select! {
            result = request.wait() => result,
            () = cancel.cancelled() => Err(ConfigError::temporary("cancelled")),
        }
    }

    async fn coordinate(self: Arc<Self>, guild_id: String, request: Arc<PendingConfigRequest>) {
        self.cache.mark_request_pending(&guild_id);

        match self.publish_request(&guild_id).await {
            Err(e) => {
                warn!(%guild_id, "Guild config request could not be published: {}", e);
                request.deliver(Err(ConfigError::temporary_with_cause("publish failed", e)));
            }
            Ok(()) => {
                if timeout(self.settings.response_timeout, request.wait())
                    .await
                    .is_err()
                {
                    info!(%guild_id, "Guild config response timed out");
                    request.deliver(Err(ConfigError::Loading {
                        guild_id: guild_id.clone(),
                    }));
                }
            }
        }

        // A newer cycle may already own the slot.
        self.pending
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &request));
        self.cache.remove_placeholder(&guild_id);
        self.cache.clear_request_pending(&guild_id);
    }

    async fn publish_request(&self, guild_id: &str) -> Result<()> {
        let message = BusMessage::from_payload(&ConfigRetrievalRequested {
            guild_id: guild_id.to_string(),
        })?
        .with_metadata(keys::GUILD_ID, guild_id)
        .with_metadata(keys::CORRELATION_ID, Uuid::new_v4().to_string());

        timeout(
            self.settings.request_timeout,
            self.publisher
                .publish(topics::GUILD_CONFIG_RETRIEVAL_REQUESTED, message),
        )
        .await
        .map_err(|_| {
            Error::Publish(format!(
                "retrieval request not published within {:?}",
                self.settings.request_timeout
            ))
        })?
    }

    /// Background refresh for a soft-expired entry. Nobody waits on it; the
    /// pending flag is released if the backend stays silent.
    fn schedule_refresh(self: &Arc<Self>, guild_id: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.cache.clear_request_pending(&guild_id);
            return;
        };
        let resolver = Arc::clone(self);
        runtime.spawn(async move {
            if let Err(e) = resolver.publish_request(&guild_id).await {
                warn!(%guild_id, "Background guild config refresh failed: {}", e);
                resolver.cache.clear_request_pending(&guild_id);
                return;
            }
            tokio::time::sleep(resolver.settings.response_timeout).await;
            resolver.cache.clear_request_pending(&guild_id);
        });
    }

    /// Stores a config sent by the backend and wakes any waiters.
    pub fn on_config_received(&self, guild_id: &str, config: GuildConfig) {
        let mut config = config;
        config.is_placeholder = false;
        if config.guild_id.is_empty() {
            config.guild_id = guild_id.to_string();
        }
        self.cache.set(guild_id, config.clone());
        if let Some(request) = self.pending_request(guild_id) {
            request.deliver(Ok(config));
        }
        debug!(guild_id, "Guild config received");
    }

    pub fn on_retrieval_failed(&self, guild_id: &str, reason: &str, is_permanent: bool) {
        let class = if is_permanent {
            ErrorClass::Permanent
        } else {
            ErrorClass::Temporary
        };
        self.metrics.record_error(class.as_str(), guild_id);

        let error = if is_permanent {
            self.cache.delete(guild_id);
            ConfigError::not_found(reason)
        } else {
            ConfigError::temporary(reason)
        };

        match self.pending_request(guild_id) {
            Some(request) => {
                request.deliver(Err(error));
            }
            None if !is_permanent => self.cache.clear_request_pending(guild_id),
            None => {}
        }
        warn!(guild_id, reason, class = class.as_str(), "Guild config retrieval failed");
    }

    /// Classifies a raw backend error and forwards it. Empty messages are ignored.
    pub fn on_backend_error(&self, guild_id: &str, error: &str) {
        match classify_backend_error(error) {
            Some(class) => self.on_retrieval_failed(guild_id, error, class == ErrorClass::Permanent),
            None => debug!(guild_id, "Ignoring empty backend error"),
        }
    }

    /// Drops the cached config and fails anyone still waiting for it.
    pub fn clear_inflight(&self, guild_id: &str) {
        self.cache.delete(guild_id);
        if let Some(request) = self.pending_request(guild_id) {
            request.deliver(Err(ConfigError::not_found("config deleted/cleared")));
        }
        info!(guild_id, "Cleared guild config");
    }

    pub async fn is_setup_complete(self: &Arc<Self>, guild_id: &str) -> bool {
        let cancel = CancellationToken::new();
        matches!(
            timeout(SETUP_CHECK_TIMEOUT, self.get_config(&cancel, guild_id)).await,
            Ok(Ok(config)) if config.is_configured()
        )
    }

    fn pending_request(&self, guild_id: &str) -> Option<Arc<PendingConfigRequest>> {
        self.pending.get(guild_id).map(|e| Arc::clone(e.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::test_utils::{MemoryPublisher, configured_guild};

    fn resolver_with(
        publisher: &Arc<MemoryPublisher>,
        settings: ResolverSettings,
    ) -> Arc<GuildConfigResolver> {
        let cache = Arc::new(GuildConfigCache::new(CacheSettings::default()).unwrap());
        GuildConfigResolver::new(cache, Arc::clone(publisher) as Arc<dyn Publisher>, settings)
            .unwrap()
    }

    fn resolver(publisher: &Arc<MemoryPublisher>) -> Arc<GuildConfigResolver> {
        resolver_with(publisher, ResolverSettings::default())
    }

    fn retrievals(publisher: &MemoryPublisher) -> usize {
        publisher.count(topics::GUILD_CONFIG_RETRIEVAL_REQUESTED)
    }

    #[test]
    fn test_settings_validation() {
        assert!(ResolverSettings::default().validate().is_ok());
        let cases = [
            (Duration::ZERO, Duration::from_secs(1)),
            (Duration::from_secs(5), Duration::from_secs(5)),
            (Duration::from_secs(61), Duration::from_secs(120)),
            (Duration::from_secs(5), Duration::from_secs(301)),
        ];
        for (request_timeout, response_timeout) in cases {
            let settings = ResolverSettings {
                request_timeout,
                response_timeout,
            };
            assert!(settings.validate().is_err(), "{settings:?} should be rejected");
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_backend_error("timeout"), Some(ErrorClass::Temporary));
        assert_eq!(
            classify_backend_error("guild not configured"),
            Some(ErrorClass::Permanent)
        );
        assert_eq!(classify_backend_error(""), None);
        assert_eq!(
            classify_backend_error("Forbidden: missing access"),
            Some(ErrorClass::Permanent)
        );
        assert_eq!(
            classify_backend_error("something odd happened"),
            Some(ErrorClass::Temporary)
        );
        // Permanent patterns are checked first.
        assert_eq!(
            classify_backend_error("connection says guild not found"),
            Some(ErrorClass::Permanent)
        );
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_publish() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);
        resolver.cache().set("g1", configured_guild("g1"));

        let config = resolver
            .get_config(&CancellationToken::new(), "g1")
            .await
            .unwrap();
        assert_eq!(config.guild_id, "g1");
        assert_eq!(retrievals(&publisher), 0);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_coalesce_into_one_request() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);

        let mut callers = Vec::new();
        for _ in 0..50 {
            let resolver = Arc::clone(&resolver);
            callers.push(tokio::spawn(async move {
                resolver.get_config(&CancellationToken::new(), "g1").await
            }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(retrievals(&publisher), 1);

        let request = &publisher.published_on(topics::GUILD_CONFIG_RETRIEVAL_REQUESTED)[0];
        assert_eq!(request.guild_id(), Some("g1"));
        let payload: ConfigRetrievalRequested = request.decode().unwrap();
        assert_eq!(payload.guild_id, "g1");

        let mut expected = configured_guild("g1");
        expected.signup_emoji = "🥏".to_string();
        resolver.on_config_received("g1", expected.clone());

        for caller in callers {
            let config = caller.await.unwrap().unwrap();
            assert_eq!(config.signup_emoji, expected.signup_emoji);
            assert!(!config.is_placeholder);
        }
        assert_eq!(retrievals(&publisher), 1);
        assert_eq!(resolver.cache().len(), 1);
        assert_eq!(resolver.cache().metrics().pending_requests, 1);
    }

    #[tokio::test]
    async fn test_response_during_publish_is_not_lost() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);
        let weak = Arc::downgrade(&resolver);
        publisher.on_publish(Arc::new(move |_topic: &str, msg: &BusMessage| {
            if let (Some(resolver), Some(guild_id)) = (weak.upgrade(), msg.guild_id()) {
                resolver.on_config_received(guild_id, configured_guild(guild_id));
            }
        }));

        let config = resolver
            .get_config(&CancellationToken::new(), "g7")
            .await
            .unwrap();
        assert!(config.is_configured());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_timeout_surfaces_loading() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver_with(
            &publisher,
            ResolverSettings {
                request_timeout: Duration::from_millis(10),
                response_timeout: Duration::from_millis(20),
            },
        );

        let started = tokio::time::Instant::now();
        let err = resolver
            .get_config(&CancellationToken::new(), "g1")
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(
            err,
            ConfigError::Loading {
                guild_id: "g1".to_string()
            }
        );
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(resolver.pending_requests(), 0);
        assert!(!resolver.cache().contains("g1"));
    }

    #[tokio::test]
    async fn test_permanent_backend_error_is_not_found() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);

        let caller = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.get_config(&CancellationToken::new(), "g1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.on_backend_error("g1", "guild not configured");

        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert_eq!(resolver.metrics().errors_by_type("permanent"), 1);
        assert_eq!(resolver.metrics().errors_for_tenant("g1"), 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!resolver.cache().contains("g1"));
    }

    #[tokio::test]
    async fn test_temporary_failure_reaches_waiters() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);

        let caller = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.get_config(&CancellationToken::new(), "g1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.on_retrieval_failed("g1", "database busy", false);

        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, ConfigError::Temporary { .. }));
        assert_eq!(resolver.metrics().errors_by_type("temporary"), 1);
    }

    #[tokio::test]
    async fn test_empty_backend_error_is_ignored() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);
        resolver.on_backend_error("g1", "  ");
        assert_eq!(resolver.metrics().errors_for_tenant("g1"), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_is_temporary() {
        let publisher = Arc::new(MemoryPublisher::new());
        publisher.fail_with("nats offline");
        let resolver = resolver(&publisher);

        let err = resolver
            .get_config(&CancellationToken::new(), "g1")
            .await
            .unwrap_err();
        match err {
            ConfigError::Temporary { reason, cause } => {
                assert_eq!(reason, "publish failed");
                assert!(cause.unwrap().contains("nats offline"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_abort_peers() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);

        let cancel = CancellationToken::new();
        let cancelled = {
            let resolver = Arc::clone(&resolver);
            let cancel = cancel.clone();
            tokio::spawn(async move { resolver.get_config(&cancel, "g1").await })
        };
        let patient = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.get_config(&CancellationToken::new(), "g1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let err = cancelled.await.unwrap().unwrap_err();
        assert_eq!(err, ConfigError::temporary("cancelled"));

        resolver.on_config_received("g1", configured_guild("g1"));
        assert!(patient.await.unwrap().is_ok());
        assert_eq!(retrievals(&publisher), 1);
    }

    #[tokio::test]
    async fn test_clear_inflight_fails_waiters_and_drops_cache() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);

        let caller = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.get_config(&CancellationToken::new(), "g1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.clear_inflight("g1");

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err, ConfigError::not_found("config deleted/cleared"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!resolver.cache().contains("g1"));
        assert_eq!(resolver.pending_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_expiry_publishes_background_refresh() {
        let publisher = Arc::new(MemoryPublisher::new());
        let cache = Arc::new(
            GuildConfigCache::new(CacheSettings {
                max_size: 10,
                cache_ttl: Duration::from_secs(60),
                refresh_ttl: Duration::from_secs(10),
            })
            .unwrap(),
        );
        let resolver = GuildConfigResolver::new(
            Arc::clone(&cache),
            Arc::clone(&publisher) as Arc<dyn Publisher>,
            ResolverSettings::default(),
        )
        .unwrap();
        cache.set("g1", configured_guild("g1"));
        tokio::time::advance(Duration::from_secs(11)).await;

        let config = resolver
            .get_config(&CancellationToken::new(), "g1")
            .await
            .unwrap();
        assert!(config.is_configured());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(retrievals(&publisher), 1);

        // The flag is released once the backend stays silent long enough.
        tokio::time::sleep(ResolverSettings::default().response_timeout).await;
        resolver.get_config(&CancellationToken::new(), "g1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(retrievals(&publisher), 2);
    }

    #[tokio::test]
    async fn test_is_setup_complete() {
        let publisher = Arc::new(MemoryPublisher::new());
        let resolver = resolver(&publisher);
        resolver.cache().set("ready", configured_guild("ready"));
        resolver.cache().set("partial", GuildConfig::new("partial"));

        assert!(resolver.is_setup_complete("ready").await);
        assert!(!resolver.is_setup_complete("partial").await);
    }
}
