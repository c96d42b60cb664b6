//! Bus router: topic → handler table, inbound middleware, output-topic policy.

/// Inbound metadata middleware
pub mod middleware;
/// Output-topic policy table
pub mod policy;
/// Typed handler adapter
pub mod wrapper;

pub use policy::{Rule, TopicPolicy, handler};
pub use wrapper::{BusHandler, HandlerResult, wrap};

use crate::bus::{BusMessage, Publisher};
use crate::errors::{Error, Result};
use crate::metrics::HandlerMetrics;
use middleware::RouteContext;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{Duration, timeout};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

struct Route {
    handler_name: String,
    handler: BusHandler,
}

pub struct Router {
    routes: BTreeMap<String, Route>,
    policy: TopicPolicy,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<HandlerMetrics>,
    handler_timeout: Duration,
    tracker: TaskTracker,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("topics", &self.routes.keys().collect::<Vec<_>>())
            .field("handler_timeout", &self.handler_timeout)
            .finish_non_exhaustive()
    }
}

impl Router {
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, policy: TopicPolicy, handler_timeout: Duration) -> Self {
        Self {
            routes: BTreeMap::new(),
            policy,
            publisher,
            metrics: Arc::new(HandlerMetrics::new()),
            handler_timeout,
            tracker: TaskTracker::new(),
        }
    }

    /// Registers an already wrapped handler. One handler per topic.
    pub fn add_handler(&mut self, handler_name: &str, topic: &str, handler: BusHandler) -> Result<()> {
        if self.routes.contains_key(topic) {
            return Err(Error::Config(format!(
                "topic {topic} already has a handler"
            )));
        }
        self.routes.insert(
            topic.to_string(),
            Route {
                handler_name: handler_name.to_string(),
                handler,
            },
        );
        debug!(topic, handler = handler_name, "Registered bus handler");
        Ok(())
    }

    /// Wraps a typed handler and registers it.
    pub fn handle<P, F, Fut>(&mut self, handler_name: &str, topic: &str, f: F) -> Result<()>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(BusMessage, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = wrap(handler_name, Arc::clone(&self.metrics), f);
        self.add_handler(handler_name, topic, handler)
    }

    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    #[must_use]
    pub fn handler_name(&self, topic: &str) -> Option<&str> {
        self.routes.get(topic).map(|r| r.handler_name.as_str())
    }

    #[must_use]
    pub const fn metrics(&self) -> &Arc<HandlerMetrics> {
        &self.metrics
    }

    /// Tracker for in-flight work; [`Router::close`] waits on it.
    #[must_use]
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    #[must_use]
    pub fn get_publish_topic(&self, handler_name: &str, message: &BusMessage) -> Option<String> {
        self.policy.resolve(handler_name, message)
    }

    /// Runs the handler for `topic` and publishes its outputs in order.
    ///
    /// An error means the inbound message should not be acked as done; the
    /// transport decides between ack and redelivery with
    /// [`Error::should_redeliver`].
    #[instrument(skip(self, message), fields(uuid = %message.uuid))]
    pub async fn dispatch(&self, topic: &str, message: BusMessage) -> Result<()> {
        let Some(route) = self.routes.get(topic) else {
            warn!("No handler registered for topic");
            return Err(Error::validation(format!("no handler for topic {topic}")));
        };
        let handler_name = route.handler_name.as_str();
        let message = middleware::apply(
            message,
            &RouteContext {
                topic,
                handler_name,
            },
        );
        info!(
            handler = handler_name,
            guild_id = message.guild_id().unwrap_or_default(),
            correlation_id = message.correlation_id().unwrap_or_default(),
            "Dispatching bus message"
        );

        let started = Instant::now();
        let outputs = match timeout(self.handler_timeout, (route.handler)(message)).await {
            Ok(result) => result?,
            Err(_) => {
                self.metrics.record_failure(handler_name, started.elapsed());
                warn!(handler = handler_name, "Handler exceeded its deadline");
                return Err(Error::HandlerTimeout(handler_name.to_string()));
            }
        };

        for output in outputs {
            let Some(out_topic) = self.get_publish_topic(handler_name, &output) else {
                if matches!(self.policy.rule(handler_name), Some(Rule::UiOnly)) {
                    debug!(handler = handler_name, "Discarding output of UI-only handler");
                } else {
                    warn!(
                        handler = handler_name,
                        uuid = %output.uuid,
                        "No output topic for handler result, dropping message"
                    );
                }
                continue;
            };
            info!(handler = handler_name, topic = %out_topic, "Publishing handler output");
            self.publisher.publish(&out_topic, output).await?;
        }
        Ok(())
    }

    /// Stops accepting work and waits for in-flight handlers to finish.
    pub async fn close(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        info!("Router drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{keys, topics};
    use crate::errors::ErrorKind;
    use crate::test_utils::MemoryPublisher;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct Note {
        guild_id: String,
        text: String,
    }

    fn router(publisher: &Arc<MemoryPublisher>) -> Router {
        Router::new(
            Arc::clone(publisher) as Arc<dyn Publisher>,
            TopicPolicy::standard(),
            Duration::from_secs(30),
        )
    }

    fn note(text: &str) -> BusMessage {
        BusMessage::from_payload(&Note {
            guild_id: "g1".to_string(),
            text: text.to_string(),
        })
        .unwrap()
        .with_metadata(keys::CORRELATION_ID, "c1")
    }

    #[tokio::test]
    async fn test_outputs_go_to_policy_topic_in_order() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut router = router(&publisher);
        router
            .handle(
                handler::SCORE_OVERRIDE,
                topics::SCORE_OVERRIDE_SUCCEEDED,
                |_msg: BusMessage, note: Note| async move {
                    Ok(vec![
                        BusMessage::new(format!("{}-1", note.text).into_bytes())
                            .with_metadata(keys::TOPIC, "ignored.hint"),
                        BusMessage::new(format!("{}-2", note.text).into_bytes()),
                    ])
                },
            )
            .unwrap();

        router
            .dispatch(topics::SCORE_OVERRIDE_SUCCEEDED, note("x"))
            .await
            .unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|(t, _)| t == topics::ROUND_PARTICIPANT_SCORE_UPDATED));
        assert_eq!(published[0].1.payload, b"x-1");
        assert_eq!(published[1].1.payload, b"x-2");
        // Tenant came from the payload, correlation from the inbound metadata.
        assert_eq!(published[0].1.guild_id(), Some("g1"));
        assert_eq!(published[1].1.correlation_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unknown_handler_without_hint_is_dropped() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut router = router(&publisher);
        router
            .handle("HandleExperimental", "experimental.topic", |_m: BusMessage, _n: Note| async {
                Ok(vec![
                    BusMessage::new(Vec::new()),
                    BusMessage::new(Vec::new()).with_metadata(keys::TOPIC, "legacy.out"),
                ])
            })
            .unwrap();

        router.dispatch("experimental.topic", note("x")).await.unwrap();
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "legacy.out");
    }

    #[tokio::test]
    async fn test_ui_only_outputs_are_not_published() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut router = router(&publisher);
        router
            .handle(
                handler::GUILD_CONFIG_CREATED,
                topics::GUILD_CONFIG_CREATED,
                |_m: BusMessage, _n: Note| async { Ok(vec![BusMessage::new(Vec::new())]) },
            )
            .unwrap();
        router
            .dispatch(topics::GUILD_CONFIG_CREATED, note("x"))
            .await
            .unwrap();
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let publisher = Arc::new(MemoryPublisher::new());
        publisher.fail_with("broker down");
        let mut router = router(&publisher);
        router
            .handle(
                handler::SCORE_UPDATED,
                topics::ROUND_SCORE_UPDATED,
                |_m: BusMessage, _n: Note| async { Ok(vec![BusMessage::new(Vec::new())]) },
            )
            .unwrap();

        let err = router
            .dispatch(topics::ROUND_SCORE_UPDATED, note("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PublishError);
        assert!(err.should_redeliver());
    }

    #[tokio::test]
    async fn test_unknown_topic_and_duplicate_registration() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut router = router(&publisher);
        let err = router.dispatch("nobody.listens", note("x")).await.unwrap_err();
        assert!(!err.should_redeliver());

        router
            .handle("A", "t", |_m: BusMessage, _n: Note| async { Ok(Vec::new()) })
            .unwrap();
        assert!(
            router
                .handle("B", "t", |_m: BusMessage, _n: Note| async { Ok(Vec::new()) })
                .is_err()
        );
        assert_eq!(router.topics(), vec!["t".to_string()]);
        assert_eq!(router.handler_name("t"), Some("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_deadline() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut router = Router::new(
            Arc::clone(&publisher) as Arc<dyn Publisher>,
            TopicPolicy::standard(),
            Duration::from_secs(1),
        );
        router
            .handle("Slow", "slow.topic", |_m: BusMessage, _n: Note| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Vec::new())
            })
            .unwrap();

        let err = router.dispatch("slow.topic", note("x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandlerTimeout);
        assert!(err.should_redeliver());
    }

    #[tokio::test]
    async fn test_close_drains_in_flight_work() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut router = router(&publisher);
        let done = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&done);
        router
            .handle("Counting", "count.topic", move |_m: BusMessage, _n: Note| {
                let seen = Arc::clone(&seen);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                }
            })
            .unwrap();
        let router = Arc::new(router);

        for _ in 0..3 {
            let router_ref = Arc::clone(&router);
            router.tracker().spawn(async move {
                let _ = router_ref.dispatch("count.topic", note("x")).await;
            });
        }
        router.close().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
