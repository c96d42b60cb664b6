//! NATS JetStream transport.
//!
//! Metadata travels as NATS headers. Each routed topic gets a durable pull
//! consumer named after the environment's consumer group, so several edge
//! instances share the work and a restart resumes where the last one stopped.

use super::{BusMessage, Publisher, topics};
use crate::config::NatsSettings;
use crate::errors::{Error, Result};
use crate::router::Router;
use async_nats::HeaderMap;
use async_nats::jetstream::{self, AckKind, consumer::pull, stream};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const UUID_HEADER: &str = "Nats-Msg-Id";

pub struct NatsBus {
    jetstream: jetstream::Context,
    settings: NatsSettings,
}

impl NatsBus {
    pub async fn connect(settings: &NatsSettings) -> Result<Self> {
        info!("Connecting to NATS servers: {:?}", settings.servers);

        let servers: Vec<&str> = settings.servers.iter().map(String::as_str).collect();
        let client = async_nats::ConnectOptions::new()
            .name("frolf-bot")
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Connected => info!("Connected to NATS"),
                    async_nats::Event::Disconnected => warn!("Disconnected from NATS"),
                    async_nats::Event::ClientError(e) => warn!("NATS client error: {}", e),
                    _ => {}
                }
            })
            .retry_on_initial_connect()
            .max_reconnects(None)
            .connect(servers)
            .await
            .map_err(|e| Error::Bus(format!("Failed to connect to NATS: {e}")))?;

        Ok(Self {
            jetstream: jetstream::new(client),
            settings: settings.clone(),
        })
    }

    /// Creates the stream if missing. Safe to call on every startup.
    pub async fn ensure_stream(&self) -> Result<()> {
        self.jetstream
            .get_or_create_stream(stream::Config {
                name: self.settings.stream.clone(),
                subjects: topics::ALL.iter().map(ToString::to_string).collect(),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::Bus(format!("Failed to ensure stream {}: {e}", self.settings.stream)))?;
        info!(stream = %self.settings.stream, "JetStream stream ready");
        Ok(())
    }

    /// `guild-handlers-<env>` plus the topic, since a durable consumer
    /// filters exactly one subject here.
    #[must_use]
    pub fn consumer_name(&self, topic: &str) -> String {
        format!(
            "{}-{}",
            consumer_group(&self.settings.environment),
            topic.replace('.', "-")
        )
    }

    /// Consumes every routed topic until `shutdown` fires. Each message is
    /// dispatched on the router's task tracker; the outcome decides ack/nak.
    pub async fn serve(
        self: Arc<Self>,
        router: Arc<Router>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let stream = self
            .jetstream
            .get_stream(&self.settings.stream)
            .await
            .map_err(|e| Error::Bus(format!("Failed to open stream: {e}")))?;

        let mut consumers = Vec::new();
        for topic in router.topics() {
            let name = self.consumer_name(&topic);
            let consumer: jetstream::consumer::Consumer<pull::Config> = stream
                .get_or_create_consumer(
                    &name,
                    pull::Config {
                        durable_name: Some(name.clone()),
                        filter_subject: topic.clone(),
                        max_deliver: self.settings.max_deliver,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| Error::Bus(format!("Failed to create consumer {name}: {e}")))?;
            consumers.push((topic, consumer));
        }

        let mut loops = JoinSet::new();
        for (topic, consumer) in consumers {
            loops.spawn(consume_topic(topic, consumer, Arc::clone(&router), shutdown.clone()));
        }
        wait_for_consumers(loops, &shutdown).await
    }
}

/// Consumer loops only end on their own when the subscription is gone for
/// good. Any loop stopping before shutdown stops the edge.
async fn wait_for_consumers(mut loops: JoinSet<Result<()>>, shutdown: &CancellationToken) -> Result<()> {
    while let Some(joined) = loops.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Consumer loop ended with error: {}", e),
            Err(e) => error!("Consumer loop panicked: {}", e),
        }
        if !shutdown.is_cancelled() {
            return Err(Error::Bus("consumer loop stopped before shutdown".to_string()));
        }
    }
    Ok(())
}

async fn consume_topic(
    topic: String,
    consumer: jetstream::consumer::Consumer<pull::Config>,
    router: Arc<Router>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut messages = consumer
        .messages()
        .await
        .map_err(|e| Error::Bus(format!("Failed to pull from {topic}: {e}")))?;
    info!(%topic, "Listening for messages");

    let tracker = router.tracker();
    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => break,
            next = messages.next() => next,
        };
        let Some(next) = next else {
            break;
        };
        let msg = match next {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%topic, "Failed to receive message: {}", e);
                continue;
            }
        };

        let router = Arc::clone(&router);
        let topic = topic.clone();
        tracker.spawn(async move {
            let bus_message = to_bus_message(&msg.headers, &msg.payload);
            let ack = match router.dispatch(&topic, bus_message).await {
                Ok(()) => msg.ack().await,
                Err(e) if !e.should_redeliver() => {
                    debug!(%topic, "Acking message that cannot succeed: {}", e);
                    msg.ack().await
                }
                Err(e) => {
                    warn!(%topic, "Handler failed, requesting redelivery: {}", e);
                    msg.ack_with(AckKind::Nak(None)).await
                }
            };
            if let Err(e) = ack {
                error!(%topic, "Failed to acknowledge message: {}", e);
            }
        });
    }
    debug!(%topic, "Consumer loop stopped");
    Ok(())
}

#[must_use]
pub fn consumer_group(environment: &str) -> String {
    format!("guild-handlers-{environment}")
}

fn to_headers(message: &BusMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(UUID_HEADER, message.uuid.as_str());
    for (key, value) in &message.metadata {
        headers.insert(key.as_str(), value.as_str());
    }
    headers
}

fn to_bus_message(headers: &Option<HeaderMap>, payload: &[u8]) -> BusMessage {
    let mut message = BusMessage::new(payload.to_vec());
    if let Some(headers) = headers {
        for (name, values) in headers.iter() {
            let Some(value) = values.first() else {
                continue;
            };
            let name = name.to_string();
            if name == UUID_HEADER {
                message.uuid = value.as_str().to_string();
            } else {
                message.set_metadata(&name, value.as_str());
            }
        }
    }
    message
}

#[async_trait]
impl Publisher for NatsBus {
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()> {
        let headers = to_headers(&message);
        trace!(
            topic,
            uuid = %message.uuid,
            size = message.payload.len(),
            "Publishing message"
        );
        let ack = self
            .jetstream
            .publish_with_headers(topic.to_string(), headers, message.payload.into())
            .await
            .map_err(|e| Error::Publish(format!("Failed to publish to {topic}: {e}")))?;
        ack.await
            .map_err(|e| Error::Publish(format!("Publish to {topic} was not acknowledged: {e}")))?;
        debug!(topic, "Published message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::keys;

    #[test]
    fn test_consumer_group_is_keyed_by_environment() {
        assert_eq!(consumer_group("prod"), "guild-handlers-prod");
    }

    #[test]
    fn test_headers_round_trip_metadata_and_uuid() {
        let original = BusMessage::new(b"{}".to_vec())
            .with_metadata(keys::CORRELATION_ID, "c1")
            .with_metadata(keys::GUILD_ID, "g1");
        let headers = Some(to_headers(&original));
        let restored = to_bus_message(&headers, &original.payload);

        assert_eq!(restored.uuid, original.uuid);
        assert_eq!(restored.correlation_id(), Some("c1"));
        assert_eq!(restored.guild_id(), Some("g1"));
        assert_eq!(restored.payload, original.payload);
    }

    #[tokio::test]
    async fn test_consumers_run_until_shutdown() {
        let shutdown = CancellationToken::new();
        let mut loops = JoinSet::new();
        for _ in 0..2 {
            let shutdown = shutdown.clone();
            loops.spawn(async move {
                shutdown.cancelled().await;
                Ok(())
            });
        }
        let waiting = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { wait_for_consumers(loops, &shutdown).await }
        });

        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());
        shutdown.cancel();
        assert!(waiting.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_consumer_stopping_early_is_an_error() {
        let shutdown = CancellationToken::new();
        let mut loops = JoinSet::new();
        loops.spawn(async { Err(Error::Bus("subscription closed".to_string())) });
        {
            let shutdown = shutdown.clone();
            loops.spawn(async move {
                shutdown.cancelled().await;
                Ok(())
            });
        }

        let err = wait_for_consumers(loops, &shutdown).await.unwrap_err();
        assert!(matches!(err, Error::Bus(_)));
    }

    #[test]
    fn test_message_without_headers_gets_fresh_uuid() {
        let restored = to_bus_message(&None, b"{}");
        assert!(restored.metadata.is_empty());
        assert!(!restored.uuid.is_empty());
    }
}
