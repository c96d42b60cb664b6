//! Typed handler adapter.
//!
//! [`wrap`] turns `async fn(BusMessage, P) -> Result<Vec<BusMessage>>` into a
//! [`BusHandler`]: the payload is decoded once into `P`, the call runs inside a
//! span, panics are caught, counters are recorded and the inbound
//! `correlation_id` / `guild_id` are copied onto every output.

use crate::bus::{BusMessage, keys};
use crate::errors::{Error, Result};
use crate::metrics::HandlerMetrics;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info_span, warn};

pub type HandlerResult = Result<Vec<BusMessage>>;

/// A wrapped handler: raw message in, raw outputs out.
pub type BusHandler = Arc<dyn Fn(BusMessage) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

pub fn wrap<P, F, Fut>(name: &str, metrics: Arc<HandlerMetrics>, handler: F) -> BusHandler
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(BusMessage, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let name: Arc<str> = Arc::from(name);
    let handler = Arc::new(handler);
    Arc::new(move |message: BusMessage| {
        let name = Arc::clone(&name);
        let handler = Arc::clone(&handler);
        let metrics = Arc::clone(&metrics);
        let span = info_span!(
            "handler",
            handler = %name,
            correlation_id = message.correlation_id().unwrap_or_default(),
            guild_id = message.guild_id().unwrap_or_default(),
        );
        async move { invoke::<P, F, Fut>(&name, &metrics, handler.as_ref(), message).await }
            .instrument(span)
            .boxed()
    })
}

async fn invoke<P, F, Fut>(
    name: &str,
    metrics: &HandlerMetrics,
    handler: &F,
    message: BusMessage,
) -> HandlerResult
where
    P: DeserializeOwned,
    F: Fn(BusMessage, P) -> Fut,
    Fut: Future<Output = HandlerResult>,
{
    metrics.record_attempt(name);
    let started = Instant::now();

    let payload: P = match message.decode() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Payload failed to decode");
            metrics.record_failure(name, started.elapsed());
            return Err(Error::validation(format!("{name}: {e}")));
        }
    };

    let correlation_id = message.correlation_id().map(ToString::to_string);
    let guild_id = message.guild_id().map(ToString::to_string);

    let outcome = AssertUnwindSafe(async { handler(message, payload).await })
        .catch_unwind()
        .await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(mut outputs)) => {
            for output in &mut outputs {
                propagate(output, keys::CORRELATION_ID, correlation_id.as_deref());
                propagate(output, keys::GUILD_ID, guild_id.as_deref());
            }
            metrics.record_success(name, elapsed);
            debug!(outputs = outputs.len(), ?elapsed, "Handler finished");
            Ok(outputs)
        }
        Ok(Err(e)) => {
            metrics.record_failure(name, elapsed);
            warn!(error = %e, kind = ?e.kind(), "Handler failed");
            Err(e)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            metrics.record_panic(name);
            metrics.record_failure(name, elapsed);
            error!(panic = %message, "Handler panicked");
            Err(Error::HandlerPanic {
                handler: name.to_string(),
                message,
            })
        }
    }
}

/// Outputs that already carry a value keep it.
fn propagate(output: &mut BusMessage, key: &str, value: Option<&str>) {
    if let Some(value) = value
        && output.metadata(key).is_none()
    {
        output.set_metadata(key, value);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Ping {
        n: u32,
    }

    fn inbound(payload: &[u8]) -> BusMessage {
        BusMessage::new(payload.to_vec())
            .with_metadata(keys::CORRELATION_ID, "c1")
            .with_metadata(keys::GUILD_ID, "g1")
    }

    #[tokio::test]
    async fn test_outputs_inherit_correlation_and_guild() {
        let metrics = Arc::new(HandlerMetrics::new());
        let handler = wrap("Echo", Arc::clone(&metrics), |_msg: BusMessage, ping: Ping| async move {
            let first = BusMessage::new(ping.n.to_string().into_bytes());
            let second =
                BusMessage::new(Vec::new()).with_metadata(keys::GUILD_ID, "explicit-guild");
            Ok(vec![first, second])
        });

        let outputs = handler(inbound(br#"{"n":7}"#)).await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].correlation_id(), Some("c1"));
        assert_eq!(outputs[0].guild_id(), Some("g1"));
        assert_eq!(outputs[0].payload, b"7");
        assert_eq!(outputs[1].guild_id(), Some("explicit-guild"));
        assert_eq!(metrics.snapshot("Echo").successes, 1);
    }

    #[tokio::test]
    async fn test_bad_payload_is_validation_error() {
        let metrics = Arc::new(HandlerMetrics::new());
        let handler = wrap("Echo", Arc::clone(&metrics), |_msg: BusMessage, _ping: Ping| async {
            Ok(Vec::new())
        });

        let err = handler(inbound(b"{\"n\":\"seven\"}")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(!err.should_redeliver());
        assert_eq!(metrics.snapshot("Echo").failures, 1);
    }

    #[tokio::test]
    async fn test_panics_are_recovered() {
        let metrics = Arc::new(HandlerMetrics::new());
        let handler = wrap("Boom", Arc::clone(&metrics), |_msg: BusMessage, ping: Ping| async move {
            if ping.n > 0 {
                panic!("exploded on {}", ping.n);
            }
            Ok(Vec::new())
        });

        let err = handler(inbound(br#"{"n":3}"#)).await.unwrap_err();
        match err {
            Error::HandlerPanic { handler, message } => {
                assert_eq!(handler, "Boom");
                assert_eq!(message, "exploded on 3");
            }
            other => panic!("unexpected {other:?}"),
        }
        let snap = metrics.snapshot("Boom");
        assert_eq!(snap.panics, 1);
        assert_eq!(snap.failures, 1);
    }

    #[tokio::test]
    async fn test_handler_errors_pass_through() {
        let metrics = Arc::new(HandlerMetrics::new());
        let handler = wrap("Fails", metrics, |_msg: BusMessage, _ping: Ping| async {
            Err(Error::Publish("broker down".to_string()))
        });
        let err = handler(inbound(br#"{"n":1}"#)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PublishError);
    }
}
