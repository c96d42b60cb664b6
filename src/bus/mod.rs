//! Message bus plumbing: the envelope type, the publish port, the topic
//! catalogue and the NATS JetStream transport.

/// Bus message envelope and metadata keys
pub mod message;
/// NATS JetStream transport
pub mod nats;
/// Topic name constants
pub mod topics;

pub use message::{BusMessage, keys};
pub use nats::NatsBus;

use crate::errors::Result;
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Publish side of the bus. Implementations must be safe to share between tasks.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()>;
}

/// Runs a bus serve loop. A transport failure takes the whole edge down; a
/// clean return leaves shutdown to whoever owns `shutdown`.
pub async fn supervise<F>(serve: F, shutdown: CancellationToken) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let result = serve.await;
    if let Err(e) = &result {
        error!("Bus stopped: {}", e);
        shutdown.cancel();
    }
    result
}
