//! Inbound metadata middleware, applied in order before a handler runs.

use crate::bus::{BusMessage, keys, topics};
use tracing::trace;
use uuid::Uuid;

/// What a middleware knows about the route being served.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub topic: &'a str,
    pub handler_name: &'a str,
}

pub type Middleware = fn(BusMessage, &RouteContext<'_>) -> BusMessage;

pub const CHAIN: &[Middleware] = &[
    inject_correlation_id,
    common_metadata,
    extract_tenant,
    routing_metadata,
];

#[must_use]
pub fn apply(message: BusMessage, route: &RouteContext<'_>) -> BusMessage {
    CHAIN.iter().fold(message, |message, step| step(message, route))
}

/// Messages from older producers may lack a correlation ID.
#[must_use]
pub fn inject_correlation_id(mut message: BusMessage, _route: &RouteContext<'_>) -> BusMessage {
    if message.correlation_id().is_none() {
        let id = Uuid::new_v4().to_string();
        trace!(correlation_id = %id, "Injected correlation id");
        message.set_metadata(keys::CORRELATION_ID, id);
    }
    message
}

#[must_use]
pub fn common_metadata(mut message: BusMessage, route: &RouteContext<'_>) -> BusMessage {
    message.set_metadata(keys::HANDLER_NAME, route.handler_name);
    message.set_metadata(keys::DOMAIN, topics::domain_of(route.topic));
    message
}

/// Falls back to the payload's `guild_id` field when the metadata has none.
#[must_use]
pub fn extract_tenant(mut message: BusMessage, _route: &RouteContext<'_>) -> BusMessage {
    if message.guild_id().is_some() {
        return message;
    }
    let guild_id = serde_json::from_slice::<serde_json::Value>(&message.payload)
        .ok()
        .and_then(|v| v.get("guild_id").and_then(|g| g.as_str()).map(ToString::to_string))
        .filter(|g| !g.is_empty());
    if let Some(guild_id) = guild_id {
        message.set_metadata(keys::GUILD_ID, guild_id);
    }
    message
}

#[must_use]
pub fn routing_metadata(mut message: BusMessage, route: &RouteContext<'_>) -> BusMessage {
    message.set_metadata(keys::RECEIVED_TOPIC, route.topic);
    message
}
