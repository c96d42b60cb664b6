//! Bus handlers: react to backend events by updating local state and
//! Discord, and translate Discord-originated requests into backend requests.

/// Magic link delivery
pub mod auth;
/// Guild config lifecycle
pub mod guild;
/// Round creation, RSVP and scores
pub mod round;

use crate::bot::BotData;
use crate::bus::{BusMessage, topics};
use crate::errors::Result;
use crate::models::InteractionHandle;
use crate::router::{HandlerResult, Router, handler};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

fn route<P, F, Fut>(router: &mut Router, data: &Arc<BotData>, name: &str, topic: &str, f: F) -> Result<()>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(Arc<BotData>, BusMessage, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let data = Arc::clone(data);
    router.handle(name, topic, move |message: BusMessage, payload: P| {
        f(Arc::clone(&data), message, payload)
    })
}

/// Registers every bus handler the edge runs.
pub fn register_all(router: &mut Router, data: &Arc<BotData>) -> Result<()> {
    route(router, data, handler::GUILD_CONFIG_RETRIEVED, topics::GUILD_CONFIG_RETRIEVED, guild::config_retrieved)?;
    route(
        router,
        data,
        handler::GUILD_CONFIG_RETRIEVAL_FAILED,
        topics::GUILD_CONFIG_RETRIEVAL_FAILED,
        guild::config_retrieval_failed,
    )?;
    route(router, data, handler::GUILD_CONFIG_CREATED, topics::GUILD_CONFIG_CREATED, guild::config_created)?;
    route(
        router,
        data,
        handler::GUILD_CONFIG_CREATION_FAILED,
        topics::GUILD_CONFIG_CREATION_FAILED,
        guild::config_creation_failed,
    )?;
    route(router, data, handler::GUILD_CONFIG_UPDATED, topics::GUILD_CONFIG_UPDATED, guild::config_updated)?;
    route(
        router,
        data,
        handler::GUILD_CONFIG_UPDATE_FAILED,
        topics::GUILD_CONFIG_UPDATE_FAILED,
        guild::config_update_failed,
    )?;
    route(router, data, handler::GUILD_CONFIG_DELETED, topics::GUILD_CONFIG_DELETED, guild::config_deleted)?;
    route(
        router,
        data,
        handler::GUILD_CONFIG_DELETION_FAILED,
        topics::GUILD_CONFIG_DELETION_FAILED,
        guild::config_deletion_failed,
    )?;

    route(router, data, handler::MAGIC_LINK_GENERATED, topics::AUTH_MAGIC_LINK_GENERATED, auth::magic_link_generated)?;

    route(
        router,
        data,
        handler::CREATE_ROUND_REQUESTED,
        topics::DISCORD_ROUND_CREATION_REQUESTED,
        round::create_round_requested,
    )?;
    route(router, data, handler::ROUND_CREATED, topics::ROUND_CREATED, round::round_created)?;
    route(
        router,
        data,
        handler::PARTICIPANT_JOIN_REQUEST,
        topics::DISCORD_ROUND_PARTICIPANT_JOIN_REQUESTED,
        round::participant_join_request,
    )?;
    route(router, data, handler::SCORE_UPDATED, topics::ROUND_SCORE_UPDATED, round::score_updated)?;
    route(router, data, handler::SCORE_OVERRIDE, topics::SCORE_OVERRIDE_SUCCEEDED, round::score_override)?;
    Ok(())
}

/// Finds the deferred interaction a reply belongs to: by correlation ID,
/// then once by guild ID for entries stored under the tenant key. Returns
/// the key it was found under so the caller can delete it.
pub(crate) fn find_interaction(
    data: &BotData,
    message: &BusMessage,
    guild_id: &str,
) -> Option<(String, InteractionHandle)> {
    if let Some(correlation_id) = message.correlation_id()
        && let Some(handle) = data.interactions.get(correlation_id)
    {
        return Some((correlation_id.to_string(), handle));
    }
    let handle = data.interactions.get(guild_id)?;
    debug!(guild_id, "Interaction found under the guild key");
    Some((guild_id.to_string(), handle))
}
