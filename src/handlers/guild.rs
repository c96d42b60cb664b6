//! Guild config lifecycle events from the backend.

use super::find_interaction;
use crate::bot::BotData;
use crate::bus::BusMessage;
use crate::models::events::{
    GuildConfigChanged, GuildConfigDeleted, GuildConfigOperationFailed, GuildConfigRetrievalFailed,
    GuildConfigRetrieved,
};
use crate::router::HandlerResult;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub const MSG_SETUP_COMPLETE: &str =
    "Frolf setup complete! Your server's commands are now available.";
pub const MSG_SETTINGS_UPDATED: &str = "Server settings updated.";

pub async fn config_retrieved(
    data: Arc<BotData>,
    _message: BusMessage,
    payload: GuildConfigRetrieved,
) -> HandlerResult {
    data.resolver
        .on_config_received(&payload.guild_id, payload.config);
    Ok(Vec::new())
}

pub async fn config_retrieval_failed(
    data: Arc<BotData>,
    _message: BusMessage,
    payload: GuildConfigRetrievalFailed,
) -> HandlerResult {
    match payload.is_permanent {
        Some(is_permanent) => {
            data.resolver
                .on_retrieval_failed(&payload.guild_id, &payload.reason, is_permanent);
        }
        None => data.resolver.on_backend_error(&payload.guild_id, &payload.reason),
    }
    Ok(Vec::new())
}

/// Edits the interaction this reply belongs to and forgets it. A failed edit
/// keeps the entry so a redelivery can try again.
async fn reply(data: &BotData, message: &BusMessage, guild_id: &str, content: &str) -> HandlerResult {
    let Some((key, handle)) = find_interaction(data, message, guild_id) else {
        info!(guild_id, "No pending interaction for guild reply");
        return Ok(Vec::new());
    };
    data.session
        .interaction_response_edit(&handle, content)
        .await?;
    data.interactions.delete(&key);
    Ok(Vec::new())
}

#[instrument(skip_all, fields(guild_id = %payload.guild_id))]
pub async fn config_created(
    data: Arc<BotData>,
    message: BusMessage,
    payload: GuildConfigChanged,
) -> HandlerResult {
    data.resolver
        .on_config_received(&payload.guild_id, payload.config);

    if let Err(e) = data.lifecycle.register_all(&payload.guild_id).await {
        error!("Could not register guild commands: {}", e);
        return Err(e);
    }
    reply(&data, &message, &payload.guild_id, MSG_SETUP_COMPLETE).await
}

pub async fn config_creation_failed(
    data: Arc<BotData>,
    message: BusMessage,
    payload: GuildConfigOperationFailed,
) -> HandlerResult {
    warn!(guild_id = %payload.guild_id, reason = %payload.reason, "Guild setup failed");
    reply(
        &data,
        &message,
        &payload.guild_id,
        &format!("Setup failed: {}", payload.reason),
    )
    .await
}

pub async fn config_updated(
    data: Arc<BotData>,
    message: BusMessage,
    payload: GuildConfigChanged,
) -> HandlerResult {
    data.resolver
        .on_config_received(&payload.guild_id, payload.config);
    reply(&data, &message, &payload.guild_id, MSG_SETTINGS_UPDATED).await
}

pub async fn config_update_failed(
    data: Arc<BotData>,
    message: BusMessage,
    payload: GuildConfigOperationFailed,
) -> HandlerResult {
    warn!(guild_id = %payload.guild_id, reason = %payload.reason, "Guild config update failed");
    reply(
        &data,
        &message,
        &payload.guild_id,
        &format!("Could not update settings: {}", payload.reason),
    )
    .await
}

#[instrument(skip_all, fields(guild_id = %payload.guild_id))]
pub async fn config_deleted(
    data: Arc<BotData>,
    _message: BusMessage,
    payload: GuildConfigDeleted,
) -> HandlerResult {
    data.resolver.clear_inflight(&payload.guild_id);
    data.lifecycle.unregister_all(&payload.guild_id).await?;
    info!("Guild config deleted");
    Ok(Vec::new())
}

pub async fn config_deletion_failed(
    _data: Arc<BotData>,
    _message: BusMessage,
    payload: GuildConfigOperationFailed,
) -> HandlerResult {
    warn!(guild_id = %payload.guild_id, reason = %payload.reason, "Guild config deletion failed");
    Ok(Vec::new())
}
