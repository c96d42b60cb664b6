//! `/frolf-setup`: prepares channels, roles and the signup message, then
//! asks the backend to create the guild config. Completion is reported by
//! the `guild.config.created` handler.

use crate::bot::BotData;
use crate::bot::registry::InteractionHandler;
use crate::bot::session::InteractionReply;
use crate::bus::{BusMessage, keys, topics};
use crate::errors::Result;
use crate::models::DiscordInteraction;
use crate::models::events::GuildSetupRequested;
use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const SIGNUP_CHANNEL: &str = "frolf-signup";
pub const EVENTS_CHANNEL: &str = "frolf-events";
pub const LEADERBOARD_CHANNEL: &str = "frolf-leaderboard";
pub const ADMIN_ROLE: &str = "Frolf Admin";
pub const EDITOR_ROLE: &str = "Frolf Editor";
pub const PLAYER_ROLE: &str = "Frolf Player";
pub const DEFAULT_SIGNUP_EMOJI: &str = "🥏";
/// Optional command option overriding the signup emoji
pub const EMOJI_OPTION: &str = "signup_emoji";

pub const MSG_SETUP_STARTED: &str = "Setting up frolf for this server...";

#[derive(Debug, Default)]
pub struct Setup;

/// Channel name and the topic set on it when the channel is created.
const CHANNELS: [(&str, &str); 3] = [
    (SIGNUP_CHANNEL, "React to the pinned message to join frolf rounds"),
    (EVENTS_CHANNEL, "Upcoming frolf rounds"),
    (LEADERBOARD_CHANNEL, "Frolf standings"),
];

async fn channel_id(data: &BotData, guild_id: &str, (name, topic): (&str, &str)) -> Result<String> {
    let existing = data.session.guild_channels(guild_id).await?;
    if let Some(channel) = existing.into_iter().find(|c| c.name == name) {
        return Ok(channel.id);
    }
    let created = data.session.guild_channel_create(guild_id, name).await?;
    info!(channel = name, id = %created.id, "Created channel");
    if let Err(e) = data.session.channel_edit(&created.id, topic).await {
        warn!(channel = name, "Could not set channel topic: {}", e);
    }
    Ok(created.id)
}

/// A rerun posts a fresh signup message; the one from the last setup goes.
async fn remove_previous_signup(data: &BotData, guild_id: &str) {
    let Some(previous) = data.resolver.cache().get(guild_id) else {
        return;
    };
    if previous.signup_channel_id.is_empty() || previous.signup_message_id.is_empty() {
        return;
    }
    if let Err(e) = data
        .session
        .channel_message_delete(&previous.signup_channel_id, &previous.signup_message_id)
        .await
    {
        warn!(guild_id, "Could not delete the previous signup message: {}", e);
    }
}

async fn role_id(data: &BotData, guild_id: &str, name: &str) -> Result<String> {
    let existing = data.session.guild_roles(guild_id).await?;
    if let Some(role) = existing.into_iter().find(|r| r.name == name) {
        return Ok(role.id);
    }
    let created = data.session.guild_role_create(guild_id, name).await?;
    info!(role = name, id = %created.id, "Created role");
    Ok(created.id)
}

#[instrument(skip(data))]
async fn prepare(data: &BotData, guild_id: &str, emoji: &str, requested_by: &str) -> Result<GuildSetupRequested> {
    let [signup, events, leaderboard] = CHANNELS;
    let signup_channel_id = channel_id(data, guild_id, signup).await?;
    let event_channel_id = channel_id(data, guild_id, events).await?;
    let leaderboard_channel_id = channel_id(data, guild_id, leaderboard).await?;
    let admin_role_id = role_id(data, guild_id, ADMIN_ROLE).await?;
    let editor_role_id = role_id(data, guild_id, EDITOR_ROLE).await?;
    let registered_role_id = role_id(data, guild_id, PLAYER_ROLE).await?;

    remove_previous_signup(data, guild_id).await;
    let signup_message_id = data
        .session
        .channel_message_send(
            &signup_channel_id,
            &format!("React with {emoji} to sign up for frolf rounds!"),
            &[],
        )
        .await?;
    data.session
        .message_reaction_add(&signup_channel_id, &signup_message_id, emoji)
        .await?;

    Ok(GuildSetupRequested {
        guild_id: guild_id.to_string(),
        signup_channel_id,
        event_channel_id,
        leaderboard_channel_id,
        admin_role_id,
        editor_role_id,
        registered_role_id,
        signup_emoji: emoji.to_string(),
        signup_message_id,
        requested_by: requested_by.to_string(),
    })
}

#[async_trait]
impl InteractionHandler for Setup {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()> {
        let handle = interaction.handle();
        data.session
            .interaction_respond(&handle, InteractionReply::DeferredEphemeral)
            .await?;

        let emoji = interaction
            .option(EMOJI_OPTION)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_SIGNUP_EMOJI);
        let request = match prepare(data, &interaction.guild_id, emoji, interaction.user_id()).await {
            Ok(request) => request,
            Err(e) => {
                warn!(guild_id = %interaction.guild_id, "Setup preparation failed: {}", e);
                data.session
                    .interaction_response_edit(&handle, &format!("Setup failed: {e}"))
                    .await?;
                return Err(e);
            }
        };

        let correlation_id = Uuid::new_v4().to_string();
        data.interactions.set(&correlation_id, handle.clone(), None)?;
        let message = BusMessage::from_payload(&request)?
            .with_metadata(keys::CORRELATION_ID, correlation_id.as_str())
            .with_metadata(keys::GUILD_ID, interaction.guild_id.as_str())
            .with_metadata(keys::REQUESTING_USER_ID, interaction.user_id());
        if let Err(e) = data.publisher.publish(topics::GUILD_SETUP, message).await {
            data.interactions.delete(&correlation_id);
            data.session
                .interaction_response_edit(&handle, "Setup could not be submitted, please try again")
                .await?;
            return Err(e);
        }

        info!(guild_id = %interaction.guild_id, %correlation_id, "Guild setup requested");
        data.session
            .interaction_response_edit(&handle, MSG_SETUP_STARTED)
            .await
    }
}
