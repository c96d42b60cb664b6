//! Reaction-based signup. The registry only routes reactions that match the
//! guild's configured signup channel, message and emoji.

use crate::bot::BotData;
use crate::bot::registry::InteractionHandler;
use crate::bus::{BusMessage, keys, topics};
use crate::errors::Result;
use crate::models::DiscordInteraction;
use crate::models::events::UserSignupRequested;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Default)]
pub struct SignupReaction;

#[async_trait]
impl InteractionHandler for SignupReaction {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()> {
        let request = UserSignupRequested {
            guild_id: interaction.guild_id.clone(),
            user_id: interaction.user_id().to_string(),
        };
        let message = BusMessage::from_payload(&request)?
            .with_metadata(keys::GUILD_ID, interaction.guild_id.as_str())
            .with_metadata(keys::CHANNEL_ID, interaction.channel_id.as_str())
            .with_metadata(keys::REQUESTING_USER_ID, interaction.user_id());
        data.publisher
            .publish(topics::USER_SIGNUP_REQUESTED, message)
            .await?;
        info!(guild_id = %request.guild_id, user_id = %request.user_id, "Signup requested");
        Ok(())
    }
}
