//! `/dashboard`: asks the auth service for a magic link. The link itself
//! arrives later on the bus and is delivered by the magic-link handler.

use crate::bot::BotData;
use crate::bot::registry::InteractionHandler;
use crate::bot::session::InteractionReply;
use crate::bus::{BusMessage, keys, topics};
use crate::errors::Result;
use crate::models::DiscordInteraction;
use crate::models::events::MagicLinkRequested;
use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

pub const MSG_LINK_FAILED: &str = "Could not request a dashboard link, please try again";

#[derive(Debug, Default)]
pub struct Dashboard;

#[async_trait]
impl InteractionHandler for Dashboard {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()> {
        let handle = interaction.handle();
        data.session
            .interaction_respond(&handle, InteractionReply::DeferredEphemeral)
            .await?;

        // The policy check has just loaded the config, so this is a cache hit.
        let config = data.resolver.cache().get(&interaction.guild_id);
        let role = data
            .permissions
            .map_member_to_level(&interaction.member, config.as_ref());

        let correlation_id = Uuid::new_v4().to_string();
        data.interactions.set(&correlation_id, handle.clone(), None)?;

        let request = MagicLinkRequested {
            user_id: interaction.user_id().to_string(),
            guild_id: interaction.guild_id.clone(),
            role,
            correlation_id: correlation_id.clone(),
        };
        let message = BusMessage::from_payload(&request)?
            .with_metadata(keys::CORRELATION_ID, correlation_id.as_str())
            .with_metadata(keys::GUILD_ID, interaction.guild_id.as_str())
            .with_metadata(keys::INTERACTION_ID, interaction.id.as_str())
            .with_metadata(keys::REQUESTING_USER_ID, interaction.user_id());

        if let Err(e) = data
            .publisher
            .publish(topics::AUTH_MAGIC_LINK_REQUESTED, message)
            .await
        {
            warn!(%correlation_id, "Magic link request not published: {}", e);
            data.interactions.delete(&correlation_id);
            data.session
                .interaction_response_edit(&handle, MSG_LINK_FAILED)
                .await?;
            return Err(e);
        }
        info!(%correlation_id, role = %role, "Requested dashboard magic link");
        Ok(())
    }
}
