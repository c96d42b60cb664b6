//! Round creation and RSVP interactions.
//!
//! `/createround` opens a modal; the submission is forwarded raw to the bus
//! and validated by the `discord.round.creation.requested` handler, which
//! also answers the deferred interaction. RSVP buttons carry the round and
//! the response in their custom-id.

use crate::bot::BotData;
use crate::bot::registry::InteractionHandler;
use crate::bot::session::{InteractionReply, MessageButton, ModalField};
use crate::bus::{BusMessage, keys, topics};
use crate::errors::{Error, Result};
use crate::models::DiscordInteraction;
use crate::models::events::{CreateRoundSubmitted, ParticipantJoinRequested, RsvpResponse};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub const CREATE_ROUND_MODAL: &str = "create_round_modal";
pub const RSVP_PREFIX: &str = "round_rsvp";

pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_START_TIME: &str = "start_time";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_TIMEZONE: &str = "timezone";

pub const MSG_RSVP_INVALID: &str = "This RSVP button is no longer valid";

/// `round_rsvp|<round-uuid>|<response>`
#[must_use]
pub fn rsvp_custom_id(round_id: Uuid, response: RsvpResponse) -> String {
    let response = match response {
        RsvpResponse::Accept => "accept",
        RsvpResponse::Tentative => "tentative",
        RsvpResponse::Decline => "decline",
    };
    format!("{RSVP_PREFIX}|{round_id}|{response}")
}

/// Accept / tentative / decline buttons for a round announcement.
#[must_use]
pub fn rsvp_buttons(round_id: Uuid) -> Vec<MessageButton> {
    [
        (RsvpResponse::Accept, "Accept"),
        (RsvpResponse::Tentative, "Tentative"),
        (RsvpResponse::Decline, "Decline"),
    ]
    .into_iter()
    .map(|(response, label)| MessageButton {
        custom_id: rsvp_custom_id(round_id, response),
        label: label.to_string(),
    })
    .collect()
}

pub fn parse_rsvp(custom_id: &str) -> Result<(Uuid, RsvpResponse)> {
    let mut parts = custom_id.split('|');
    let (Some(RSVP_PREFIX), Some(round), Some(response), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::validation(format!("malformed RSVP id {custom_id:?}")));
    };
    let round_id = Uuid::parse_str(round)
        .map_err(|e| Error::validation(format!("invalid round id {round:?}: {e}")))?;
    let response = RsvpResponse::parse(response)
        .ok_or_else(|| Error::validation(format!("unknown RSVP response {response:?}")))?;
    Ok((round_id, response))
}

#[derive(Debug, Default)]
pub struct CreateRoundCommand;

#[async_trait]
impl InteractionHandler for CreateRoundCommand {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()> {
        let modal = InteractionReply::Modal {
            custom_id: CREATE_ROUND_MODAL.to_string(),
            title: "Create Round".to_string(),
            fields: vec![
                ModalField::short(FIELD_TITLE, "Title", true),
                ModalField::short(FIELD_DESCRIPTION, "Description", false).paragraph(),
                ModalField::short(FIELD_START_TIME, "Start time", true)
                    .with_placeholder("tomorrow at 6pm"),
                ModalField::short(FIELD_LOCATION, "Location", false),
                ModalField::short(FIELD_TIMEZONE, "Timezone", false)
                    .with_placeholder("America/Chicago"),
            ],
        };
        data.session
            .interaction_respond(&interaction.handle(), modal)
            .await
    }
}

#[derive(Debug, Default)]
pub struct CreateRoundModal;

#[async_trait]
impl InteractionHandler for CreateRoundModal {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()> {
        let handle = interaction.handle();
        data.session
            .interaction_respond(&handle, InteractionReply::DeferredEphemeral)
            .await?;

        let field = |key: &str| interaction.modal_field(key).unwrap_or_default().trim().to_string();
        let submitted = CreateRoundSubmitted {
            guild_id: interaction.guild_id.clone(),
            user_id: interaction.user_id().to_string(),
            channel_id: interaction.channel_id.clone(),
            title: field(FIELD_TITLE),
            description: field(FIELD_DESCRIPTION),
            location: field(FIELD_LOCATION),
            start_time: field(FIELD_START_TIME),
            timezone: field(FIELD_TIMEZONE),
        };

        let correlation_id = Uuid::new_v4().to_string();
        data.interactions.set(&correlation_id, handle.clone(), None)?;
        let message = BusMessage::from_payload(&submitted)?
            .with_metadata(keys::CORRELATION_ID, correlation_id.as_str())
            .with_metadata(keys::GUILD_ID, interaction.guild_id.as_str())
            .with_metadata(keys::INTERACTION_ID, interaction.id.as_str())
            .with_metadata(keys::INTERACTION_TOKEN, interaction.token.as_str())
            .with_metadata(keys::CHANNEL_ID, interaction.channel_id.as_str())
            .with_metadata(keys::REQUESTING_USER_ID, interaction.user_id())
            .with_metadata(keys::SUBMITTED_AT, Utc::now().to_rfc3339())
            .with_metadata(keys::USER_TIMEZONE, submitted.timezone.as_str())
            .with_metadata(keys::RAW_START_TIME, submitted.start_time.as_str());

        if let Err(e) = data
            .publisher
            .publish(topics::DISCORD_ROUND_CREATION_REQUESTED, message)
            .await
        {
            data.interactions.delete(&correlation_id);
            data.session
                .interaction_response_edit(&handle, "Could not submit your round, please try again")
                .await?;
            return Err(e);
        }
        info!(%correlation_id, title = %submitted.title, "Round creation submitted");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RsvpButton;

#[async_trait]
impl InteractionHandler for RsvpButton {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()> {
        let handle = interaction.handle();
        let (round_id, response) = match parse_rsvp(interaction.dispatch_key().unwrap_or_default()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Rejected RSVP: {}", e);
                return data
                    .session
                    .interaction_respond(&handle, InteractionReply::ephemeral(MSG_RSVP_INVALID))
                    .await;
            }
        };

        let request = ParticipantJoinRequested {
            round_id,
            guild_id: interaction.guild_id.clone(),
            user_id: interaction.user_id().to_string(),
            response,
        };
        let message = BusMessage::from_payload(&request)?
            .with_metadata(keys::GUILD_ID, interaction.guild_id.as_str())
            .with_metadata(keys::INTERACTION_ID, interaction.id.as_str())
            .with_metadata(keys::REQUESTING_USER_ID, interaction.user_id());
        if let Err(e) = data
            .publisher
            .publish(topics::DISCORD_ROUND_PARTICIPANT_JOIN_REQUESTED, message)
            .await
        {
            data.session
                .interaction_respond(
                    &handle,
                    InteractionReply::ephemeral("Could not record your RSVP, please try again"),
                )
                .await?;
            return Err(e);
        }
        data.session
            .interaction_respond(&handle, InteractionReply::ephemeral("Your RSVP is being recorded"))
            .await
    }
}
