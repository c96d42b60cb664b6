//! Discord HTTP port.
//!
//! Everything the edge does against the Discord REST API goes through
//! [`DiscordSession`], so handlers can be tested against a fake. IDs are
//! carried as strings; [`SerenitySession`] parses them into snowflakes.

use crate::errors::{Error, Result};
use crate::models::InteractionHandle;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalField {
    pub custom_id: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub required: bool,
    /// Multi-line input
    pub paragraph: bool,
}

impl ModalField {
    pub fn short(custom_id: &str, label: &str, required: bool) -> Self {
        Self {
            custom_id: custom_id.to_string(),
            label: label.to_string(),
            placeholder: None,
            required,
            paragraph: false,
        }
    }

    #[must_use]
    pub fn paragraph(mut self) -> Self {
        self.paragraph = true;
        self
    }

    #[must_use]
    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

/// Initial response to an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionReply {
    DeferredEphemeral,
    Message { content: String, ephemeral: bool },
    Modal {
        custom_id: String,
        title: String,
        fields: Vec<ModalField>,
    },
}

impl InteractionReply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Button attached to a channel message; clicks arrive as component
/// interactions carrying `custom_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageButton {
    pub custom_id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
}

impl CommandDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCommand {
    pub id: String,
    pub name: String,
}

/// Discord REST operations used by the edge. `guild_id: None` on the
/// application command calls means the global scope.
#[async_trait]
pub trait DiscordSession: Send + Sync {
    async fn interaction_respond(&self, handle: &InteractionHandle, reply: InteractionReply) -> Result<()>;

    async fn interaction_response_edit(&self, handle: &InteractionHandle, content: &str) -> Result<()>;

    async fn followup_message_create(
        &self,
        handle: &InteractionHandle,
        content: &str,
        ephemeral: bool,
    ) -> Result<()>;

    /// Opens (or reuses) the DM channel with a user and returns its ID.
    async fn user_channel_create(&self, user_id: &str) -> Result<String>;

    /// Returns the new message's ID.
    async fn channel_message_send(
        &self,
        channel_id: &str,
        content: &str,
        buttons: &[MessageButton],
    ) -> Result<String>;

    async fn channel_message_delete(&self, channel_id: &str, message_id: &str) -> Result<()>;

    async fn message_reaction_add(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()>;

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>>;

    async fn guild_channel_create(&self, guild_id: &str, name: &str) -> Result<ChannelInfo>;

    /// Sets the channel topic shown under its name.
    async fn channel_edit(&self, channel_id: &str, topic: &str) -> Result<()>;

    async fn guild_roles(&self, guild_id: &str) -> Result<Vec<RoleInfo>>;

    async fn guild_role_create(&self, guild_id: &str, name: &str) -> Result<RoleInfo>;

    async fn application_commands(&self, guild_id: Option<&str>) -> Result<Vec<RegisteredCommand>>;

    async fn application_command_create(
        &self,
        guild_id: Option<&str>,
        command: &CommandDefinition,
    ) -> Result<RegisteredCommand>;

    async fn application_command_delete(&self, guild_id: Option<&str>, command_id: &str) -> Result<()>;
}

fn snowflake(raw: &str, what: &str) -> Result<NonZeroU64> {
    raw.parse::<NonZeroU64>()
        .map_err(|_| Error::validation(format!("invalid {what} id: {raw:?}")))
}

/// [`DiscordSession`] over serenity's HTTP client.
#[derive(Clone)]
pub struct SerenitySession {
    http: Arc<serenity::Http>,
}

impl std::fmt::Debug for SerenitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenitySession").finish_non_exhaustive()
    }
}

impl SerenitySession {
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    fn guild(raw: &str) -> Result<serenity::GuildId> {
        Ok(serenity::GuildId::from(snowflake(raw, "guild")?))
    }

    fn channel(raw: &str) -> Result<serenity::ChannelId> {
        Ok(serenity::ChannelId::from(snowflake(raw, "channel")?))
    }
}

fn build_modal(custom_id: &str, title: &str, fields: &[ModalField]) -> serenity::CreateModal {
    let rows = fields
        .iter()
        .map(|field| {
            let style = if field.paragraph {
                serenity::InputTextStyle::Paragraph
            } else {
                serenity::InputTextStyle::Short
            };
            let mut input = serenity::CreateInputText::new(style, &field.label, &field.custom_id)
                .required(field.required);
            if let Some(placeholder) = &field.placeholder {
                input = input.placeholder(placeholder);
            }
            serenity::CreateActionRow::InputText(input)
        })
        .collect();
    serenity::CreateModal::new(custom_id, title).components(rows)
}

#[async_trait]
impl DiscordSession for SerenitySession {
    async fn interaction_respond(&self, handle: &InteractionHandle, reply: InteractionReply) -> Result<()> {
        let interaction_id = serenity::InteractionId::from(snowflake(&handle.interaction_id, "interaction")?);
        let response = match reply {
            InteractionReply::DeferredEphemeral => serenity::CreateInteractionResponse::Defer(
                serenity::CreateInteractionResponseMessage::new().ephemeral(true),
            ),
            InteractionReply::Message { content, ephemeral } => {
                serenity::CreateInteractionResponse::Message(
                    serenity::CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(ephemeral),
                )
            }
            InteractionReply::Modal {
                custom_id,
                title,
                fields,
            } => serenity::CreateInteractionResponse::Modal(build_modal(&custom_id, &title, &fields)),
        };
        trace!(interaction_id = %handle.interaction_id, "Responding to interaction");
        self.http
            .create_interaction_response(interaction_id, &handle.token, &response, Vec::new())
            .await?;
        Ok(())
    }

    async fn interaction_response_edit(&self, handle: &InteractionHandle, content: &str) -> Result<()> {
        let edit = serenity::EditInteractionResponse::new().content(content);
        self.http
            .edit_original_interaction_response(&handle.token, &edit, Vec::new())
            .await?;
        Ok(())
    }

    async fn followup_message_create(
        &self,
        handle: &InteractionHandle,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        let followup = serenity::CreateInteractionResponseFollowup::new()
            .content(content)
            .ephemeral(ephemeral);
        self.http
            .create_followup_message(&handle.token, &followup, Vec::new())
            .await?;
        Ok(())
    }

    async fn user_channel_create(&self, user_id: &str) -> Result<String> {
        let recipient = snowflake(user_id, "user")?;
        let body = serde_json::json!({ "recipient_id": recipient.get().to_string() });
        let channel = self.http.create_private_channel(&body).await?;
        Ok(channel.id.get().to_string())
    }

    async fn channel_message_send(
        &self,
        channel_id: &str,
        content: &str,
        buttons: &[MessageButton],
    ) -> Result<String> {
        let channel = Self::channel(channel_id)?;
        let mut message = serenity::CreateMessage::new().content(content);
        if !buttons.is_empty() {
            let row = buttons
                .iter()
                .map(|b| serenity::CreateButton::new(&b.custom_id).label(&b.label))
                .collect();
            message = message.components(vec![serenity::CreateActionRow::Buttons(row)]);
        }
        let sent = self.http.send_message(channel, Vec::new(), &message).await?;
        Ok(sent.id.get().to_string())
    }

    async fn channel_message_delete(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let channel = Self::channel(channel_id)?;
        let message = serenity::MessageId::from(snowflake(message_id, "message")?);
        self.http.delete_message(channel, message, None).await?;
        Ok(())
    }

    async fn message_reaction_add(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        let channel = Self::channel(channel_id)?;
        let message = serenity::MessageId::from(snowflake(message_id, "message")?);
        let reaction = serenity::ReactionType::Unicode(emoji.to_string());
        self.http.create_reaction(channel, message, &reaction).await?;
        Ok(())
    }

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>> {
        let channels = self.http.get_channels(Self::guild(guild_id)?).await?;
        Ok(channels
            .into_iter()
            .map(|c| ChannelInfo {
                id: c.id.get().to_string(),
                name: c.name,
            })
            .collect())
    }

    async fn guild_channel_create(&self, guild_id: &str, name: &str) -> Result<ChannelInfo> {
        let builder = serenity::CreateChannel::new(name).kind(serenity::ChannelType::Text);
        let channel = self
            .http
            .create_channel(Self::guild(guild_id)?, &builder, None)
            .await?;
        Ok(ChannelInfo {
            id: channel.id.get().to_string(),
            name: channel.name,
        })
    }

    async fn channel_edit(&self, channel_id: &str, topic: &str) -> Result<()> {
        let body = serde_json::json!({ "topic": topic });
        self.http.edit_channel(Self::channel(channel_id)?, &body, None).await?;
        Ok(())
    }

    async fn guild_roles(&self, guild_id: &str) -> Result<Vec<RoleInfo>> {
        let roles = self.http.get_guild_roles(Self::guild(guild_id)?).await?;
        Ok(roles
            .into_iter()
            .map(|r| RoleInfo {
                id: r.id.get().to_string(),
                name: r.name,
            })
            .collect())
    }

    async fn guild_role_create(&self, guild_id: &str, name: &str) -> Result<RoleInfo> {
        let builder = serenity::EditRole::new().name(name);
        let role = self
            .http
            .create_role(Self::guild(guild_id)?, &builder, None)
            .await?;
        Ok(RoleInfo {
            id: role.id.get().to_string(),
            name: role.name,
        })
    }

    async fn application_commands(&self, guild_id: Option<&str>) -> Result<Vec<RegisteredCommand>> {
        let commands = match guild_id {
            Some(guild_id) => self.http.get_guild_commands(Self::guild(guild_id)?).await?,
            None => self.http.get_global_commands().await?,
        };
        Ok(commands
            .into_iter()
            .map(|c| RegisteredCommand {
                id: c.id.get().to_string(),
                name: c.name,
            })
            .collect())
    }

    async fn application_command_create(
        &self,
        guild_id: Option<&str>,
        command: &CommandDefinition,
    ) -> Result<RegisteredCommand> {
        let builder = serenity::CreateCommand::new(&command.name).description(&command.description);
        let created = match guild_id {
            Some(guild_id) => {
                self.http
                    .create_guild_command(Self::guild(guild_id)?, &builder)
                    .await?
            }
            None => self.http.create_global_command(&builder).await?,
        };
        Ok(RegisteredCommand {
            id: created.id.get().to_string(),
            name: created.name,
        })
    }

    async fn application_command_delete(&self, guild_id: Option<&str>, command_id: &str) -> Result<()> {
        let command = serenity::CommandId::from(snowflake(command_id, "command")?);
        match guild_id {
            Some(guild_id) => {
                self.http
                    .delete_guild_command(Self::guild(guild_id)?, command)
                    .await?;
            }
            None => self.http.delete_global_command(command).await?,
        }
        Ok(())
    }
}
