//! Interaction registry: routes slash commands, components, modal submits and
//! signup reactions to their handlers, enforcing per-command policy first.

use super::BotData;
use super::session::InteractionReply;
use crate::errors::{ConfigError, Result};
use crate::models::permission::check_guild_permission;
use crate::models::{DiscordInteraction, GuildConfig, InteractionKind, PermissionLevel};
use async_trait::async_trait;
use std::collections::HashMap;
use crate::resolver::SETUP_CHECK_TIMEOUT;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

pub const MSG_SETUP_INITIALIZING: &str = "Setup is initializing, please retry shortly";
pub const MSG_NOT_SET_UP: &str =
    "This server is not set up — an admin must run the setup command";
pub const MSG_TEMPORARY: &str = "Could not load this server's settings right now, please try again";
pub const MSG_GUILD_ONLY: &str = "This can only be used inside a server";

#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn handle(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    pub required_permission: PermissionLevel,
    pub requires_setup: bool,
}

impl CommandPolicy {
    #[must_use]
    pub const fn new(required_permission: PermissionLevel, requires_setup: bool) -> Self {
        Self {
            required_permission,
            requires_setup,
        }
    }
}

#[derive(Clone)]
struct Route {
    handler: Arc<dyn InteractionHandler>,
    policy: Option<CommandPolicy>,
}

#[derive(Default)]
pub struct InteractionRegistry {
    commands: HashMap<String, Route>,
    components: HashMap<String, Route>,
    modals: HashMap<String, Route>,
    reaction: Option<Arc<dyn InteractionHandler>>,
}

impl std::fmt::Debug for InteractionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("modals", &self.modals.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Outcome of a dispatch, mostly useful for tests and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Denied,
    Unrouted,
}

impl InteractionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&mut self, name: &str, handler: Arc<dyn InteractionHandler>) {
        self.commands.insert(
            name.to_string(),
            Route {
                handler,
                policy: None,
            },
        );
    }

    pub fn register_command_with_policy(
        &mut self,
        name: &str,
        handler: Arc<dyn InteractionHandler>,
        policy: CommandPolicy,
    ) {
        self.commands.insert(
            name.to_string(),
            Route {
                handler,
                policy: Some(policy),
            },
        );
    }

    /// `prefix` matches custom-ids equal to it or starting with it.
    pub fn register_component(
        &mut self,
        prefix: &str,
        handler: Arc<dyn InteractionHandler>,
        policy: Option<CommandPolicy>,
    ) {
        self.components
            .insert(prefix.to_string(), Route { handler, policy });
    }

    pub fn register_modal(
        &mut self,
        prefix: &str,
        handler: Arc<dyn InteractionHandler>,
        policy: Option<CommandPolicy>,
    ) {
        self.modals
            .insert(prefix.to_string(), Route { handler, policy });
    }

    /// Handler for reactions on a guild's signup message.
    pub fn register_signup_reaction(&mut self, handler: Arc<dyn InteractionHandler>) {
        self.reaction = Some(handler);
    }

    #[instrument(skip_all, fields(interaction_id = %interaction.id, guild_id = %interaction.guild_id))]
    pub async fn dispatch(&self, data: &BotData, interaction: &DiscordInteraction) -> Result<Dispatch> {
        let route = match &interaction.kind {
            InteractionKind::Command { name, .. } => self.commands.get(name),
            InteractionKind::Component { custom_id } => longest_prefix(&self.components, custom_id),
            InteractionKind::Modal { custom_id, .. } => longest_prefix(&self.modals, custom_id),
            InteractionKind::Reaction { message_id, emoji } => {
                return self
                    .dispatch_reaction(data, interaction, message_id, emoji)
                    .await;
            }
        };
        let Some(route) = route else {
            warn!(key = ?interaction.dispatch_key(), "No handler registered for interaction");
            return Ok(Dispatch::Unrouted);
        };

        if let Some(policy) = route.policy
            && !authorize(data, interaction, policy).await?
        {
            return Ok(Dispatch::Denied);
        }
        route.handler.handle(data, interaction).await?;
        Ok(Dispatch::Handled)
    }

    async fn dispatch_reaction(
        &self,
        data: &BotData,
        interaction: &DiscordInteraction,
        message_id: &str,
        emoji: &str,
    ) -> Result<Dispatch> {
        let Some(handler) = &self.reaction else {
            return Ok(Dispatch::Unrouted);
        };
        let Some(config) = data.resolver.cache().get(&interaction.guild_id) else {
            debug!("Reaction in a guild with no cached config");
            return Ok(Dispatch::Unrouted);
        };
        if !is_signup_reaction(&config, &interaction.channel_id, message_id, emoji) {
            return Ok(Dispatch::Unrouted);
        }
        handler.handle(data, interaction).await?;
        Ok(Dispatch::Handled)
    }
}

fn longest_prefix<'a>(routes: &'a HashMap<String, Route>, custom_id: &str) -> Option<&'a Route> {
    routes
        .iter()
        .filter(|(prefix, _)| custom_id.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, route)| route)
}

fn is_signup_reaction(config: &GuildConfig, channel_id: &str, message_id: &str, emoji: &str) -> bool {
    if config.signup_channel_id.is_empty() || config.signup_channel_id != channel_id {
        return false;
    }
    if !config.signup_message_id.is_empty() && config.signup_message_id != message_id {
        return false;
    }
    config.signup_emoji.is_empty() || config.signup_emoji == emoji
}

/// Checks setup state and permission, replying ephemerally on refusal.
async fn authorize(data: &BotData, interaction: &DiscordInteraction, policy: CommandPolicy) -> Result<bool> {
    if interaction.guild_id.is_empty() {
        deny(data, interaction, MSG_GUILD_ONLY).await?;
        return Ok(false);
    }

    // A cold cache must not hold the first response past Discord's deadline.
    let lookup = timeout(
        SETUP_CHECK_TIMEOUT,
        data.resolver.get_config(&data.shutdown, &interaction.guild_id),
    )
    .await
    .unwrap_or_else(|_| {
        Err(ConfigError::Loading {
            guild_id: interaction.guild_id.clone(),
        })
    });
    let config = match lookup {
        Ok(config) => Some(config),
        Err(e) if policy.requires_setup => {
            let message = match e {
                ConfigError::Loading { .. } => MSG_SETUP_INITIALIZING,
                ConfigError::NotFound { .. } => MSG_NOT_SET_UP,
                ConfigError::Temporary { .. } => MSG_TEMPORARY,
            };
            debug!(error = %e, "Guild config unavailable for command requiring setup");
            deny(data, interaction, message).await?;
            return Ok(false);
        }
        Err(e) => {
            debug!(error = %e, "Evaluating permission without guild config");
            None
        }
    };

    if policy.requires_setup && !config.as_ref().is_some_and(GuildConfig::is_configured) {
        deny(data, interaction, MSG_NOT_SET_UP).await?;
        return Ok(false);
    }

    if !check_guild_permission(
        data.permissions.as_ref(),
        &interaction.member,
        config.as_ref(),
        policy.required_permission,
    ) {
        let message = format!(
            "You need the {} permission level to use this",
            policy.required_permission
        );
        deny(data, interaction, &message).await?;
        return Ok(false);
    }
    Ok(true)
}

async fn deny(data: &BotData, interaction: &DiscordInteraction, message: &str) -> Result<()> {
    if !interaction.is_repliable() {
        return Ok(());
    }
    data.session
        .interaction_respond(&interaction.handle(), InteractionReply::ephemeral(message))
        .await
}
