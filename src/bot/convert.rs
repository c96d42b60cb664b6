//! serenity gateway types → [`DiscordInteraction`].

use crate::models::{DiscordInteraction, InteractionKind, MemberInfo};
use poise::serenity_prelude as serenity;
use std::collections::BTreeMap;

/// Converts an interaction the registry knows how to route; pings and
/// autocomplete requests yield `None`.
#[must_use]
pub fn interaction(interaction: &serenity::Interaction) -> Option<DiscordInteraction> {
    match interaction {
        serenity::Interaction::Command(cmd) => Some(DiscordInteraction {
            id: cmd.id.to_string(),
            token: cmd.token.clone(),
            application_id: cmd.application_id.to_string(),
            guild_id: id_or_empty(cmd.guild_id),
            channel_id: cmd.channel_id.to_string(),
            member: member_info(cmd.member.as_deref(), cmd.user.id),
            kind: InteractionKind::Command {
                name: cmd.data.name.clone(),
                options: command_options(&cmd.data.options),
            },
        }),
        serenity::Interaction::Component(component) => Some(DiscordInteraction {
            id: component.id.to_string(),
            token: component.token.clone(),
            application_id: component.application_id.to_string(),
            guild_id: id_or_empty(component.guild_id),
            channel_id: component.channel_id.to_string(),
            member: member_info(component.member.as_ref(), component.user.id),
            kind: InteractionKind::Component {
                custom_id: component.data.custom_id.clone(),
            },
        }),
        serenity::Interaction::Modal(modal) => Some(DiscordInteraction {
            id: modal.id.to_string(),
            token: modal.token.clone(),
            application_id: modal.application_id.to_string(),
            guild_id: id_or_empty(modal.guild_id),
            channel_id: modal.channel_id.to_string(),
            member: member_info(modal.member.as_ref(), modal.user.id),
            kind: InteractionKind::Modal {
                custom_id: modal.data.custom_id.clone(),
                fields: modal_fields(&modal.data.components),
            },
        }),
        _ => None,
    }
}

/// Reactions outside a guild, or without a known user, are ignored.
#[must_use]
pub fn reaction(reaction: &serenity::Reaction) -> Option<DiscordInteraction> {
    let guild_id = reaction.guild_id?;
    let user_id = reaction.user_id?;
    Some(DiscordInteraction {
        id: String::new(),
        token: String::new(),
        application_id: String::new(),
        guild_id: guild_id.to_string(),
        channel_id: reaction.channel_id.to_string(),
        member: member_info(reaction.member.as_ref(), user_id),
        kind: InteractionKind::Reaction {
            message_id: reaction.message_id.to_string(),
            emoji: emoji_name(&reaction.emoji),
        },
    })
}

fn id_or_empty(id: Option<serenity::GuildId>) -> String {
    id.map(|g| g.to_string()).unwrap_or_default()
}

fn member_info(member: Option<&serenity::Member>, user_id: serenity::UserId) -> MemberInfo {
    let Some(member) = member else {
        return MemberInfo {
            user_id: user_id.to_string(),
            ..MemberInfo::default()
        };
    };
    MemberInfo {
        user_id: member.user.id.to_string(),
        role_ids: member.roles.iter().map(ToString::to_string).collect(),
        is_administrator: is_administrator(member.permissions),
    }
}

fn is_administrator(permissions: Option<serenity::Permissions>) -> bool {
    permissions.is_some_and(|p| p.contains(serenity::Permissions::ADMINISTRATOR))
}

/// Unicode emoji are compared by their text, custom emoji by name.
fn emoji_name(emoji: &serenity::ReactionType) -> String {
    match emoji {
        serenity::ReactionType::Unicode(text) => text.clone(),
        serenity::ReactionType::Custom { id, name, .. } => {
            name.clone().unwrap_or_else(|| id.to_string())
        }
        _ => String::new(),
    }
}

fn command_options(options: &[serenity::CommandDataOption]) -> BTreeMap<String, String> {
    options
        .iter()
        .filter_map(|option| render_option(&option.value).map(|v| (option.name.clone(), v)))
        .collect()
}

fn render_option(value: &serenity::CommandDataOptionValue) -> Option<String> {
    use serenity::CommandDataOptionValue as V;
    match value {
        V::String(s) => Some(s.clone()),
        V::Integer(i) => Some(i.to_string()),
        V::Number(n) => Some(n.to_string()),
        V::Boolean(b) => Some(b.to_string()),
        V::Channel(id) => Some(id.to_string()),
        V::Role(id) => Some(id.to_string()),
        V::User(id) => Some(id.to_string()),
        _ => None,
    }
}

fn modal_fields(rows: &[serenity::ActionRow]) -> BTreeMap<String, String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            serenity::ActionRowComponent::InputText(input) => Some((
                input.custom_id.clone(),
                input.value.clone().unwrap_or_default(),
            )),
            _ => None,
        })
        .collect()
}
