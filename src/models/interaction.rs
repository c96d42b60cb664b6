//! Transport-free view of a Discord interaction.
//!
//! The serenity event types are converted into these in `bot::convert`, so the
//! registry and the interaction handlers can be driven by tests without a
//! gateway connection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything needed to reply to an interaction after the fact: edit the
/// original response, post a followup, or DM the user who triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionHandle {
    pub interaction_id: String,
    pub token: String,
    pub application_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: String,
    pub role_ids: Vec<String>,
    /// Discord-level administrator permission on the guild
    pub is_administrator: bool,
}

impl MemberInfo {
    #[must_use]
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|r| r == role_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionKind {
    /// Slash command with its string-rendered options
    Command {
        name: String,
        options: BTreeMap<String, String>,
    },
    /// Button / select press
    Component { custom_id: String },
    /// Modal submission with text-input values keyed by input custom-id
    Modal {
        custom_id: String,
        fields: BTreeMap<String, String>,
    },
    /// Reaction added to a message
    Reaction {
        message_id: String,
        emoji: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordInteraction {
    pub id: String,
    pub token: String,
    pub application_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub member: MemberInfo,
    pub kind: InteractionKind,
}

impl DiscordInteraction {
    #[must_use]
    pub fn handle(&self) -> InteractionHandle {
        InteractionHandle {
            interaction_id: self.id.clone(),
            token: self.token.clone(),
            application_id: self.application_id.clone(),
            guild_id: self.guild_id.clone(),
            channel_id: self.channel_id.clone(),
            user_id: self.member.user_id.clone(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.member.user_id
    }

    /// Command name, component custom-id or modal custom-id.
    #[must_use]
    pub fn dispatch_key(&self) -> Option<&str> {
        match &self.kind {
            InteractionKind::Command { name, .. } => Some(name),
            InteractionKind::Component { custom_id } | InteractionKind::Modal { custom_id, .. } => {
                Some(custom_id)
            }
            InteractionKind::Reaction { .. } => None,
        }
    }

    /// Reactions carry no token and cannot be replied to.
    #[must_use]
    pub const fn is_repliable(&self) -> bool {
        !matches!(self.kind, InteractionKind::Reaction { .. })
    }

    #[must_use]
    pub fn modal_field(&self, key: &str) -> Option<&str> {
        match &self.kind {
            InteractionKind::Modal { fields, .. } => fields.get(key).map(String::as_str),
            _ => None,
        }
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        match &self.kind {
            InteractionKind::Command { options, .. } => options.get(key).map(String::as_str),
            _ => None,
        }
    }
}
