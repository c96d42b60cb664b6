//! Output-topic policy.
//!
//! Handlers never choose where their outputs go. Each handler name maps to
//! exactly one rule here; the `topic` metadata hint is only consulted for
//! handlers the table does not know.

use crate::bus::{BusMessage, topics};
use std::collections::HashMap;
use tracing::warn;

/// Registered handler names.
pub mod handler {
    pub const CREATE_ROUND_REQUESTED: &str = "HandleCreateRoundRequested";
    pub const ROUND_CREATED: &str = "HandleRoundCreated";
    pub const PARTICIPANT_JOIN_REQUEST: &str = "HandleRoundParticipantJoinRequest";
    pub const SCORE_UPDATED: &str = "HandleScoreUpdated";
    pub const SCORE_OVERRIDE: &str = "HandleScoreOverride";

    pub const GUILD_CONFIG_RETRIEVED: &str = "HandleGuildConfigRetrieved";
    pub const GUILD_CONFIG_RETRIEVAL_FAILED: &str = "HandleGuildConfigRetrievalFailed";
    pub const GUILD_CONFIG_CREATED: &str = "HandleGuildConfigCreated";
    pub const GUILD_CONFIG_CREATION_FAILED: &str = "HandleGuildConfigCreationFailed";
    pub const GUILD_CONFIG_UPDATED: &str = "HandleGuildConfigUpdated";
    pub const GUILD_CONFIG_UPDATE_FAILED: &str = "HandleGuildConfigUpdateFailed";
    pub const GUILD_CONFIG_DELETED: &str = "HandleGuildConfigDeleted";
    pub const GUILD_CONFIG_DELETION_FAILED: &str = "HandleGuildConfigDeletionFailed";

    pub const MAGIC_LINK_GENERATED: &str = "HandleMagicLinkGenerated";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Every output goes to this topic.
    Publish(&'static str),
    /// The handler only updates Discord; outputs are dropped.
    UiOnly,
}

#[derive(Debug, Clone, Default)]
pub struct TopicPolicy {
    rules: HashMap<String, Rule>,
}

impl TopicPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule(mut self, handler_name: &str, rule: Rule) -> Self {
        self.rules.insert(handler_name.to_string(), rule);
        self
    }

    /// The production table.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_rule(
                handler::CREATE_ROUND_REQUESTED,
                Rule::Publish(topics::ROUND_CREATION_REQUESTED),
            )
            .with_rule(
                handler::ROUND_CREATED,
                Rule::Publish(topics::ROUND_MESSAGE_ID_UPDATE),
            )
            .with_rule(
                handler::PARTICIPANT_JOIN_REQUEST,
                Rule::Publish(topics::ROUND_PARTICIPANT_JOIN_REQUESTED),
            )
            .with_rule(
                handler::SCORE_UPDATED,
                Rule::Publish(topics::ROUND_EMBED_SCORE_UPDATE),
            )
            .with_rule(
                handler::SCORE_OVERRIDE,
                Rule::Publish(topics::ROUND_PARTICIPANT_SCORE_UPDATED),
            )
            .with_rule(handler::GUILD_CONFIG_RETRIEVED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_RETRIEVAL_FAILED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_CREATED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_CREATION_FAILED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_UPDATED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_UPDATE_FAILED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_DELETED, Rule::UiOnly)
            .with_rule(handler::GUILD_CONFIG_DELETION_FAILED, Rule::UiOnly)
            .with_rule(handler::MAGIC_LINK_GENERATED, Rule::UiOnly)
    }

    #[must_use]
    pub fn rule(&self, handler_name: &str) -> Option<Rule> {
        self.rules.get(handler_name).copied()
    }

    /// `None` means the output must not be published.
    #[must_use]
    pub fn resolve(&self, handler_name: &str, message: &BusMessage) -> Option<String> {
        match self.rule(handler_name) {
            Some(Rule::Publish(topic)) => Some(topic.to_string()),
            Some(Rule::UiOnly) => None,
            None => {
                let hint = message.topic_hint().map(ToString::to_string);
                if hint.is_some() {
                    warn!(
                        handler = handler_name,
                        "No topic rule for handler, falling back to metadata hint"
                    );
                }
                hint
            }
        }
    }
}
