//! Topic catalogue.
//!
//! Backend-facing topics are shared with the other services on the bus;
//! `discord.*` topics are produced and consumed by this edge only.

// Guild lifecycle
pub const GUILD_SETUP: &str = "guild.setup";
pub const GUILD_CONFIG_CREATED: &str = "guild.config.created";
pub const GUILD_CONFIG_CREATION_FAILED: &str = "guild.config.creation_failed";
pub const GUILD_CONFIG_UPDATED: &str = "guild.config.updated";
pub const GUILD_CONFIG_UPDATE_FAILED: &str = "guild.config.update_failed";
pub const GUILD_CONFIG_RETRIEVAL_REQUESTED: &str = "guild.config.retrieval_requested";
pub const GUILD_CONFIG_RETRIEVED: &str = "guild.config.retrieved";
pub const GUILD_CONFIG_RETRIEVAL_FAILED: &str = "guild.config.retrieval_failed";
pub const GUILD_CONFIG_DELETED: &str = "guild.config.deleted";
pub const GUILD_CONFIG_DELETION_FAILED: &str = "guild.config.deletion_failed";
pub const GUILD_CONFIG_DELETION_RESULTS: &str = "guild.config.deletion_results";

// Auth
pub const AUTH_MAGIC_LINK_REQUESTED: &str = "auth.magic_link.requested";
pub const AUTH_MAGIC_LINK_GENERATED: &str = "auth.magic_link.generated";

// Rounds, Discord side
pub const DISCORD_ROUND_CREATION_REQUESTED: &str = "discord.round.creation.requested";
pub const DISCORD_ROUND_PARTICIPANT_JOIN_REQUESTED: &str =
    "discord.round.participant.join_requested";

// Rounds, backend side
pub const ROUND_CREATION_REQUESTED: &str = "round.creation.requested";
pub const ROUND_CREATED: &str = "round.created";
pub const ROUND_MESSAGE_ID_UPDATE: &str = "round.message_id.update";
pub const ROUND_PARTICIPANT_JOIN_REQUESTED: &str = "round.participant.join.requested";
pub const ROUND_SCORE_UPDATED: &str = "round.score.updated";
pub const ROUND_EMBED_SCORE_UPDATE: &str = "round.embed.score.update";
pub const SCORE_OVERRIDE_SUCCEEDED: &str = "score.override.succeeded";
pub const ROUND_PARTICIPANT_SCORE_UPDATED: &str = "round.participant.score.updated";

// Users
pub const USER_SIGNUP_REQUESTED: &str = "user.signup.requested";

/// Every topic the edge publishes or consumes; the JetStream stream covers these.
pub const ALL: &[&str] = &[
    GUILD_SETUP,
    GUILD_CONFIG_CREATED,
    GUILD_CONFIG_CREATION_FAILED,
    GUILD_CONFIG_UPDATED,
    GUILD_CONFIG_UPDATE_FAILED,
    GUILD_CONFIG_RETRIEVAL_REQUESTED,
    GUILD_CONFIG_RETRIEVED,
    GUILD_CONFIG_RETRIEVAL_FAILED,
    GUILD_CONFIG_DELETED,
    GUILD_CONFIG_DELETION_FAILED,
    GUILD_CONFIG_DELETION_RESULTS,
    AUTH_MAGIC_LINK_REQUESTED,
    AUTH_MAGIC_LINK_GENERATED,
    DISCORD_ROUND_CREATION_REQUESTED,
    DISCORD_ROUND_PARTICIPANT_JOIN_REQUESTED,
    ROUND_CREATION_REQUESTED,
    ROUND_CREATED,
    ROUND_MESSAGE_ID_UPDATE,
    ROUND_PARTICIPANT_JOIN_REQUESTED,
    ROUND_SCORE_UPDATED,
    ROUND_EMBED_SCORE_UPDATE,
    SCORE_OVERRIDE_SUCCEEDED,
    ROUND_PARTICIPANT_SCORE_UPDATED,
    USER_SIGNUP_REQUESTED,
];

/// Domain label recorded in message metadata.
#[must_use]
pub fn domain_of(topic: &str) -> &str {
    let trimmed = topic.strip_prefix("discord.").unwrap_or(topic);
    trimmed.split('.').next().unwrap_or(trimmed)
}
