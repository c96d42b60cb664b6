//! Bus payloads. All JSON, `snake_case` field names.

use super::{GuildConfig, PermissionLevel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Guild config lifecycle ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRetrievalRequested {
    pub guild_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigRetrieved {
    pub guild_id: String,
    pub config: GuildConfig,
}

/// When the backend knows whether the failure is permanent it says so;
/// otherwise the reason string is classified on our side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigRetrievalFailed {
    pub guild_id: String,
    pub reason: String,
    #[serde(default)]
    pub is_permanent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSetupRequested {
    pub guild_id: String,
    pub signup_channel_id: String,
    pub event_channel_id: String,
    pub leaderboard_channel_id: String,
    pub admin_role_id: String,
    pub editor_role_id: String,
    pub registered_role_id: String,
    pub signup_emoji: String,
    #[serde(default)]
    pub signup_message_id: String,
    pub requested_by: String,
}

/// Shared shape of `guild.config.created` and `guild.config.updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigChanged {
    pub guild_id: String,
    pub config: GuildConfig,
}

/// Shared shape of the `*_failed` guild lifecycle topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigOperationFailed {
    pub guild_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigDeleted {
    pub guild_id: String,
}

// --- Auth ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicLinkRequested {
    pub user_id: String,
    pub guild_id: String,
    pub role: PermissionLevel,
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicLinkGenerated {
    pub success: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub user_id: String,
    pub guild_id: String,
    pub correlation_id: String,
}

// --- Rounds ---

/// Raw modal submission, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoundSubmitted {
    pub guild_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start_time: String,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCreationRequested {
    pub guild_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: String,
    pub timezone: String,
    pub created_by: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCreated {
    pub round_id: Uuid,
    pub guild_id: String,
    pub title: String,
    pub start_time: String,
    #[serde(default)]
    pub location: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundMessageIdUpdate {
    pub round_id: Uuid,
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpResponse {
    Accept,
    Tentative,
    Decline,
}

impl RsvpResponse {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "accept" => Some(Self::Accept),
            "tentative" => Some(Self::Tentative),
            "decline" => Some(Self::Decline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantJoinRequested {
    pub round_id: Uuid,
    pub guild_id: String,
    pub user_id: String,
    pub response: RsvpResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundScoreUpdated {
    pub round_id: Uuid,
    pub guild_id: String,
    pub user_id: String,
    pub score: i32,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEmbedScoreUpdate {
    pub round_id: Uuid,
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub user_id: String,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScore {
    pub user_id: String,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOverrideSucceeded {
    pub round_id: Uuid,
    pub guild_id: String,
    pub scores: Vec<UserScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantScoreUpdated {
    pub round_id: Uuid,
    pub guild_id: String,
    pub user_id: String,
    pub score: i32,
}

// --- Users ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSignupRequested {
    pub guild_id: String,
    pub user_id: String,
}
