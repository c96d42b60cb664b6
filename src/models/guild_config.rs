//! Guild configuration record.
//!
//! The backend owns the durable copy; the edge only caches what the backend
//! last sent. Timestamps and the pending flag are edge-local bookkeeping and
//! never travel over the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: String,
    #[serde(default)]
    pub signup_channel_id: String,
    #[serde(default)]
    pub signup_message_id: String,
    #[serde(default)]
    pub signup_emoji: String,
    #[serde(default)]
    pub event_channel_id: String,
    #[serde(default)]
    pub leaderboard_channel_id: String,
    #[serde(default)]
    pub admin_role_id: String,
    #[serde(default)]
    pub editor_role_id: String,
    #[serde(default)]
    pub registered_role_id: String,
    /// Display name → role ID
    #[serde(default)]
    pub role_mappings: BTreeMap<String, String>,

    #[serde(skip)]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub refreshed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub is_placeholder: bool,
    #[serde(skip)]
    pub is_request_pending: bool,
}

impl GuildConfig {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            ..Self::default()
        }
    }

    /// Marker entry for a guild whose real record has not arrived yet.
    pub fn placeholder(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            is_placeholder: true,
            ..Self::default()
        }
    }

    /// A real record is configured once every channel and the player role are set.
    /// Placeholders count as configured: they only exist for known guilds.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        if self.is_placeholder {
            return true;
        }
        !self.signup_channel_id.is_empty()
            && !self.event_channel_id.is_empty()
            && !self.leaderboard_channel_id.is_empty()
            && !self.registered_role_id.is_empty()
    }
}
