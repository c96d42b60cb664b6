//! Domain data shared by the cache, resolver, router and Discord layer.

/// Per-guild configuration record
pub mod guild_config;
/// Discord interaction view and the correlation handle stored per request
pub mod interaction;
/// Permission levels and the member → level mapping policy
pub mod permission;
/// JSON payloads carried on the message bus
pub mod events;

pub use guild_config::GuildConfig;
pub use interaction::{DiscordInteraction, InteractionHandle, InteractionKind, MemberInfo};
pub use permission::{DefaultPermissionMapper, PermissionLevel, PermissionMapper};
