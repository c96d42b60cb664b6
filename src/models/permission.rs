//! Permission levels and the policy that maps a guild member onto one.

use super::{GuildConfig, MemberInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered access level. `None` sorts below everything and is what a
/// command with no requirement asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    None,
    Viewer,
    Player,
    Editor,
    Admin,
}

impl PermissionLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Viewer => "viewer",
            Self::Player => "player",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pluggable member → level policy.
pub trait PermissionMapper: Send + Sync {
    fn map_member_to_level(&self, member: &MemberInfo, config: Option<&GuildConfig>)
    -> PermissionLevel;
}

/// Discord administrators and the configured admin role map to admin, then
/// editor role, then the registered (player) role; everyone else is a viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPermissionMapper;

impl PermissionMapper for DefaultPermissionMapper {
    fn map_member_to_level(
        &self,
        member: &MemberInfo,
        config: Option<&GuildConfig>,
    ) -> PermissionLevel {
        if member.is_administrator {
            return PermissionLevel::Admin;
        }
        let Some(config) = config else {
            return PermissionLevel::Viewer;
        };

        let has_role = |role_id: &str| !role_id.is_empty() && member.has_role(role_id);

        if has_role(&config.admin_role_id) {
            PermissionLevel::Admin
        } else if has_role(&config.editor_role_id) {
            PermissionLevel::Editor
        } else if has_role(&config.registered_role_id) {
            PermissionLevel::Player
        } else {
            PermissionLevel::Viewer
        }
    }
}

/// True when the member's level meets `required`.
pub fn check_guild_permission(
    mapper: &dyn PermissionMapper,
    member: &MemberInfo,
    config: Option<&GuildConfig>,
    required: PermissionLevel,
) -> bool {
    mapper.map_member_to_level(member, config) >= required
}
