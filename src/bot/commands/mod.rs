//! Interaction handlers and the table wiring them into the registry.

/// `/dashboard` magic-link request
pub mod dashboard;
/// `/createround`, its modal and RSVP buttons
pub mod round;
/// `/frolf-setup`
pub mod setup;
/// Signup reactions
pub mod signup;

use super::lifecycle::{CREATE_ROUND_COMMAND, DASHBOARD_COMMAND, SETUP_COMMAND};
use super::registry::{CommandPolicy, InteractionRegistry};
use crate::models::PermissionLevel;
use std::sync::Arc;

/// Registry with every interaction the bot answers.
#[must_use]
pub fn registry() -> InteractionRegistry {
    let mut registry = InteractionRegistry::new();

    // Setup must work before there is any config.
    registry.register_command_with_policy(
        SETUP_COMMAND,
        Arc::new(setup::Setup),
        CommandPolicy::new(PermissionLevel::Admin, false),
    );
    registry.register_command_with_policy(
        DASHBOARD_COMMAND,
        Arc::new(dashboard::Dashboard),
        CommandPolicy::new(PermissionLevel::Viewer, true),
    );
    registry.register_command_with_policy(
        CREATE_ROUND_COMMAND,
        Arc::new(round::CreateRoundCommand),
        CommandPolicy::new(PermissionLevel::Player, true),
    );
    registry.register_modal(
        round::CREATE_ROUND_MODAL,
        Arc::new(round::CreateRoundModal),
        Some(CommandPolicy::new(PermissionLevel::Player, true)),
    );
    registry.register_component(round::RSVP_PREFIX, Arc::new(round::RsvpButton), None);
    registry.register_signup_reaction(Arc::new(signup::SignupReaction));

    registry
}
