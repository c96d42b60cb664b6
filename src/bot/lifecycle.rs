//! Per-guild slash command lifecycle.
//!
//! An unconfigured guild only sees the global setup command. Once the backend
//! confirms a config, the domain commands are registered in that guild; when
//! the config is deleted they are removed again.

use super::session::{CommandDefinition, DiscordSession};
use crate::errors::Result;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const SETUP_COMMAND: &str = "frolf-setup";
pub const DASHBOARD_COMMAND: &str = "dashboard";
pub const CREATE_ROUND_COMMAND: &str = "createround";

/// Commands every configured guild gets.
#[must_use]
pub fn guild_catalog() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(DASHBOARD_COMMAND, "Get a sign-in link for the frolf dashboard"),
        CommandDefinition::new(CREATE_ROUND_COMMAND, "Schedule a new round"),
    ]
}

#[must_use]
pub fn setup_command() -> CommandDefinition {
    CommandDefinition::new(SETUP_COMMAND, "Set up frolf channels and roles for this server")
}

#[derive(Clone)]
pub struct CommandLifecycle {
    session: Arc<dyn DiscordSession>,
    catalog: Vec<CommandDefinition>,
}

impl std::fmt::Debug for CommandLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLifecycle")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl CommandLifecycle {
    #[must_use]
    pub fn new(session: Arc<dyn DiscordSession>) -> Self {
        Self::with_catalog(session, guild_catalog())
    }

    #[must_use]
    pub const fn with_catalog(session: Arc<dyn DiscordSession>, catalog: Vec<CommandDefinition>) -> Self {
        Self { session, catalog }
    }

    /// Creates every catalog command in the guild. Discord upserts by name,
    /// so commands that already exist are simply overwritten.
    #[instrument(skip(self))]
    pub async fn register_all(&self, guild_id: &str) -> Result<()> {
        for command in &self.catalog {
            self.session
                .application_command_create(Some(guild_id), command)
                .await?;
        }
        info!(count = self.catalog.len(), "Registered guild commands");
        Ok(())
    }

    /// Deletes every guild command except setup. A command that vanished
    /// between listing and deleting is not an error.
    #[instrument(skip(self))]
    pub async fn unregister_all(&self, guild_id: &str) -> Result<()> {
        let existing = self.session.application_commands(Some(guild_id)).await?;
        let mut removed = 0_usize;
        for command in existing.iter().filter(|c| c.name != SETUP_COMMAND) {
            match self
                .session
                .application_command_delete(Some(guild_id), &command.id)
                .await
            {
                Ok(()) => removed += 1,
                Err(e) => warn!(command = %command.name, "Could not delete command: {}", e),
            }
        }
        info!(removed, "Unregistered guild commands");
        Ok(())
    }

    /// Registers the global setup command once at startup.
    #[instrument(skip(self))]
    pub async fn register_global(&self) -> Result<()> {
        let existing = self.session.application_commands(None).await?;
        if existing.iter().any(|c| c.name == SETUP_COMMAND) {
            info!("Global setup command already registered");
            return Ok(());
        }
        self.session
            .application_command_create(None, &setup_command())
            .await?;
        info!("Registered global setup command");
        Ok(())
    }
}
