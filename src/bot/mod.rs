//! Bot layer - the Discord side of the edge
//!
//! Gateway events arrive through poise's event handler, are converted into
//! transport-free [`DiscordInteraction`]s and routed by the
//! [`InteractionRegistry`]. Everything the bot says back goes through the
//! [`DiscordSession`] port.

/// Slash command, component, modal and reaction handlers
pub mod commands;
/// serenity event → `DiscordInteraction` conversion
pub mod convert;
/// Per-guild command registration
pub mod lifecycle;
/// Interaction routing and policy checks
pub mod registry;
/// Discord REST port and its serenity implementation
pub mod session;

pub use lifecycle::CommandLifecycle;
pub use registry::{CommandPolicy, Dispatch, InteractionHandler, InteractionRegistry};
pub use session::{DiscordSession, SerenitySession};

use crate::bus::Publisher;
use crate::correlation::CorrelationStore;
use crate::errors::{Error, Result};
use crate::models::{DiscordInteraction, InteractionHandle, PermissionMapper};
use crate::resolver::GuildConfigResolver;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Shared state for interaction handlers and bus handlers alike.
pub struct BotData {
    pub session: Arc<dyn DiscordSession>,
    pub publisher: Arc<dyn Publisher>,
    pub resolver: Arc<GuildConfigResolver>,
    /// Deferred interactions waiting for a backend reply, keyed by correlation ID
    pub interactions: Arc<CorrelationStore<InteractionHandle>>,
    pub lifecycle: CommandLifecycle,
    pub permissions: Arc<dyn PermissionMapper>,
    /// Fired once on shutdown; blocking waits select on it.
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for BotData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotData")
            .field("pending_interactions", &self.interactions.len())
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// poise user data. The event handler is a plain function pointer, so the
/// registry has to travel with the data.
#[derive(Debug)]
pub struct FrameworkData {
    pub bot: Arc<BotData>,
    pub registry: Arc<InteractionRegistry>,
}

type FrameworkError<'a> = poise::FrameworkError<'a, FrameworkData, Error>;

async fn on_error(error: FrameworkError<'_>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!(event = event.snake_case_name(), "Error in event handler: {}", error);
        }
        // Slash commands are owned by the interaction registry, not poise.
        poise::FrameworkError::UnknownInteraction { interaction, .. } => {
            trace!(command = %interaction.data.name, "Interaction left to the registry");
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    framework: poise::FrameworkContext<'_, FrameworkData, Error>,
    data: &FrameworkData,
) -> Result<()> {
    let interaction = match event {
        serenity::FullEvent::InteractionCreate { interaction } => convert::interaction(interaction),
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if add_reaction.user_id == Some(framework.bot_id) {
                return Ok(());
            }
            convert::reaction(add_reaction)
        }
        _ => return Ok(()),
    };
    let Some(interaction) = interaction else {
        return Ok(());
    };
    route(data, &interaction).await;
    Ok(())
}

/// Dispatches one interaction. Handler errors are logged here; the user has
/// already been answered by the handler or the policy check.
async fn route(data: &FrameworkData, interaction: &DiscordInteraction) {
    match data.registry.dispatch(&data.bot, interaction).await {
        Ok(outcome) => debug!(interaction_id = %interaction.id, ?outcome, "Interaction dispatched"),
        Err(e) => error!(
            interaction_id = %interaction.id,
            guild_id = %interaction.guild_id,
            key = ?interaction.dispatch_key(),
            "Interaction handler failed: {}",
            e
        ),
    }
}

/// Connects to the gateway and runs until `shutdown` fires.
#[instrument(skip_all)]
pub async fn run_bot(
    token: &str,
    bot: Arc<BotData>,
    registry: Arc<InteractionRegistry>,
    shutdown: CancellationToken,
) -> Result<()> {
    let data = FrameworkData { bot, registry };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: Vec::new(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                if let Err(e) = data.bot.lifecycle.register_global().await {
                    warn!("Could not register the global setup command: {}", e);
                }
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("Shutting down Discord shards");
        shard_manager.shutdown_all().await;
    });

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
