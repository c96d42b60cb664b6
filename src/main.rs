use clap::Parser;
use dotenvy::dotenv;
use frolf_bot::bot::{self, BotData, CommandLifecycle, DiscordSession, InteractionRegistry, SerenitySession};
use frolf_bot::bus::{NatsBus, Publisher, supervise};
use frolf_bot::cache::GuildConfigCache;
use frolf_bot::config::{self, AppConfig};
use frolf_bot::correlation::CorrelationStore;
use frolf_bot::errors::{Error, Result};
use frolf_bot::handlers;
use frolf_bot::models::DefaultPermissionMapper;
use frolf_bot::resolver::GuildConfigResolver;
use frolf_bot::router::{Router, TopicPolicy};
use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use std::{env, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Discord edge for the frolf platform.
#[derive(Parser, Debug)]
#[command(name = "frolf-bot", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Runtime {
    token: String,
    config: AppConfig,
    bus: Arc<NatsBus>,
    router: Arc<Router>,
    data: Arc<BotData>,
    shutdown: CancellationToken,
}

async fn startup(args: &Args) -> Result<Runtime> {
    let config = config::load_app_configuration(&args.config)?;
    info!("Successfully processed application configuration.");

    // Loaded directly before use, never stored in AppConfig
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    let bus = Arc::new(NatsBus::connect(&config.nats).await?);
    bus.ensure_stream().await?;
    let publisher: Arc<dyn Publisher> = Arc::clone(&bus) as Arc<dyn Publisher>;

    let shutdown = CancellationToken::new();
    let cache = Arc::new(GuildConfigCache::new(config.cache_settings())?);
    let resolver = GuildConfigResolver::new(cache, Arc::clone(&publisher), config.resolver_settings())?;
    let session: Arc<dyn DiscordSession> =
        Arc::new(SerenitySession::new(Arc::new(serenity::Http::new(&token))));

    let data = Arc::new(BotData {
        session: Arc::clone(&session),
        publisher: Arc::clone(&publisher),
        resolver,
        interactions: Arc::new(CorrelationStore::new(config.correlation.ttl)),
        lifecycle: CommandLifecycle::new(session),
        permissions: Arc::new(DefaultPermissionMapper),
        shutdown: shutdown.clone(),
    });

    let mut router = Router::new(publisher, TopicPolicy::standard(), config.router.handler_timeout);
    handlers::register_all(&mut router, &data)?;
    info!(topics = router.topics().len(), "Bus handlers registered");

    Ok(Runtime {
        token,
        config,
        bus,
        router: Arc::new(router),
        data,
        shutdown,
    })
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    () = shutdown.cancelled() => return,
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    () = shutdown.cancelled() => return,
                }
            }
        }
    }
    #[cfg(not(unix))]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        () = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

/// Returns how many sweepers ended abnormally.
async fn join_sweepers(sweepers: impl IntoIterator<Item = JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for sweeper in sweepers {
        if let Err(e) = sweeper.await {
            warn!("Sweeper task failed: {}", e);
            failed += 1;
        }
    }
    failed
}

impl Runtime {
    async fn run(self) -> Result<()> {
        let Self {
            token,
            config,
            bus,
            router,
            data,
            shutdown,
        } = self;

        let sweep_every = (config.correlation.ttl / 4).max(Duration::from_secs(1));
        let sweepers = [
            data.resolver.cache().spawn_sweeper(shutdown.clone()),
            data.interactions.spawn_sweeper(sweep_every, shutdown.clone()),
        ];
        tokio::spawn(wait_for_signal(shutdown.clone()));

        let bus_task = tokio::spawn(supervise(
            bus.serve(Arc::clone(&router), shutdown.clone()),
            shutdown.clone(),
        ));

        let registry: Arc<InteractionRegistry> = Arc::new(bot::commands::registry());
        let bot_result = bot::run_bot(&token, Arc::clone(&data), registry, shutdown.clone()).await;
        shutdown.cancel();

        let bus_result = match bus_task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Bus(format!("bus task failed: {e}"))),
        };
        router.close().await;
        join_sweepers(sweepers).await;
        info!("Shutdown complete");
        bot_result.and(bus_result)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok(); // env vars can also be set externally
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let runtime = match startup(&args).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::from(1);
        }
    };
    match runtime.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_sweepers_reports_panicked_tasks() {
        let sweepers = [
            tokio::spawn(async {}),
            tokio::spawn(async { panic!("sweeper blew up"); }),
        ];
        assert_eq!(join_sweepers(sweepers).await, 1);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["frolf-bot"]);
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert_eq!(args.log_level, "info");
    }
}
