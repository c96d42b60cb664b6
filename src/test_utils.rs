//! Shared test utilities.
//!
//! Programmable fakes for the two ports (Discord session and bus publisher)
//! plus builders for configs, interactions and a fully wired [`BotData`].

use crate::bot::session::{
    ChannelInfo, CommandDefinition, DiscordSession, InteractionReply, MessageButton, RegisteredCommand,
    RoleInfo,
};
use crate::bot::{BotData, CommandLifecycle};
use crate::bus::{BusMessage, Publisher};
use crate::cache::{CacheSettings, GuildConfigCache};
use crate::correlation::CorrelationStore;
use crate::errors::{Error, Result};
use crate::models::{
    DefaultPermissionMapper, DiscordInteraction, GuildConfig, InteractionHandle, InteractionKind,
    MemberInfo,
};
use crate::resolver::{GuildConfigResolver, ResolverSettings};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Called synchronously for every successful publish.
pub type PublishHook = Arc<dyn Fn(&str, &BusMessage) + Send + Sync>;

/// In-memory [`Publisher`] recording every message.
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<(String, BusMessage)>>,
    failure: Mutex<Option<String>>,
    hook: Mutex<Option<PublishHook>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish fails with `reason` until [`MemoryPublisher::recover`].
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn on_publish(&self, hook: PublishHook) {
        *self.hook.lock() = Some(hook);
    }

    pub fn published(&self) -> Vec<(String, BusMessage)> {
        self.published.lock().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<BusMessage> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.published.lock().iter().filter(|(t, _)| t == topic).count()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(Error::Publish(reason));
        }
        self.published
            .lock()
            .push((topic.to_string(), message.clone()));
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(topic, &message);
        }
        Ok(())
    }
}

/// One recorded Discord call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Respond {
        interaction_id: String,
        reply: InteractionReply,
    },
    EditResponse {
        interaction_id: String,
        content: String,
    },
    Followup {
        interaction_id: String,
        content: String,
        ephemeral: bool,
    },
    UserChannelCreate {
        user_id: String,
    },
    ChannelMessageSend {
        channel_id: String,
        content: String,
        buttons: Vec<MessageButton>,
    },
    ChannelMessageDelete {
        channel_id: String,
        message_id: String,
    },
    ReactionAdd {
        channel_id: String,
        message_id: String,
        emoji: String,
    },
    GuildChannels {
        guild_id: String,
    },
    GuildChannelCreate {
        guild_id: String,
        name: String,
    },
    ChannelEdit {
        channel_id: String,
        topic: String,
    },
    GuildRoles {
        guild_id: String,
    },
    GuildRoleCreate {
        guild_id: String,
        name: String,
    },
    ApplicationCommands {
        guild_id: Option<String>,
    },
    ApplicationCommandCreate {
        guild_id: Option<String>,
        name: String,
    },
    ApplicationCommandDelete {
        guild_id: Option<String>,
        command_id: String,
    },
}

/// Operation names accepted by [`FakeSession::fail`].
pub mod op {
    pub const RESPOND: &str = "interaction_respond";
    pub const EDIT: &str = "interaction_response_edit";
    pub const FOLLOWUP: &str = "followup_message_create";
    pub const USER_CHANNEL_CREATE: &str = "user_channel_create";
    pub const CHANNEL_MESSAGE_SEND: &str = "channel_message_send";
    pub const CHANNEL_MESSAGE_DELETE: &str = "channel_message_delete";
    pub const REACTION_ADD: &str = "message_reaction_add";
    pub const CHANNEL_EDIT: &str = "channel_edit";
    pub const GUILD_CHANNEL_CREATE: &str = "guild_channel_create";
    pub const GUILD_ROLE_CREATE: &str = "guild_role_create";
    pub const COMMAND_CREATE: &str = "application_command_create";
    pub const COMMAND_DELETE: &str = "application_command_delete";
}

/// Scriptable [`DiscordSession`]: every call is recorded; any operation can be
/// made to fail; channels, roles and commands live in memory.
#[derive(Default)]
pub struct FakeSession {
    calls: Mutex<Vec<SessionCall>>,
    failing: Mutex<HashSet<&'static str>>,
    channels: Mutex<HashMap<String, Vec<ChannelInfo>>>,
    roles: Mutex<HashMap<String, Vec<RoleInfo>>>,
    commands: Mutex<HashMap<Option<String>, Vec<RegisteredCommand>>>,
    next_id: AtomicU64,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().remove(operation);
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn add_channel(&self, guild_id: &str, id: &str, name: &str) {
        self.channels
            .lock()
            .entry(guild_id.to_string())
            .or_default()
            .push(ChannelInfo {
                id: id.to_string(),
                name: name.to_string(),
            });
    }

    pub fn command_names(&self, guild_id: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .lock()
            .get(&guild_id.map(ToString::to_string))
            .map(|cmds| cmds.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Edits and followups addressed to one interaction, in call order.
    pub fn replies_to(&self, interaction_id: &str) -> Vec<SessionCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                SessionCall::Respond {
                    interaction_id: id, ..
                }
                | SessionCall::EditResponse {
                    interaction_id: id, ..
                }
                | SessionCall::Followup {
                    interaction_id: id, ..
                } => id == interaction_id,
                _ => false,
            })
            .collect()
    }

    fn record(&self, call: SessionCall) {
        self.calls.lock().push(call);
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.lock().contains(operation) {
            return Err(Error::DiscordApi(format!("{operation} failed: Unknown Channel")));
        }
        Ok(())
    }

    fn fresh_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

#[async_trait]
impl DiscordSession for FakeSession {
    async fn interaction_respond(&self, handle: &InteractionHandle, reply: InteractionReply) -> Result<()> {
        self.record(SessionCall::Respond {
            interaction_id: handle.interaction_id.clone(),
            reply,
        });
        self.check(op::RESPOND)
    }

    async fn interaction_response_edit(&self, handle: &InteractionHandle, content: &str) -> Result<()> {
        self.record(SessionCall::EditResponse {
            interaction_id: handle.interaction_id.clone(),
            content: content.to_string(),
        });
        self.check(op::EDIT)
    }

    async fn followup_message_create(
        &self,
        handle: &InteractionHandle,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        self.record(SessionCall::Followup {
            interaction_id: handle.interaction_id.clone(),
            content: content.to_string(),
            ephemeral,
        });
        self.check(op::FOLLOWUP)
    }

    async fn user_channel_create(&self, user_id: &str) -> Result<String> {
        self.record(SessionCall::UserChannelCreate {
            user_id: user_id.to_string(),
        });
        self.check(op::USER_CHANNEL_CREATE)?;
        Ok(format!("dm-{user_id}"))
    }

    async fn channel_message_send(
        &self,
        channel_id: &str,
        content: &str,
        buttons: &[MessageButton],
    ) -> Result<String> {
        self.record(SessionCall::ChannelMessageSend {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
            buttons: buttons.to_vec(),
        });
        self.check(op::CHANNEL_MESSAGE_SEND)?;
        Ok(self.fresh_id())
    }

    async fn channel_message_delete(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.record(SessionCall::ChannelMessageDelete {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        self.check(op::CHANNEL_MESSAGE_DELETE)
    }

    async fn message_reaction_add(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.record(SessionCall::ReactionAdd {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        self.check(op::REACTION_ADD)
    }

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>> {
        self.record(SessionCall::GuildChannels {
            guild_id: guild_id.to_string(),
        });
        Ok(self.channels.lock().get(guild_id).cloned().unwrap_or_default())
    }

    async fn guild_channel_create(&self, guild_id: &str, name: &str) -> Result<ChannelInfo> {
        self.record(SessionCall::GuildChannelCreate {
            guild_id: guild_id.to_string(),
            name: name.to_string(),
        });
        self.check(op::GUILD_CHANNEL_CREATE)?;
        let channel = ChannelInfo {
            id: self.fresh_id(),
            name: name.to_string(),
        };
        self.channels
            .lock()
            .entry(guild_id.to_string())
            .or_default()
            .push(channel.clone());
        Ok(channel)
    }

    async fn channel_edit(&self, channel_id: &str, topic: &str) -> Result<()> {
        self.record(SessionCall::ChannelEdit {
            channel_id: channel_id.to_string(),
            topic: topic.to_string(),
        });
        self.check(op::CHANNEL_EDIT)
    }

    async fn guild_roles(&self, guild_id: &str) -> Result<Vec<RoleInfo>> {
        self.record(SessionCall::GuildRoles {
            guild_id: guild_id.to_string(),
        });
        Ok(self.roles.lock().get(guild_id).cloned().unwrap_or_default())
    }

    async fn guild_role_create(&self, guild_id: &str, name: &str) -> Result<RoleInfo> {
        self.record(SessionCall::GuildRoleCreate {
            guild_id: guild_id.to_string(),
            name: name.to_string(),
        });
        self.check(op::GUILD_ROLE_CREATE)?;
        let role = RoleInfo {
            id: self.fresh_id(),
            name: name.to_string(),
        };
        self.roles
            .lock()
            .entry(guild_id.to_string())
            .or_default()
            .push(role.clone());
        Ok(role)
    }

    async fn application_commands(&self, guild_id: Option<&str>) -> Result<Vec<RegisteredCommand>> {
        let scope = guild_id.map(ToString::to_string);
        self.record(SessionCall::ApplicationCommands {
            guild_id: scope.clone(),
        });
        Ok(self.commands.lock().get(&scope).cloned().unwrap_or_default())
    }

    async fn application_command_create(
        &self,
        guild_id: Option<&str>,
        command: &CommandDefinition,
    ) -> Result<RegisteredCommand> {
        let scope = guild_id.map(ToString::to_string);
        self.record(SessionCall::ApplicationCommandCreate {
            guild_id: scope.clone(),
            name: command.name.clone(),
        });
        self.check(op::COMMAND_CREATE)?;
        let mut commands = self.commands.lock();
        let scoped = commands.entry(scope).or_default();
        // Discord upserts by name.
        if let Some(existing) = scoped.iter().find(|c| c.name == command.name) {
            return Ok(existing.clone());
        }
        let created = RegisteredCommand {
            id: self.fresh_id(),
            name: command.name.clone(),
        };
        scoped.push(created.clone());
        Ok(created)
    }

    async fn application_command_delete(&self, guild_id: Option<&str>, command_id: &str) -> Result<()> {
        let scope = guild_id.map(ToString::to_string);
        self.record(SessionCall::ApplicationCommandDelete {
            guild_id: scope.clone(),
            command_id: command_id.to_string(),
        });
        self.check(op::COMMAND_DELETE)?;
        let mut commands = self.commands.lock();
        let scoped = commands.entry(scope).or_default();
        let before = scoped.len();
        scoped.retain(|c| c.id != command_id);
        if scoped.len() == before {
            return Err(Error::DiscordApi("Unknown application command".to_string()));
        }
        Ok(())
    }
}

/// A fully configured guild: channels 100/200/300, signup message 400.
pub fn configured_guild(guild_id: &str) -> GuildConfig {
    GuildConfig {
        signup_channel_id: "100".to_string(),
        event_channel_id: "200".to_string(),
        leaderboard_channel_id: "300".to_string(),
        signup_message_id: "400".to_string(),
        signup_emoji: "🥏".to_string(),
        admin_role_id: "admin-role".to_string(),
        editor_role_id: "editor-role".to_string(),
        registered_role_id: "player-role".to_string(),
        ..GuildConfig::new(guild_id)
    }
}

pub fn member(user_id: &str, roles: &[&str]) -> MemberInfo {
    MemberInfo {
        user_id: user_id.to_string(),
        role_ids: roles.iter().map(ToString::to_string).collect(),
        is_administrator: false,
    }
}

fn interaction(id: &str, guild_id: &str, member: MemberInfo, kind: InteractionKind) -> DiscordInteraction {
    DiscordInteraction {
        id: id.to_string(),
        token: format!("token-{id}"),
        application_id: "app".to_string(),
        guild_id: guild_id.to_string(),
        channel_id: "200".to_string(),
        member,
        kind,
    }
}

pub fn slash_command(id: &str, guild_id: &str, name: &str, member: MemberInfo) -> DiscordInteraction {
    interaction(
        id,
        guild_id,
        member,
        InteractionKind::Command {
            name: name.to_string(),
            options: BTreeMap::new(),
        },
    )
}

pub fn component(id: &str, guild_id: &str, custom_id: &str, member: MemberInfo) -> DiscordInteraction {
    interaction(
        id,
        guild_id,
        member,
        InteractionKind::Component {
            custom_id: custom_id.to_string(),
        },
    )
}

pub fn modal_submit(
    id: &str,
    guild_id: &str,
    custom_id: &str,
    fields: &[(&str, &str)],
    member: MemberInfo,
) -> DiscordInteraction {
    interaction(
        id,
        guild_id,
        member,
        InteractionKind::Modal {
            custom_id: custom_id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        },
    )
}

pub fn reaction(guild_id: &str, channel_id: &str, message_id: &str, emoji: &str, member: MemberInfo) -> DiscordInteraction {
    DiscordInteraction {
        channel_id: channel_id.to_string(),
        token: String::new(),
        ..interaction(
            "",
            guild_id,
            member,
            InteractionKind::Reaction {
                message_id: message_id.to_string(),
                emoji: emoji.to_string(),
            },
        )
    }
}

/// Wired-up dependencies with handles to the fakes behind them.
pub struct Harness {
    pub data: Arc<BotData>,
    pub session: Arc<FakeSession>,
    pub publisher: Arc<MemoryPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_resolver_settings(ResolverSettings {
            request_timeout: tokio::time::Duration::from_millis(50),
            response_timeout: tokio::time::Duration::from_millis(100),
        })
    }

    pub fn with_resolver_settings(settings: ResolverSettings) -> Self {
        let session = Arc::new(FakeSession::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let cache = Arc::new(
            GuildConfigCache::new(CacheSettings::default()).expect("default cache settings are valid"),
        );
        let resolver = GuildConfigResolver::new(
            cache,
            Arc::clone(&publisher) as Arc<dyn Publisher>,
            settings,
        )
        .expect("test resolver settings are valid");
        let data = Arc::new(BotData {
            session: Arc::clone(&session) as Arc<dyn DiscordSession>,
            publisher: Arc::clone(&publisher) as Arc<dyn Publisher>,
            resolver,
            interactions: Arc::new(CorrelationStore::default()),
            lifecycle: CommandLifecycle::new(Arc::clone(&session) as Arc<dyn DiscordSession>),
            permissions: Arc::new(DefaultPermissionMapper),
            shutdown: CancellationToken::new(),
        });
        Self {
            data,
            session,
            publisher,
        }
    }

    /// Caches a fully configured guild.
    pub fn with_guild(self, guild_id: &str) -> Self {
        self.data.resolver.cache().set(guild_id, configured_guild(guild_id));
        self
    }
}
