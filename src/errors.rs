//! Unified error types for the frolf Discord edge.
//!
//! `Error` is what handlers, the router and the Discord layer pass around.
//! `ConfigError` is the narrower taxonomy the guild config resolver hands to
//! every coalesced waiter; it is `Clone` so a single outcome can be fanned out.

use thiserror::Error;

/// Outcome classes the guild config resolver produces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The backend has not answered yet; the caller should retry shortly.
    #[error("guild config for {guild_id} is still loading")]
    Loading { guild_id: String },

    /// The guild has no configuration and retrying will not help.
    #[error("guild config not found: {reason}")]
    NotFound { reason: String },

    /// Transient failure; the next user action may succeed.
    #[error("temporary guild config failure: {reason}")]
    Temporary {
        reason: String,
        cause: Option<String>,
    },
}

impl ConfigError {
    pub fn temporary(reason: impl Into<String>) -> Self {
        Self::Temporary {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn temporary_with_cause(reason: impl Into<String>, cause: impl ToString) -> Self {
        Self::Temporary {
            reason: reason.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Loading { .. } => ErrorKind::ConfigLoading,
            Self::NotFound { .. } => ErrorKind::ConfigNotFound,
            Self::Temporary { .. } => ErrorKind::ConfigTemporary,
        }
    }
}

/// Coarse error classification used for ack/nack decisions and user replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigLoading,
    ConfigNotFound,
    ConfigTemporary,
    ValidationError,
    PublishError,
    DiscordApiError,
    HandlerPanic,
    HandlerTimeout,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    GuildConfig(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("Discord API error: {0}")]
    DiscordApi(String),

    #[error("Handler `{handler}` panicked: {message}")]
    HandlerPanic { handler: String, message: String },

    #[error("Handler `{0}` exceeded its deadline")]
    HandlerTimeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::GuildConfig(e) => e.kind(),
            Self::Validation(_) | Self::Serialization(_) => ErrorKind::ValidationError,
            Self::Publish(_) | Self::Bus(_) => ErrorKind::PublishError,
            Self::DiscordApi(_) => ErrorKind::DiscordApiError,
            Self::HandlerPanic { .. } => ErrorKind::HandlerPanic,
            Self::HandlerTimeout(_) => ErrorKind::HandlerTimeout,
            Self::Config(_) | Self::Io(_) | Self::EnvVar(_) => ErrorKind::Internal,
        }
    }

    /// Whether the inbound bus message should be redelivered.
    ///
    /// Bad input is acked so it does not loop forever; everything else is
    /// treated as infrastructure trouble and nacked.
    #[must_use]
    pub const fn should_redeliver(&self) -> bool {
        !matches!(self.kind(), ErrorKind::ValidationError)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::DiscordApi(value.to_string())
    }
}

impl From<async_nats::Error> for Error {
    fn from(value: async_nats::Error) -> Self {
        Self::Bus(value.to_string())
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
