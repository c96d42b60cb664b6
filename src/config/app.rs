use super::duration::{self, parse_duration};
use crate::cache::CacheSettings;
use crate::errors::{Error, Result};
use crate::resolver::ResolverSettings;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::Path};
use tracing::{debug, info};

pub const ENV_REQUEST_TIMEOUT: &str = "GUILDCONFIG_REQUEST_TIMEOUT";
pub const ENV_RESPONSE_TIMEOUT: &str = "GUILDCONFIG_RESPONSE_TIMEOUT";
pub const ENV_NATS_URL: &str = "NATS_URL";
pub const ENV_APP_ENV: &str = "APP_ENV";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsSettings,
    pub guild_config: GuildConfigSection,
    pub cache: CacheSection,
    pub correlation: CorrelationSection,
    pub router: RouterSection,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NatsSettings {
    pub servers: Vec<String>,
    /// JetStream stream holding every topic the edge touches
    pub stream: String,
    /// Deployment environment; names the consumer group
    pub environment: String,
    /// Deliveries before JetStream gives up on a message
    pub max_deliver: i64,
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            servers: vec!["localhost:4222".to_string()],
            stream: "FROLF".to_string(),
            environment: "dev".to_string(),
            max_deliver: 5,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct GuildConfigSection {
    #[serde(deserialize_with = "duration::deserialize")]
    pub request_timeout: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub response_timeout: Duration,
}

impl Default for GuildConfigSection {
    fn default() -> Self {
        let defaults = ResolverSettings::default();
        Self {
            request_timeout: defaults.request_timeout,
            response_timeout: defaults.response_timeout,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct CacheSection {
    pub max_size: usize,
    #[serde(deserialize_with = "duration::deserialize")]
    pub cache_ttl: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub refresh_ttl: Duration,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheSettings::default();
        Self {
            max_size: defaults.max_size,
            cache_ttl: defaults.cache_ttl,
            refresh_ttl: defaults.refresh_ttl,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct CorrelationSection {
    #[serde(deserialize_with = "duration::deserialize")]
    pub ttl: Duration,
}

impl Default for CorrelationSection {
    fn default() -> Self {
        Self {
            ttl: crate::correlation::DEFAULT_TTL,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct RouterSection {
    /// Deadline for a single handler invocation
    #[serde(deserialize_with = "duration::deserialize")]
    pub handler_timeout: Duration,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub const fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            request_timeout: self.guild_config.request_timeout,
            response_timeout: self.guild_config.response_timeout,
        }
    }

    #[must_use]
    pub const fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_size: self.cache.max_size,
            cache_ttl: self.cache.cache_ttl,
            refresh_ttl: self.cache.refresh_ttl,
        }
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            self.guild_config.request_timeout = parse_duration(&raw)?;
            debug!("{} overrides request timeout", ENV_REQUEST_TIMEOUT);
        }
        if let Some(raw) = lookup(ENV_RESPONSE_TIMEOUT) {
            self.guild_config.response_timeout = parse_duration(&raw)?;
            debug!("{} overrides response timeout", ENV_RESPONSE_TIMEOUT);
        }
        if let Some(url) = lookup(ENV_NATS_URL) {
            self.nats.servers = url.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(env) = lookup(ENV_APP_ENV) {
            self.nats.environment = env;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.resolver_settings().validate()?;
        self.cache_settings().validate()?;
        if self.nats.servers.is_empty() {
            return Err(Error::Config("at least one NATS server is required".to_string()));
        }
        if self.router.handler_timeout.is_zero() {
            return Err(Error::Config("router handler_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = fs::read_to_string(path_ref)
        .map_err(|e| Error::Config(format!("Failed to read config file {path_ref:?}: {e}")))?;
    let app_config: AppConfig = toml::from_str(&contents).map_err(|e| {
        Error::Config(format!(
            "Failed to parse TOML from config file {path_ref:?}: {e}"
        ))
    })?;
    Ok(app_config)
}

/// File (when present) → environment overrides → validation.
pub fn load_app_configuration<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    let mut app_config = if path_ref.exists() {
        info!("Loading configuration from {:?}", path_ref);
        load_config(path_ref)?
    } else {
        info!("No config file at {:?}, using defaults", path_ref);
        AppConfig::default()
    };
    app_config.apply_env_overrides(|key| std::env::var(key).ok())?;
    app_config.validate()?;
    Ok(app_config)
}
