//! Configuration loading: `config.toml`, then environment overrides, then
//! validation. The Discord token is read from the environment at startup and
//! never stored here.

/// Configuration structures and file loading
pub mod app;
/// Human-friendly duration parsing (`500ms`, `5s`, `2m`)
pub mod duration;

pub use app::{AppConfig, NatsSettings, load_app_configuration, load_config};
