use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::EngineConfig;
use dico_core::DEFAULT_EVENT_CAPACITY;
use dico_persistence::connection::DEFAULT_DATABASE_URL;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("JWT_SECRET is required unless AUTH_DEV_MODE=true")]
    MissingJwtSecret,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Tab-separated word list; the built-in sample list is used when unset.
    pub words_file: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub auth_dev_mode: bool,
    pub start_grace_ms: u64,
    pub round_grace_ms: u64,
    pub event_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let config = Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            words_file: get("WORDS_FILE"),
            jwt_secret: get("JWT_SECRET"),
            jwt_issuer: get("JWT_ISSUER"),
            auth_dev_mode: parse_or(&get, "AUTH_DEV_MODE", false)?,
            start_grace_ms: parse_or(&get, "START_GRACE_MS", 100)?,
            round_grace_ms: parse_or(&get, "ROUND_GRACE_MS", 100)?,
            event_channel_capacity: parse_or(
                &get,
                "EVENT_CHANNEL_CAPACITY",
                DEFAULT_EVENT_CAPACITY,
            )?,
        };

        if !config.auth_dev_mode && config.jwt_secret.is_none() {
            return Err(ConfigError::MissingJwtSecret);
        }

        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            start_grace: Duration::from_millis(self.start_grace_ms),
            round_grace: Duration::from_millis(self.round_grace_ms),
            ..Default::default()
        }
    }
}

fn parse_or<G, T>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
