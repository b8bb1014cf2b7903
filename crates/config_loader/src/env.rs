//! Environment variable source
//!
//! Reads every proxy setting from a key lookup (normally `std::env::var`),
//! applying defaults for unset or empty variables.

use std::str::FromStr;
use std::time::Duration;

use contracts::{
    ContractError, LogLevel, MqttConfig, RegistryConfig, ServiceConfig, DEFAULT_CHUNK_SIZE,
    DEFAULT_MQTT_ADDRESS, DEFAULT_MQTT_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
};

use crate::parser::{parse_bool, parse_duration};

pub const LOG_LEVEL: &str = "PROXY_LOG_LEVEL";
pub const MQTT_ADDRESS: &str = "PROXY_MQTT_ADDRESS";
pub const MQTT_TIMEOUT: &str = "PROXY_MQTT_TIMEOUT";
pub const CHANNEL_ID: &str = "PROPLET_CHANNEL_ID";
pub const CLIENT_ID: &str = "PROPLET_CLIENT_ID";
pub const CLIENT_KEY: &str = "PROPLET_CLIENT_KEY";
pub const CHUNK_SIZE: &str = "PROXY_CHUNK_SIZE";
pub const AUTHENTICATE: &str = "PROXY_AUTHENTICATE";
pub const REGISTRY_TOKEN: &str = "PROXY_REGISTRY_TOKEN";
pub const REGISTRY_USERNAME: &str = "PROXY_REGISTRY_USERNAME";
pub const REGISTRY_PASSWORD: &str = "PROXY_REGISTRY_PASSWORD";
pub const REGISTRY_URL: &str = "PROXY_REGISTRY_URL";
pub const SHUTDOWN_TIMEOUT: &str = "PROXY_SHUTDOWN_TIMEOUT";

/// Build a `ServiceConfig` from a variable lookup
///
/// The identity triple may come back empty; the TOML fallback and the
/// validation pass run afterwards.
pub fn from_lookup<F>(lookup: F) -> Result<ServiceConfig, ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars { lookup };

    let registry_url = vars.string(REGISTRY_URL);
    if registry_url.is_empty() {
        return Err(ContractError::config_validation(
            REGISTRY_URL,
            "required environment variable is not set",
        ));
    }

    Ok(ServiceConfig {
        log_level: vars.parsed(LOG_LEVEL, LogLevel::Info)?,
        mqtt: MqttConfig {
            address: vars.string_or(MQTT_ADDRESS, DEFAULT_MQTT_ADDRESS),
            timeout: vars.duration(MQTT_TIMEOUT, DEFAULT_MQTT_TIMEOUT)?,
            channel_id: vars.string(CHANNEL_ID),
            client_id: vars.string(CLIENT_ID),
            client_key: vars.string(CLIENT_KEY),
        },
        registry: RegistryConfig {
            chunk_size: vars.parsed(CHUNK_SIZE, DEFAULT_CHUNK_SIZE)?,
            authenticate: vars.flag(AUTHENTICATE, false)?,
            token: vars.string(REGISTRY_TOKEN),
            username: vars.string(REGISTRY_USERNAME),
            password: vars.string(REGISTRY_PASSWORD),
            url: registry_url,
        },
        shutdown_timeout: vars.duration(SHUTDOWN_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT)?,
    })
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value of a variable; unset and blank are both `None`
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ContractError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| invalid(key, &raw, e)),
            None => Ok(default),
        }
    }

    fn duration(&self, key: &str, default: Duration) -> Result<Duration, ContractError> {
        match self.get(key) {
            Some(raw) => parse_duration(&raw).map_err(|e| invalid(key, &raw, e)),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ContractError> {
        match self.get(key) {
            Some(raw) => parse_bool(&raw).map_err(|e| invalid(key, &raw, e)),
            None => Ok(default),
        }
    }
}

fn invalid(key: &str, raw: &str, reason: impl std::fmt::Display) -> ContractError {
    ContractError::config_parse(format!("invalid value '{raw}' for {key}: {reason}"))
}
