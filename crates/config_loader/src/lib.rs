//! # Config Loader
//!
//! Configuration resolution for the proxy.
//!
//! Responsibilities:
//! - Read settings from environment variables (with defaults)
//! - Fall back to the `[proxy]` table of a TOML file when the broker identity is incomplete
//! - Validate the result and produce a `ServiceConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load(Path::new("config.toml")).unwrap();
//! println!("Broker: {}", config.mqtt.address);
//! ```

pub mod env;
mod parser;
mod validator;

pub use contracts::ServiceConfig;
pub use parser::{parse_bool, parse_duration, FileConfig, ProxyIdentity};

use contracts::ContractError;
use std::path::Path;

/// Default location of the TOML fallback file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration loader
///
/// Provides static methods to resolve configuration from the process
/// environment or an injected lookup.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve configuration from the process environment
    ///
    /// # Errors
    /// - Malformed environment values
    /// - Fallback file missing or unparsable (only consulted when the identity is incomplete)
    /// - Validation failure
    pub fn load(fallback_path: &Path) -> Result<ServiceConfig, ContractError> {
        Self::load_with(|key| std::env::var(key).ok(), fallback_path)
    }

    /// Resolve configuration from an arbitrary variable lookup
    pub fn load_with<F>(lookup: F, fallback_path: &Path) -> Result<ServiceConfig, ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = env::from_lookup(lookup)?;

        if !config.mqtt.has_identity() {
            let identity = Self::load_identity(fallback_path)?;
            config.mqtt.channel_id = identity.channel_id;
            config.mqtt.client_id = identity.client_id;
            config.mqtt.client_key = identity.client_key;
        }

        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already constructed configuration
    pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }
}

impl ConfigLoader {
    /// Read the broker identity from the TOML fallback file
    fn load_identity(path: &Path) -> Result<ProxyIdentity, ContractError> {
        if !path.exists() {
            return Err(ContractError::config_not_found(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(parser::parse_toml(&content)?.proxy)
    }
}
