//! ServiceConfig - Config Loader output
//!
//! The fully resolved proxy configuration: log level, broker identity and
//! registry settings. Immutable once constructed.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default broker address
pub const DEFAULT_MQTT_ADDRESS: &str = "tcp://localhost:1883";

/// Default broker operation timeout
pub const DEFAULT_MQTT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default registry chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 512_000;

/// Default grace period granted to a streamer after its sibling failed
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Complete proxy configuration
#[derive(Debug, Clone, Validate)]
pub struct ServiceConfig {
    /// Log level
    pub log_level: LogLevel,

    /// Broker (MQTT) settings
    #[validate(nested)]
    pub mqtt: MqttConfig,

    /// Artifact registry (HTTP) settings
    #[validate(nested)]
    pub registry: RegistryConfig,

    /// How long a streamer may take to exit once its sibling failed
    pub shutdown_timeout: Duration,
}

/// Broker connection settings
#[derive(Clone, Validate)]
pub struct MqttConfig {
    /// Broker address, e.g. `tcp://localhost:1883`
    #[validate(length(min = 1, message = "broker address cannot be empty"))]
    pub address: String,

    /// Timeout applied to connect / subscribe / disconnect
    pub timeout: Duration,

    /// Bus channel the proxy subscribes to
    #[validate(length(min = 1, message = "channel id cannot be empty"))]
    pub channel_id: String,

    /// Worker / client identifier
    #[validate(length(min = 1, message = "client id cannot be empty"))]
    pub client_id: String,

    /// Client key (broker password)
    #[validate(length(min = 1, message = "client key cannot be empty"))]
    pub client_key: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_MQTT_ADDRESS.to_string(),
            timeout: DEFAULT_MQTT_TIMEOUT,
            channel_id: String::new(),
            client_id: String::new(),
            client_key: String::new(),
        }
    }
}

impl MqttConfig {
    /// True when channel id, client id and client key are all present
    pub fn has_identity(&self) -> bool {
        !self.channel_id.is_empty() && !self.client_id.is_empty() && !self.client_key.is_empty()
    }
}

/// Artifact registry settings
#[derive(Clone, Validate)]
pub struct RegistryConfig {
    /// Chunk size (bytes) used when streaming artifacts over the bus
    #[validate(range(min = 1, message = "chunk size must be > 0"))]
    pub chunk_size: usize,

    /// Whether registry requests are authenticated
    pub authenticate: bool,

    /// Bearer token
    pub token: String,

    /// Basic auth username
    pub username: String,

    /// Basic auth password
    pub password: String,

    /// Registry base URL
    #[validate(url(message = "registry url must be a valid URL"))]
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            authenticate: false,
            token: String::new(),
            username: String::new(),
            password: String::new(),
            url: String::new(),
        }
    }
}

impl RegistryConfig {
    /// Derive the registry authentication mode
    ///
    /// A token wins over username/password when both are set.
    pub fn auth(&self) -> RegistryAuth {
        if !self.authenticate {
            RegistryAuth::Anonymous
        } else if !self.token.is_empty() {
            RegistryAuth::Bearer {
                token: self.token.clone(),
            }
        } else {
            RegistryAuth::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        }
    }
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("channel_id", &self.channel_id)
            .field("client_id", &self.client_id)
            .field("client_key", &redacted(&self.client_key))
            .finish()
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("chunk_size", &self.chunk_size)
            .field("authenticate", &self.authenticate)
            .field("token", &redacted(&self.token))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("url", &self.url)
            .finish()
    }
}

/// Placeholder shown instead of a secret value
pub fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Registry authentication mode
#[derive(Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    Anonymous,
    Bearer { token: String },
    Basic { username: String, password: String },
}

impl RegistryAuth {
    /// Mode name without credentials (safe for logs)
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
        }
    }
}

// Credentials never reach the logs.
impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Bearer { .. } => f.write_str("Bearer { token: <redacted> }"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lower-case level name, usable as a tracing filter directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServiceConfig {
        ServiceConfig {
            log_level: LogLevel::Info,
            mqtt: MqttConfig {
                channel_id: "channel-1".into(),
                client_id: "proxy-1".into(),
                client_key: "secret".into(),
                ..Default::default()
            },
            registry: RegistryConfig {
                url: "https://registry.example.com".into(),
                ..Default::default()
            },
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut config = valid_config();
        config.mqtt.client_key.clear();
        let errors = config.validate().unwrap_err();
        assert!(errors.errors().contains_key("mqtt"));
        assert!(!config.mqtt.has_identity());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = valid_config();
        config.registry.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_registry_url_rejected() {
        let mut config = valid_config();
        config.registry.url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_registry_auth_modes() {
        let mut registry = RegistryConfig::default();
        assert_eq!(registry.auth(), RegistryAuth::Anonymous);

        registry.authenticate = true;
        registry.username = "user".into();
        registry.password = "pass".into();
        assert_eq!(registry.auth().mode(), "basic");

        registry.token = "tok".into();
        assert_eq!(
            registry.auth(),
            RegistryAuth::Bearer {
                token: "tok".into()
            }
        );
    }

    #[test]
    fn test_registry_auth_debug_is_redacted() {
        let auth = RegistryAuth::Basic {
            username: "user".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_config_debug_hides_secrets() {
        let mut config = valid_config();
        config.registry.password = "hunter2".into();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("proxy-1"));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }
}
