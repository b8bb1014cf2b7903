//! Configuration validation
//!
//! Rules:
//! - channel id / client id / client key non-empty
//! - registry url is a valid URL
//! - chunk size > 0
//! - broker timeout and shutdown timeout > 0
//! - authenticated registry access carries a token or a username/password pair

use contracts::{ContractError, ServiceConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a `ServiceConfig`
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_timeouts(config)?;
    validate_registry_auth(config)?;
    Ok(())
}

/// Derived field rules (see `contracts::ServiceConfig`)
fn validate_fields(config: &ServiceConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

fn validate_timeouts(config: &ServiceConfig) -> Result<(), ContractError> {
    if config.mqtt.timeout.is_zero() {
        return Err(ContractError::config_validation(
            "mqtt.timeout",
            "broker timeout must be > 0",
        ));
    }
    if config.shutdown_timeout.is_zero() {
        return Err(ContractError::config_validation(
            "shutdown_timeout",
            "shutdown timeout must be > 0",
        ));
    }
    Ok(())
}

fn validate_registry_auth(config: &ServiceConfig) -> Result<(), ContractError> {
    let registry = &config.registry;
    if !registry.authenticate || !registry.token.is_empty() {
        return Ok(());
    }
    if registry.username.is_empty() || registry.password.is_empty() {
        return Err(ContractError::config_validation(
            "registry.authenticate",
            "authentication enabled but neither a token nor username and password are set",
        ));
    }
    Ok(())
}

/// Pick a deterministic (alphabetically first) violation as `(field path, message)`
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(violations) => violations.first().map(|v| {
                let message = v
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| v.code.to_string());
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(nested) => first_violation(nested, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, nested)| first_violation(nested, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LogLevel, MqttConfig, RegistryConfig, DEFAULT_SHUTDOWN_TIMEOUT};
    use std::time::Duration;

    fn minimal_config() -> ServiceConfig {
        ServiceConfig {
            log_level: LogLevel::Info,
            mqtt: MqttConfig {
                channel_id: "chan".into(),
                client_id: "id".into(),
                client_key: "key".into(),
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
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_missing_channel_id_names_field() {
        let mut config = minimal_config();
        config.mqtt.channel_id.clear();
        match validate(&config).unwrap_err() {
            ContractError::ConfigValidation { field, message } => {
                assert_eq!(field, "mqtt.channel_id");
                assert_eq!(message, "channel id cannot be empty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_url() {
        let mut config = minimal_config();
        config.registry.url = "registry".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("registry.url"));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = minimal_config();
        config.mqtt.timeout = Duration::ZERO;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("mqtt.timeout"));
    }

    #[test]
    fn test_auth_requires_credentials() {
        let mut config = minimal_config();
        config.registry.authenticate = true;
        assert!(validate(&config).is_err());

        config.registry.username = "user".into();
        assert!(validate(&config).is_err());

        config.registry.password = "pass".into();
        assert!(validate(&config).is_ok());

        config.registry.username.clear();
        config.registry.password.clear();
        config.registry.token = "tok".into();
        assert!(validate(&config).is_ok());
    }
}
