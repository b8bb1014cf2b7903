//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{redacted, LogLevel, RegistryAuth, ServiceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, ValidateArgs};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

/// Resolved configuration with secrets replaced by placeholders
#[derive(Serialize)]
struct ConfigSummary {
    log_level: String,
    mqtt_address: String,
    mqtt_timeout_ms: u64,
    channel_id: String,
    client_id: String,
    client_key: &'static str,
    registry_url: String,
    registry_auth: &'static str,
    registry_token: &'static str,
    registry_username: String,
    registry_password: &'static str,
    chunk_size: usize,
    shutdown_timeout_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    super::init_observability(cli, LogLevel::Warn, None)?;
    info!(config = %cli.config.display(), "Validating configuration");

    let config_path = cli.config.display().to_string();
    let result = match config_loader::ConfigLoader::load(&cli.config) {
        Ok(config) => valid_result(config_path, &config),
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn valid_result(config_path: String, config: &ServiceConfig) -> ValidationResult {
    let warnings = collect_warnings(config);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(summarize(config)),
    }
}

fn summarize(config: &ServiceConfig) -> ConfigSummary {
    ConfigSummary {
        log_level: config.log_level.to_string(),
        mqtt_address: config.mqtt.address.clone(),
        mqtt_timeout_ms: config.mqtt.timeout.as_millis() as u64,
        channel_id: config.mqtt.channel_id.clone(),
        client_id: config.mqtt.client_id.clone(),
        client_key: redacted(&config.mqtt.client_key),
        registry_url: config.registry.url.clone(),
        registry_auth: config.registry.auth().mode(),
        registry_token: redacted(&config.registry.token),
        registry_username: config.registry.username.clone(),
        registry_password: redacted(&config.registry.password),
        chunk_size: config.registry.chunk_size,
        shutdown_timeout_ms: config.shutdown_timeout.as_millis() as u64,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let registry = &config.registry;
    let has_credentials = !registry.token.is_empty()
        || !registry.username.is_empty()
        || !registry.password.is_empty();

    match registry.auth() {
        RegistryAuth::Anonymous if has_credentials => warnings.push(
            "registry credentials are set but PROXY_AUTHENTICATE is false - they will be ignored"
                .to_string(),
        ),
        RegistryAuth::Bearer { .. } if !registry.username.is_empty() => warnings.push(
            "both a registry token and a username are set - the token takes precedence".to_string(),
        ),
        _ => {}
    }

    if registry.authenticate && registry.url.starts_with("http://") {
        warnings.push(format!(
            "registry credentials will be sent over plain HTTP to {}",
            registry.url
        ));
    }

    if config.shutdown_timeout > config.mqtt.timeout {
        warnings.push(
            "shutdown timeout exceeds the broker timeout - a stuck streamer delays disconnect"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid");

        if let Some(ref summary) = result.summary {
            println!("\n  Log level:    {}", summary.log_level);
            println!("  Broker:       {}", summary.mqtt_address);
            println!("  Timeout:      {}ms", summary.mqtt_timeout_ms);
            println!("  Channel ID:   {}", summary.channel_id);
            println!("  Client ID:    {}", summary.client_id);
            println!("  Client key:   {}", summary.client_key);
            println!("  Registry:     {}", summary.registry_url);
            println!("  Auth:         {}", summary.registry_auth);
            println!("  Chunk size:   {} bytes", summary.chunk_size);
            println!("  Grace period: {}ms", summary.shutdown_timeout_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid (fallback file: {})", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
