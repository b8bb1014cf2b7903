//! Value parsing
//!
//! - TOML fallback file (`[proxy]` identity table)
//! - Scalar environment values: durations, booleans, integers

use std::time::Duration;

use contracts::ContractError;
use serde::Deserialize;

/// Contents of the TOML fallback file
///
/// Only the `[proxy]` table is read; other tables (shared with sibling
/// services) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub proxy: ProxyIdentity,
}

/// Broker identity triple
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProxyIdentity {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_key: String,
}

/// Parse the TOML fallback file
pub fn parse_toml(content: &str) -> Result<FileConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a duration such as `500ms`, `30s`, `1m30s`, `1.5h`
///
/// A bare `0` is accepted; any other value needs a unit
/// (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`).
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos = 0.0_f64;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration '{input}'"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration '{input}'"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration '{input}'")),
            unit => return Err(format!("unknown unit '{unit}' in duration '{input}'")),
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Parse a boolean flag (`true/false`, `1/0`, `t/f`, `yes/no`)
pub fn parse_bool(input: &str) -> Result<bool, String> {
    match input.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Ok(true),
        "false" | "f" | "0" | "no" => Ok(false),
        other => Err(format!("invalid boolean '{other}'")),
    }
}
