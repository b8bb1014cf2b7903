//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::LogLevel;
use std::path::PathBuf;

/// Proplet Proxy - bridges the proplet MQTT channel to an artifact registry
#[derive(Parser, Debug)]
#[command(
    name = "proplet-proxy",
    author,
    version,
    about = "Proplet MQTT / registry proxy",
    long_about = "Connects to the proplet message bus, subscribes to container requests \n\
                  and streams workloads from the artifact registry until stopped.\n\n\
                  Configuration is read from PROXY_* / PROPLET_* environment variables; \n\
                  the proplet identity falls back to the [proxy] table of --config."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PROXY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "json",
        global = true,
        env = "PROXY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// TOML file holding the fallback proplet identity
    #[arg(
        short,
        long,
        default_value = config_loader::DEFAULT_CONFIG_PATH,
        global = true,
        env = "PROXY_CONFIG_FILE"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level forced by -q / -v, if any
    pub fn log_level_override(&self) -> Option<LogLevel> {
        if self.quiet {
            return Some(LogLevel::Warn);
        }
        match self.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy until interrupted
    Run(RunArgs),

    /// Resolve and validate configuration without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "PROXY_RUN_TIMEOUT")]
    pub timeout: u64,

    /// Capacity of the inbound request queue
    #[arg(
        long,
        default_value = "64",
        value_parser = clap::value_parser!(u32).range(1..),
        env = "PROXY_DISPATCH_CAPACITY"
    )]
    pub dispatch_capacity: u32,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "PROXY_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Container request injected through the loopback broker (repeatable)
    #[arg(long = "request", value_name = "APP_NAME")]
    pub requests: Vec<String>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    #[default]
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
