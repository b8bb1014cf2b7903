//! Command implementations.

mod run;
mod validate;

pub use run::run_proxy;
pub use validate::run_validate;

use anyhow::Result;
use contracts::LogLevel;
use observability::ObservabilityConfig;

use crate::cli::Cli;

/// Initialise logging (and the optional metrics exporter) for a command
///
/// -q / -v win over `level`; `RUST_LOG` wins over both.
fn init_observability(cli: &Cli, level: LogLevel, metrics_port: Option<u16>) -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        default_log_level: cli.log_level_override().unwrap_or(level),
    })
}
