//! Error types for CLI operations.

use contracts::ContractError;
use lifecycle::RunError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be resolved or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ContractError),

    /// The proxy run ended with a failure
    #[error("Proxy run failed during {phase}: {source}")]
    Run {
        phase: contracts::Phase,
        #[source]
        source: RunError,
    },

    /// Signal handler could not be installed
    #[error("Failed to install {signal} handler: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl From<RunError> for CliError {
    fn from(source: RunError) -> Self {
        Self::Run {
            phase: source.phase(),
            source,
        }
    }
}

impl CliError {
    pub fn signal(signal: &'static str, source: std::io::Error) -> Self {
        Self::Signal { signal, source }
    }
}
