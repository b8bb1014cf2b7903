//! Lifecycle error types

use std::time::Duration;

use contracts::{BoxError, Phase, StreamerRole};
use thiserror::Error;

/// Terminal failure of one orchestrator run, tagged with the phase that produced it
#[derive(Debug, Error)]
pub enum RunError {
    /// Broker connect failed; nothing else ran
    #[error("failed to connect to broker at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: BoxError,
    },

    /// Subscription failed; the connection was released
    #[error("failed to subscribe to container requests: {source}")]
    Subscribe {
        #[source]
        source: BoxError,
    },

    /// A streamer returned an error; its sibling was cancelled
    #[error("{role} streamer '{name}' failed: {source}")]
    Stream {
        role: StreamerRole,
        name: String,
        #[source]
        source: BoxError,
    },

    /// A streamer task panicked; its sibling was cancelled
    #[error("{role} streamer '{name}' panicked: {message}")]
    StreamPanicked {
        role: StreamerRole,
        name: String,
        message: String,
    },
}

impl RunError {
    /// Create connect error
    pub fn connect(address: impl Into<String>, source: BoxError) -> Self {
        Self::Connect {
            address: address.into(),
            source,
        }
    }

    /// Create streamer error
    pub fn stream(role: StreamerRole, name: impl Into<String>, source: BoxError) -> Self {
        Self::Stream {
            role,
            name: name.into(),
            source,
        }
    }

    /// Phase that produced this error
    pub fn phase(&self) -> Phase {
        match self {
            Self::Connect { .. } => Phase::Connect,
            Self::Subscribe { .. } => Phase::Subscribe,
            Self::Stream { .. } | Self::StreamPanicked { .. } => Phase::Stream,
        }
    }

    /// Streamer that produced this error, if any
    pub fn streamer_role(&self) -> Option<StreamerRole> {
        match self {
            Self::Stream { role, .. } | Self::StreamPanicked { role, .. } => Some(*role),
            _ => None,
        }
    }
}

/// Why a successful run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller cancelled the root token
    Cancelled,
    /// Both streamers returned on their own
    Completed,
}

/// Statistics from a successful run
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Wall time from connect to the end of teardown
    pub duration: Duration,

    /// Why the streamers stopped
    pub stop_reason: StopReason,

    /// Whether disconnect succeeded (teardown errors are never escalated)
    pub disconnected_cleanly: bool,
}

/// Result of one orchestrator run
pub type RunResult = Result<RunStats, RunError>;
