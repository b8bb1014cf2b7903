//! Streamer trait - long-running protocol pump supervised by the orchestrator

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::BoxError;

/// Long-running stream task
///
/// `run` processes traffic until `ctx` is cancelled (returns `Ok`) or an
/// unrecoverable protocol error occurs (returns `Err`). Cancellation is the
/// only graceful-stop trigger and must be honoured with bounded latency.
#[trait_variant::make(Streamer: Send)]
pub trait LocalStreamer {
    /// Streamer name (used for logging and error tagging)
    fn name(&self) -> &str;

    /// Run to completion
    async fn run(self, ctx: CancellationToken) -> Result<(), BoxError>;
}

/// Which of the two supervised streamers a task is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamerRole {
    /// Streamer A: bus -> local dispatch
    Dispatch,
    /// Streamer B: registry fetch / stream
    Registry,
}

impl StreamerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Registry => "registry",
        }
    }
}

impl fmt::Display for StreamerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
