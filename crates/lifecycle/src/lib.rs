//! # Lifecycle
//!
//! Connection lifecycle orchestration for the proxy.
//!
//! ## Flow
//! 1. Connect the broker; on failure nothing else runs
//! 2. Arm a `ConnectionGuard` so disconnect fires exactly once from here on
//! 3. Subscribe, binding the dispatch conduit
//! 4. Spawn the dispatch and registry streamers under a `StreamSupervisor`
//! 5. First streamer failure cancels the other; wait for both, then release
//!
//! ## Example
//!
//! ```ignore
//! let orchestrator = Orchestrator::new(OrchestratorConfig::from_service(&config));
//! let (tx, rx) = dispatch_channel(64);
//! let stats = orchestrator
//!     .run(&ctx, conn, tx, DispatchStreamer::new("dispatch", rx, LoggingHandler), registry)
//!     .await?;
//! ```

mod dispatch;
mod error;
mod guard;
pub mod mock;
mod orchestrator;
mod supervisor;

pub use dispatch::{
    DispatchMetrics, DispatchSnapshot, DispatchStreamError, DispatchStreamer, LocalRequestHandler,
    LoggingHandler, RequestHandler,
};
pub use error::{RunError, RunResult, RunStats, StopReason};
pub use guard::{ConnectionGuard, GuardError};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use supervisor::StreamSupervisor;
