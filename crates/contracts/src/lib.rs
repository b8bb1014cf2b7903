//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the proxy workspace.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Contents
//! - `ServiceConfig`: the fully resolved proxy configuration
//! - `BrokerConnection` / `Streamer`: collaborator contracts driven by the lifecycle orchestrator
//! - `DispatchSender` / `DispatchReceiver`: the inbound request conduit
//!
//! ## Cancellation Model
//! Every blocking collaborator call takes a `CancellationToken` and must return
//! promptly once the token is cancelled.

mod broker;
mod config;
mod dispatch;
mod error;
mod phase;
mod streamer;

pub use broker::{BrokerConnection, LocalBrokerConnection};
pub use config::*;
pub use dispatch::{dispatch_channel, ContainerRequest, DispatchError, DispatchReceiver, DispatchSender};
pub use error::*;
pub use phase::Phase;
pub use streamer::{LocalStreamer, Streamer, StreamerRole};

pub use tokio_util::sync::CancellationToken;
