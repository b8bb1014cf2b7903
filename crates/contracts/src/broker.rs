//! BrokerConnection trait - message bus handle driven by the orchestrator
//!
//! Lifecycle: NOT_CONNECTED -> CONNECTED -> SUBSCRIBED -> DISCONNECTED.
//! The orchestrator owns the transition sequence; implementations own the
//! protocol mechanics.

use tokio_util::sync::CancellationToken;

use crate::{BoxError, DispatchSender};

/// Message bus connection
///
/// Calls are never made concurrently on one handle. Every call must return
/// promptly once `ctx` is cancelled, even mid-operation.
#[trait_variant::make(BrokerConnection: Send)]
pub trait LocalBrokerConnection {
    /// Broker address (used for logging)
    fn address(&self) -> &str;

    /// Establish the connection
    async fn connect(&mut self, ctx: &CancellationToken) -> Result<(), BoxError>;

    /// Subscribe to the request topic, binding the inbound conduit
    ///
    /// The connection becomes the sole writer of `sink`.
    async fn subscribe(
        &mut self,
        ctx: &CancellationToken,
        sink: DispatchSender,
    ) -> Result<(), BoxError>;

    /// Release the connection
    async fn disconnect(&mut self, ctx: &CancellationToken) -> Result<(), BoxError>;
}
