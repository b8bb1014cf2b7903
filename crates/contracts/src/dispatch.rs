//! Dispatch conduit - subscription output, dispatch streamer input
//!
//! Carries inbound bus requests from the broker subscription to the dispatch
//! streamer. One writer (the subscription), one reader (the streamer).

use async_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inbound request for a containerized workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRequest {
    /// Name of the requested workload / artifact
    pub app_name: String,
}

impl ContainerRequest {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

/// Dispatch failure, hands the rejected request back to the caller
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Queue is at capacity
    #[error("dispatch queue full, request '{}' rejected", .0.app_name)]
    Full(ContainerRequest),

    /// Reader side has gone away
    #[error("dispatch channel closed, request '{}' rejected", .0.app_name)]
    Closed(ContainerRequest),
}

/// Write side of the dispatch conduit
///
/// Deliberately not `Clone`: the subscription is the only writer.
#[derive(Debug)]
pub struct DispatchSender {
    tx: Sender<ContainerRequest>,
}

impl DispatchSender {
    /// Enqueue without waiting (for use from synchronous broker callbacks)
    pub fn try_dispatch(&self, request: ContainerRequest) -> Result<(), DispatchError> {
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(r) => DispatchError::Full(r),
            TrySendError::Closed(r) => DispatchError::Closed(r),
        })
    }

    /// Enqueue, waiting for capacity
    pub async fn dispatch(&self, request: ContainerRequest) -> Result<(), DispatchError> {
        self.tx
            .send(request)
            .await
            .map_err(|e| DispatchError::Closed(e.into_inner()))
    }

    /// Whether the reader side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read side of the dispatch conduit
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: Receiver<ContainerRequest>,
}

impl DispatchReceiver {
    /// Receive the next request; `None` once the writer is gone and the queue is drained
    pub async fn recv(&self) -> Option<ContainerRequest> {
        self.rx.recv().await.ok()
    }

    /// Number of queued requests
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Queue capacity
    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }
}

/// Create a bounded dispatch conduit
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn dispatch_channel(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = bounded(capacity);
    (DispatchSender { tx }, DispatchReceiver { rx })
}
