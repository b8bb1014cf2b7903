//! ConnectionGuard - release obligation for an acquired broker connection
//!
//! Created right after a successful connect. `release` runs disconnect on the
//! normal unwinding path; `Drop` covers an invocation that is aborted or
//! panics before reaching it. Either way disconnect fires exactly once, and
//! only after every streamer task registered on the guard's tracker is gone.

use std::time::Duration;

use contracts::{BoxError, BrokerConnection, CancellationToken, DispatchSender, Phase};
use observability::{record_phase, record_teardown_failure};
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Guard misuse
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("broker connection already released")]
    Released,
}

/// Owns a connected broker handle until it is released
pub struct ConnectionGuard<C: BrokerConnection + Send + 'static> {
    conn: Option<C>,
    budget: Duration,
    streams: TaskTracker,
}

impl<C: BrokerConnection + Send + 'static> ConnectionGuard<C> {
    /// Arm the guard for a connected handle
    ///
    /// `budget` bounds the disconnect call.
    pub fn new(conn: C, budget: Duration) -> Self {
        Self {
            conn: Some(conn),
            budget,
            streams: TaskTracker::new(),
        }
    }

    /// Tracker for tasks that must be gone before disconnect runs
    pub fn streams(&self) -> TaskTracker {
        self.streams.clone()
    }

    /// Subscribe the guarded connection
    pub async fn subscribe(
        &mut self,
        ctx: &CancellationToken,
        sink: DispatchSender,
    ) -> Result<(), BoxError> {
        match self.conn.as_mut() {
            Some(conn) => conn.subscribe(ctx, sink).await,
            None => Err(GuardError::Released.into()),
        }
    }

    /// Disconnect now, returning whether it succeeded
    pub async fn release(mut self) -> bool {
        let Some(mut conn) = self.conn.take() else {
            return true;
        };
        drain(&self.streams, self.budget).await;
        disconnect(&mut conn, self.budget).await
    }
}

impl<C: BrokerConnection + Send + 'static> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let budget = self.budget;
        let streams = self.streams.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    broker = %conn.address(),
                    "Connection guard dropped before release, disconnecting in background"
                );
                handle.spawn(async move {
                    drain(&streams, budget).await;
                    disconnect(&mut conn, budget).await;
                });
            }
            Err(_) => {
                error!(
                    broker = %conn.address(),
                    "Connection guard dropped outside a runtime, connection not released"
                );
                record_teardown_failure();
            }
        }
    }
}

/// Wait (up to `budget`) for every tracked streamer task to finish or be dropped
async fn drain(streams: &TaskTracker, budget: Duration) {
    streams.close();
    if tokio::time::timeout(budget, streams.wait()).await.is_err() {
        warn!(
            remaining = streams.len(),
            "Streamer tasks still alive at teardown, disconnecting anyway"
        );
    }
}

/// Disconnect with a fresh token so a cancelled root does not short-circuit teardown
async fn disconnect<C: BrokerConnection>(conn: &mut C, budget: Duration) -> bool {
    let token = CancellationToken::new();

    let ok = match tokio::time::timeout(budget, conn.disconnect(&token)).await {
        Ok(Ok(())) => {
            info!(broker = %conn.address(), "Disconnected from broker");
            true
        }
        Ok(Err(e)) => {
            error!(broker = %conn.address(), error = %e, "Failed to disconnect MQTT client");
            false
        }
        Err(_) => {
            token.cancel();
            error!(
                broker = %conn.address(),
                budget_ms = budget.as_millis() as u64,
                "Disconnect timed out"
            );
            false
        }
    };

    record_phase(Phase::Disconnect, ok);
    if !ok {
        record_teardown_failure();
    }
    ok
}
