//! Orchestrator - sequences connect, subscribe, streaming and teardown
//!
//! ```text
//! connect ──▶ guard ──▶ subscribe ──▶ supervisor ─┬─▶ streamer A
//!                │                                └─▶ streamer B
//!                └──────────── release (disconnect) ◀── both exited
//! ```

use std::time::{Duration, Instant};

use contracts::{
    BrokerConnection, CancellationToken, DispatchSender, Phase, ServiceConfig, Streamer,
    StreamerRole, DEFAULT_MQTT_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
};
use observability::{record_phase, record_run};
use tracing::{error, info, instrument, warn};

use crate::error::{RunError, RunResult, RunStats, StopReason};
use crate::guard::ConnectionGuard;
use crate::supervisor::StreamSupervisor;

/// Orchestrator timing
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Upper bound on the disconnect call
    pub disconnect_timeout: Duration,
    /// Grace period for the surviving streamer after its sibling failed
    pub shutdown_timeout: Duration,
}

impl OrchestratorConfig {
    pub fn from_service(config: &ServiceConfig) -> Self {
        Self {
            disconnect_timeout: config.mqtt.timeout,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            disconnect_timeout: DEFAULT_MQTT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Proxy lifecycle orchestrator
///
/// Stateless between runs; every invocation of `run` owns its connection,
/// conduit and streamers.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one proxy lifecycle to completion
    ///
    /// Returns once both streamers have exited and the connection has been
    /// released, or immediately if connect fails.
    #[instrument(name = "proxy_run", skip_all, fields(broker = %conn.address()))]
    pub async fn run<C, A, B>(
        &self,
        ctx: &CancellationToken,
        mut conn: C,
        dispatch: DispatchSender,
        dispatch_streamer: A,
        registry_streamer: B,
    ) -> RunResult
    where
        C: BrokerConnection + Send + 'static,
        A: Streamer + Send + 'static,
        B: Streamer + Send + 'static,
    {
        let started = Instant::now();

        if let Err(source) = conn.connect(ctx).await {
            record_phase(Phase::Connect, false);
            let err = RunError::connect(conn.address(), source);
            error!(error = %err, "Connect failed");
            record_run(Some(Phase::Connect));
            return Err(err);
        }
        record_phase(Phase::Connect, true);
        info!("successfully connected to broker");

        let mut guard = ConnectionGuard::new(conn, self.config.disconnect_timeout);

        let outcome = self
            .serve(
                ctx,
                &mut guard,
                dispatch,
                dispatch_streamer,
                registry_streamer,
            )
            .await;

        let disconnected_cleanly = guard.release().await;
        if !disconnected_cleanly {
            warn!("Connection was not released cleanly");
        }

        record_run(outcome.as_ref().err().map(RunError::phase));

        match outcome {
            Ok(stop_reason) => {
                let duration = started.elapsed();
                info!(
                    stop_reason = ?stop_reason,
                    duration_ms = duration.as_millis() as u64,
                    "Proxy run finished"
                );
                Ok(RunStats {
                    duration,
                    stop_reason,
                    disconnected_cleanly,
                })
            }
            Err(err) => {
                error!(phase = %err.phase(), error = %err, "Proxy run failed");
                Err(err)
            }
        }
    }

    /// Subscribe, then stream until both streamers have exited
    async fn serve<C, A, B>(
        &self,
        ctx: &CancellationToken,
        guard: &mut ConnectionGuard<C>,
        dispatch: DispatchSender,
        dispatch_streamer: A,
        registry_streamer: B,
    ) -> Result<StopReason, RunError>
    where
        C: BrokerConnection + Send + 'static,
        A: Streamer + Send + 'static,
        B: Streamer + Send + 'static,
    {
        if let Err(source) = guard.subscribe(ctx, dispatch).await {
            record_phase(Phase::Subscribe, false);
            return Err(RunError::Subscribe { source });
        }
        record_phase(Phase::Subscribe, true);
        info!("successfully subscribed to topic");

        let mut supervisor =
            StreamSupervisor::new(ctx, self.config.shutdown_timeout, guard.streams());
        supervisor.spawn(StreamerRole::Dispatch, dispatch_streamer);
        supervisor.spawn(StreamerRole::Registry, registry_streamer);

        let result = supervisor.wait().await;
        record_phase(Phase::Stream, result.is_ok());
        result?;

        Ok(if ctx.is_cancelled() {
            StopReason::Cancelled
        } else {
            StopReason::Completed
        })
    }
}
