//! DispatchStreamer - drains the dispatch conduit into a local request handler

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{BoxError, CancellationToken, ContainerRequest, DispatchReceiver, Streamer};
use observability::{record_dispatch_depth, record_request_dispatched};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Handles one inbound container request
#[trait_variant::make(RequestHandler: Send)]
pub trait LocalRequestHandler {
    async fn handle(&mut self, request: ContainerRequest) -> Result<(), BoxError>;
}

/// Dispatch streamer failures
#[derive(Debug, Error)]
pub enum DispatchStreamError {
    /// The subscription dropped its writer while the run was still live
    #[error("dispatch channel closed by the broker subscription")]
    ChannelClosed,
}

/// Counters for one dispatch streamer
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    queue_len: AtomicUsize,
    handled_count: AtomicU64,
    failure_count: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn handled_count(&self) -> u64 {
        self.handled_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            queue_len: self.queue_len(),
            handled_count: self.handled_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Point-in-time copy of `DispatchMetrics`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub queue_len: usize,
    pub handled_count: u64,
    pub failure_count: u64,
}

/// Streamer A: forwards bus requests to a `RequestHandler`
///
/// A failing handler is logged and counted; only a closed conduit stops the
/// streamer with an error.
pub struct DispatchStreamer<H> {
    name: String,
    rx: DispatchReceiver,
    handler: H,
    metrics: Arc<DispatchMetrics>,
}

impl<H: RequestHandler + Send + 'static> DispatchStreamer<H> {
    pub fn new(name: impl Into<String>, rx: DispatchReceiver, handler: H) -> Self {
        Self {
            name: name.into(),
            rx,
            handler,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Shared counters, readable after the streamer has been moved into its task
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<H: RequestHandler + Send + 'static> Streamer for DispatchStreamer<H> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self, ctx: CancellationToken) -> Result<(), BoxError> {
        let Self {
            name,
            rx,
            mut handler,
            metrics,
        } = self;
        debug!(streamer = %name, "Dispatch streamer started");

        loop {
            let request = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                request = rx.recv() => request,
            };

            let Some(request) = request else {
                error!(streamer = %name, "Dispatch channel closed while running");
                return Err(DispatchStreamError::ChannelClosed.into());
            };

            metrics.set_queue_len(rx.len());
            record_dispatch_depth(rx.len());

            let app_name = request.app_name.clone();
            let outcome = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    warn!(app_name = %app_name, "Request handler interrupted by cancellation");
                    break;
                }
                outcome = handler.handle(request) => outcome,
            };
            match outcome {
                Ok(()) => {
                    metrics.handled_count.fetch_add(1, Ordering::Relaxed);
                    record_request_dispatched(true);
                }
                Err(e) => {
                    metrics.failure_count.fetch_add(1, Ordering::Relaxed);
                    record_request_dispatched(false);
                    error!(app_name = %app_name, error = %e, "Request handler failed");
                }
            }
        }

        info!(
            streamer = %name,
            handled = metrics.handled_count(),
            failed = metrics.failure_count(),
            "Dispatch streamer stopped"
        );
        Ok(())
    }
}

/// Handler that only logs each request
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl RequestHandler for LoggingHandler {
    async fn handle(&mut self, request: ContainerRequest) -> Result<(), BoxError> {
        info!(app_name = %request.app_name, "Received container request");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::dispatch_channel;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Collecting {
        seen: Arc<Mutex<Vec<String>>>,
        reject: Option<&'static str>,
    }

    impl RequestHandler for Collecting {
        async fn handle(&mut self, request: ContainerRequest) -> Result<(), BoxError> {
            if self.reject == Some(request.app_name.as_str()) {
                return Err(format!("cannot start {}", request.app_name).into());
            }
            self.seen.lock().unwrap().push(request.app_name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handles_requests_until_cancelled() {
        let (tx, rx) = dispatch_channel(8);
        let handler = Collecting {
            reject: Some("bad"),
            ..Default::default()
        };
        let seen = Arc::clone(&handler.seen);
        let streamer = DispatchStreamer::new("dispatch", rx, handler);
        let metrics = streamer.metrics();

        for name in ["one", "bad", "two"] {
            tx.try_dispatch(ContainerRequest::new(name)).unwrap();
        }

        let ctx = CancellationToken::new();
        let task = tokio::spawn(streamer.run(ctx.clone()));

        tokio::time::timeout(Duration::from_secs(1), async {
            while metrics.handled_count() + metrics.failure_count() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        ctx.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(
            metrics.snapshot(),
            DispatchSnapshot {
                queue_len: 0,
                handled_count: 2,
                failure_count: 1
            }
        );
    }

    struct Stalled;

    impl RequestHandler for Stalled {
        async fn handle(&mut self, _request: ContainerRequest) -> Result<(), BoxError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_slow_handler() {
        let (tx, rx) = dispatch_channel(1);
        tx.try_dispatch(ContainerRequest::new("slow")).unwrap();

        let streamer = DispatchStreamer::new("dispatch", rx, Stalled);
        let metrics = streamer.metrics();
        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), streamer.run(ctx))
            .await
            .expect("cancellation must not wait for the handler");
        assert!(result.is_ok());
        assert_eq!(metrics.handled_count(), 0);
        assert_eq!(metrics.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (tx, rx) = dispatch_channel(1);
        drop(tx);

        let streamer = DispatchStreamer::new("dispatch", rx, LoggingHandler);
        let err = streamer.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn test_cancellation_wins_over_closed_channel() {
        let (tx, rx) = dispatch_channel(1);
        drop(tx);

        let ctx = CancellationToken::new();
        ctx.cancel();
        let streamer = DispatchStreamer::new("dispatch", rx, LoggingHandler);
        assert!(streamer.run(ctx).await.is_ok());
    }
}
