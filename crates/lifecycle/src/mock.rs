//! Mock collaborators - scripted broker and streamers
//!
//! Used by the `run` command's loopback mode and by tests that need to
//! observe exactly which lifecycle calls were made and in what order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    BoxError, BrokerConnection, CancellationToken, ContainerRequest, DispatchError,
    DispatchSender, Streamer,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default address reported by the mock broker
pub const MOCK_BROKER_ADDRESS: &str = "mock://broker";

/// Observable lifecycle call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Subscribe,
    Disconnect,
    StreamStarted(String),
    StreamCancelled(String),
    StreamExited(String),
    /// Dropped mid-run, e.g. by a task abort
    StreamAborted(String),
}

/// Shared, ordered record of lifecycle events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LifecycleEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, event: LifecycleEvent) {
        self.lock().push(event);
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.lock().clone()
    }

    pub fn count(&self, event: &LifecycleEvent) -> usize {
        self.lock().iter().filter(|e| *e == event).count()
    }

    /// Index of the first occurrence of `event`
    pub fn position(&self, event: &LifecycleEvent) -> Option<usize> {
        self.lock().iter().position(|e| e == event)
    }

    /// Wait until `event` has been recorded at least once, up to `timeout`
    pub async fn wait_for(&self, event: &LifecycleEvent, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count(event) > 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Mock collaborator errors
#[derive(Debug, Error)]
pub enum MockError {
    #[error("connection refused by {0}")]
    ConnectRefused(String),

    #[error("subscription rejected by broker")]
    SubscribeRejected,

    #[error("disconnect rejected by broker")]
    DisconnectRejected,

    #[error("{0} called before connect")]
    NotConnected(&'static str),

    #[error("broker has no active subscription")]
    NotSubscribed,

    #[error("{0} cancelled")]
    Cancelled(&'static str),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Failure injected by a scripted streamer
    #[error("{0}")]
    Scripted(String),
}

/// Mock broker behaviour
#[derive(Debug, Clone)]
pub struct MockBrokerConfig {
    pub address: String,
    pub fail_connect: bool,
    pub fail_subscribe: bool,
    pub fail_disconnect: bool,
    pub connect_delay: Option<Duration>,
    pub disconnect_delay: Option<Duration>,
    /// Requests delivered as soon as the subscription is bound
    pub seed_requests: Vec<ContainerRequest>,
}

impl Default for MockBrokerConfig {
    fn default() -> Self {
        Self {
            address: MOCK_BROKER_ADDRESS.to_string(),
            fail_connect: false,
            fail_subscribe: false,
            fail_disconnect: false,
            connect_delay: None,
            disconnect_delay: None,
            seed_requests: Vec::new(),
        }
    }
}

/// Connection state of the mock broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockState {
    NotConnected,
    Connected,
    Subscribed,
    Disconnected,
}

/// In-memory broker connection
#[derive(Debug)]
pub struct MockBrokerConnection {
    config: MockBrokerConfig,
    log: EventLog,
    state: MockState,
    sink: Arc<Mutex<Option<DispatchSender>>>,
}

impl MockBrokerConnection {
    pub fn new(config: MockBrokerConfig, log: EventLog) -> Self {
        Self {
            config,
            log,
            state: MockState::NotConnected,
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> MockState {
        self.state
    }

    /// Handle for pushing requests into the bound subscription
    pub fn publisher(&self) -> MockPublisher {
        MockPublisher {
            sink: Arc::clone(&self.sink),
        }
    }

    fn bind(&self, sink: Option<DispatchSender>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

/// Sleep for `delay`, failing early if `ctx` is cancelled
async fn pause(
    ctx: &CancellationToken,
    delay: Option<Duration>,
    op: &'static str,
) -> Result<(), MockError> {
    let Some(delay) = delay else {
        return Ok(());
    };
    tokio::select! {
        _ = ctx.cancelled() => Err(MockError::Cancelled(op)),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

impl BrokerConnection for MockBrokerConnection {
    fn address(&self) -> &str {
        &self.config.address
    }

    async fn connect(&mut self, ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.record(LifecycleEvent::Connect);
        pause(ctx, self.config.connect_delay, "connect").await?;
        if self.config.fail_connect {
            return Err(MockError::ConnectRefused(self.config.address.clone()).into());
        }
        self.state = MockState::Connected;
        debug!(broker = %self.config.address, "Mock broker connected");
        Ok(())
    }

    async fn subscribe(
        &mut self,
        _ctx: &CancellationToken,
        sink: DispatchSender,
    ) -> Result<(), BoxError> {
        self.log.record(LifecycleEvent::Subscribe);
        if self.state != MockState::Connected {
            return Err(MockError::NotConnected("subscribe").into());
        }
        if self.config.fail_subscribe {
            return Err(MockError::SubscribeRejected.into());
        }

        for request in &self.config.seed_requests {
            sink.try_dispatch(request.clone()).map_err(MockError::from)?;
        }
        self.bind(Some(sink));
        self.state = MockState::Subscribed;
        Ok(())
    }

    async fn disconnect(&mut self, ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.record(LifecycleEvent::Disconnect);
        pause(ctx, self.config.disconnect_delay, "disconnect").await?;
        if self.config.fail_disconnect {
            return Err(MockError::DisconnectRejected.into());
        }
        self.bind(None);
        self.state = MockState::Disconnected;
        debug!(broker = %self.config.address, "Mock broker disconnected");
        Ok(())
    }
}

/// Publishes requests through a mock broker's subscription
#[derive(Debug, Clone)]
pub struct MockPublisher {
    sink: Arc<Mutex<Option<DispatchSender>>>,
}

impl MockPublisher {
    pub fn publish(&self, request: ContainerRequest) -> Result<(), MockError> {
        let guard = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let sink = guard.as_ref().ok_or(MockError::NotSubscribed)?;
        sink.try_dispatch(request)?;
        Ok(())
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Scripted streamer behaviour
#[derive(Debug, Clone)]
pub enum StreamBehavior {
    /// Idle until cancelled, then return Ok
    UntilCancelled,
    /// Return an error after `delay` unless cancelled first
    FailAfter { delay: Duration, message: String },
    /// Return Ok after the delay unless cancelled first
    CompleteAfter(Duration),
    /// Never return, even when cancelled
    IgnoreCancellation,
    /// Panic after the delay
    PanicAfter(Duration),
}

impl StreamBehavior {
    pub fn fail_after(delay: Duration, message: impl Into<String>) -> Self {
        Self::FailAfter {
            delay,
            message: message.into(),
        }
    }
}

/// Streamer driven by a `StreamBehavior` script
#[derive(Debug)]
pub struct ScriptedStreamer {
    name: String,
    behavior: StreamBehavior,
    log: EventLog,
    running: bool,
}

impl ScriptedStreamer {
    pub fn new(name: impl Into<String>, behavior: StreamBehavior, log: EventLog) -> Self {
        Self {
            name: name.into(),
            behavior,
            log,
            running: false,
        }
    }

    fn cancelled(&self) -> Result<(), BoxError> {
        info!(streamer = %self.name, "Scripted streamer cancelled");
        self.log.record(LifecycleEvent::StreamCancelled(self.name.clone()));
        Ok(())
    }
}

impl Streamer for ScriptedStreamer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(mut self, ctx: CancellationToken) -> Result<(), BoxError> {
        self.running = true;
        self.log.record(LifecycleEvent::StreamStarted(self.name.clone()));

        let result = match &self.behavior {
            StreamBehavior::UntilCancelled => {
                ctx.cancelled().await;
                self.cancelled()
            }
            StreamBehavior::FailAfter { delay, message } => {
                tokio::select! {
                    _ = ctx.cancelled() => self.cancelled(),
                    _ = tokio::time::sleep(*delay) => Err(MockError::Scripted(message.clone()).into()),
                }
            }
            StreamBehavior::CompleteAfter(delay) => {
                tokio::select! {
                    _ = ctx.cancelled() => self.cancelled(),
                    _ = tokio::time::sleep(*delay) => Ok(()),
                }
            }
            StreamBehavior::IgnoreCancellation => {
                std::future::pending::<()>().await;
                Ok(())
            }
            StreamBehavior::PanicAfter(delay) => {
                tokio::time::sleep(*delay).await;
                panic!("scripted panic in {}", self.name);
            }
        };

        self.running = false;
        self.log.record(LifecycleEvent::StreamExited(self.name.clone()));
        result
    }
}

impl Drop for ScriptedStreamer {
    fn drop(&mut self) {
        if self.running {
            debug!(streamer = %self.name, "Scripted streamer dropped mid-run");
            self.log.record(LifecycleEvent::StreamAborted(self.name.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::dispatch_channel;

    #[tokio::test]
    async fn test_broker_records_calls_in_order() {
        let log = EventLog::new();
        let mut conn = MockBrokerConnection::new(MockBrokerConfig::default(), log.clone());
        let ctx = CancellationToken::new();
        let (tx, _rx) = dispatch_channel(1);

        conn.connect(&ctx).await.unwrap();
        conn.subscribe(&ctx, tx).await.unwrap();
        assert_eq!(conn.state(), MockState::Subscribed);
        conn.disconnect(&ctx).await.unwrap();
        assert_eq!(conn.state(), MockState::Disconnected);

        assert_eq!(
            log.events(),
            vec![
                LifecycleEvent::Connect,
                LifecycleEvent::Subscribe,
                LifecycleEvent::Disconnect
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribe_requires_connect() {
        let log = EventLog::new();
        let mut conn = MockBrokerConnection::new(MockBrokerConfig::default(), log);
        let (tx, _rx) = dispatch_channel(1);

        let err = conn
            .subscribe(&CancellationToken::new(), tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("before connect"));
    }

    #[tokio::test]
    async fn test_connect_delay_honours_cancellation() {
        let log = EventLog::new();
        let mut conn = MockBrokerConnection::new(
            MockBrokerConfig {
                connect_delay: Some(Duration::from_secs(30)),
                ..Default::default()
            },
            log,
        );
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = conn.connect(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "connect cancelled");
        assert_eq!(conn.state(), MockState::NotConnected);
    }

    #[tokio::test]
    async fn test_publisher_delivers_through_subscription() {
        let log = EventLog::new();
        let mut conn = MockBrokerConnection::new(
            MockBrokerConfig {
                seed_requests: vec![ContainerRequest::new("seeded")],
                ..Default::default()
            },
            log,
        );
        let publisher = conn.publisher();
        assert!(matches!(
            publisher.publish(ContainerRequest::new("early")),
            Err(MockError::NotSubscribed)
        ));

        let ctx = CancellationToken::new();
        let (tx, rx) = dispatch_channel(4);
        conn.connect(&ctx).await.unwrap();
        conn.subscribe(&ctx, tx).await.unwrap();
        publisher.publish(ContainerRequest::new("live")).unwrap();

        assert_eq!(rx.recv().await.unwrap().app_name, "seeded");
        assert_eq!(rx.recv().await.unwrap().app_name, "live");

        conn.disconnect(&ctx).await.unwrap();
        assert!(!publisher.is_subscribed());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_scripted_streamer_records_abort() {
        let log = EventLog::new();
        let streamer = ScriptedStreamer::new("stuck", StreamBehavior::IgnoreCancellation, log.clone());

        let task = tokio::spawn(streamer.run(CancellationToken::new()));
        assert!(
            log.wait_for(&LifecycleEvent::StreamStarted("stuck".into()), Duration::from_secs(1))
                .await
        );
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(log.count(&LifecycleEvent::StreamAborted("stuck".into())), 1);
        assert_eq!(log.count(&LifecycleEvent::StreamExited("stuck".into())), 0);
    }

    #[tokio::test]
    async fn test_scripted_streamer_fails_on_schedule() {
        let log = EventLog::new();
        let streamer = ScriptedStreamer::new(
            "pump",
            StreamBehavior::fail_after(Duration::from_millis(5), "pipe burst"),
            log.clone(),
        );

        let err = streamer.run(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "pipe burst");
        assert_eq!(
            log.events(),
            vec![
                LifecycleEvent::StreamStarted("pump".into()),
                LifecycleEvent::StreamExited("pump".into())
            ]
        );
    }
}
