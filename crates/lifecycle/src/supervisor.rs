//! StreamSupervisor - fan-out supervision for the two streamers
//!
//! Holds the derived cancellation token and a join barrier over exactly the
//! tasks it spawned. The first failure cancels the token; the supervisor then
//! waits for every remaining task to exit before reporting.

use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;

use contracts::{BoxError, CancellationToken, Streamer, StreamerRole};
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::RunError;

struct TaskLabel {
    role: StreamerRole,
    name: String,
}

/// Supervisor over a fixed set of streamer tasks
pub struct StreamSupervisor {
    /// Child of the invocation's root token; cancelled on first failure
    cancel: CancellationToken,
    /// Join barrier
    tasks: JoinSet<Result<(), BoxError>>,
    /// Task id -> streamer identity
    labels: HashMap<Id, TaskLabel>,
    /// How long survivors may take to exit after a failure before being aborted
    grace: Duration,
    /// Outlives the join barrier; lets teardown wait for aborted tasks to unwind
    tracker: TaskTracker,
}

impl StreamSupervisor {
    /// Create a supervisor whose token is a child of `parent`
    ///
    /// Every spawned task is also registered on `tracker`.
    pub fn new(parent: &CancellationToken, grace: Duration, tracker: TaskTracker) -> Self {
        Self {
            cancel: parent.child_token(),
            tasks: JoinSet::new(),
            labels: HashMap::new(),
            grace,
            tracker,
        }
    }

    /// Spawn a streamer against the derived token
    pub fn spawn<S>(&mut self, role: StreamerRole, streamer: S)
    where
        S: Streamer + Send + 'static,
    {
        let name = streamer.name().to_string();
        let token = self.cancel.clone();
        let span = info_span!("streamer", role = %role, name = %name);

        let handle = self.tasks.spawn(self.tracker.track_future(
            async move {
                info!("Streamer started");
                let result = streamer.run(token.clone()).await;
                if result.is_err() {
                    // Stop the sibling before this task is even joined.
                    token.cancel();
                }
                result
            }
            .instrument(span),
        ));

        debug!(role = %role, name = %name, task = %handle.id(), "Streamer task spawned");
        self.labels.insert(handle.id(), TaskLabel { role, name });
    }

    /// Wait for every task to exit
    ///
    /// Returns the first failure observed, or Ok(()) when all tasks returned Ok.
    pub async fn wait(mut self) -> Result<(), RunError> {
        let mut first_failure: Option<RunError> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let joined = match deadline {
                None => self.tasks.join_next_with_id().await,
                Some(at) => match tokio::time::timeout_at(at, self.tasks.join_next_with_id()).await
                {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            remaining = self.tasks.len(),
                            grace_ms = self.grace.as_millis() as u64,
                            "Streamers ignored cancellation past the grace period, aborting"
                        );
                        self.tasks.abort_all();
                        deadline = None;
                        continue;
                    }
                },
            };

            let Some(joined) = joined else {
                break;
            };

            let Some(failure) = self.classify(joined) else {
                continue;
            };

            if first_failure.is_none() {
                error!(error = %failure, "Streamer failed, cancelling sibling");
                self.cancel.cancel();
                deadline = Some(Instant::now() + self.grace);
                first_failure = Some(failure);
            } else {
                warn!(error = %failure, "Streamer failed after cancellation");
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Turn one join outcome into a failure (if it is one)
    fn classify(
        &mut self,
        joined: Result<(Id, Result<(), BoxError>), JoinError>,
    ) -> Option<RunError> {
        match joined {
            Ok((id, result)) => {
                let label = self.labels.remove(&id)?;
                match result {
                    Ok(()) => {
                        info!(role = %label.role, name = %label.name, "Streamer exited");
                        None
                    }
                    Err(source) => Some(RunError::stream(label.role, label.name, source)),
                }
            }
            Err(join_error) => {
                let label = self.labels.remove(&join_error.id())?;
                if join_error.is_cancelled() {
                    warn!(role = %label.role, name = %label.name, "Streamer aborted");
                    return None;
                }
                Some(RunError::StreamPanicked {
                    role: label.role,
                    name: label.name,
                    message: panic_message(join_error.into_panic()),
                })
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
