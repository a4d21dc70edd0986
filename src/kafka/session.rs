//! Group-session state machine, independent of the Kafka client.
//!
//! A session serves one assignment generation. Deliveries are fanned out
//! to one claim worker per (topic, partition). When the group revokes the
//! assignment or the process shuts down, workers are cancelled without
//! draining: whatever is still buffered was never committed and will be
//! redelivered to whoever owns the partition next.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::constants::consumer::CLAIM_BUFFER;
use crate::error::AlertError;

use super::claim::{ClaimProcessor, Delivery, OffsetCommitter};

/// Assignment state reported by rebalance callbacks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    /// Incremented on every assignment
    pub generation: u64,
    pub assigned: bool,
}

impl Membership {
    pub fn on_revoke(&mut self) {
        self.assigned = false;
    }

    pub fn on_assign(&mut self) {
        self.generation += 1;
        self.assigned = true;
    }

    /// Whether a session serving `serving` must end given this state.
    /// A revoke followed by a new assignment can land within a single
    /// poll; a changed generation means the same thing as a revoke.
    pub fn ends_session(&self, serving: Option<u64>) -> bool {
        !self.assigned || serving.is_some_and(|g| g != self.generation)
    }
}

#[derive(Debug)]
pub enum SessionEnd {
    /// Shutdown was raised
    Cancelled,
    /// Partitions were revoked or reassigned
    Revoked,
    /// The delivery stream ended
    Closed,
    /// The delivery stream reported an error
    Failed(AlertError),
}

/// Wait until the group has assigned partitions in a generation newer than
/// `since`. Returns the membership that satisfied the wait.
pub async fn wait_until_assigned(
    membership: &mut watch::Receiver<Membership>,
    since: u64,
) -> Result<Membership, AlertError> {
    let ready = membership
        .wait_for(|m| m.assigned && m.generation > since)
        .await
        .map_err(|_| AlertError::Consumer("consumer closed before partitions were assigned".to_string()))?;
    Ok(*ready)
}

/// Serve one assignment generation until revoke, shutdown or stream end.
pub async fn run_session<S>(
    deliveries: &mut S,
    processor: &ClaimProcessor,
    committer: &Arc<dyn OffsetCommitter>,
    membership: &mut watch::Receiver<Membership>,
    mut shutdown: watch::Receiver<bool>,
) -> SessionEnd
where
    S: Stream<Item = Result<Delivery, AlertError>> + Unpin,
{
    let (cancel, cancelled) = watch::channel(false);
    let mut claims: HashMap<(String, i32), mpsc::Sender<Delivery>> = HashMap::new();
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    // Generation this session is serving, once assigned
    let mut serving = {
        let state = *membership.borrow_and_update();
        state.assigned.then_some(state.generation)
    };

    let end = loop {
        if *shutdown.borrow() {
            break SessionEnd::Cancelled;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break SessionEnd::Cancelled;
                }
            }
            changed = membership.changed() => {
                if changed.is_err() {
                    break SessionEnd::Cancelled;
                }
                let state = *membership.borrow_and_update();
                if state.ends_session(serving) {
                    break SessionEnd::Revoked;
                }
                if serving.is_none() {
                    info!("✅ [KAFKA] Session ready (generation {})", state.generation);
                    serving = Some(state.generation);
                }
            }
            next = deliveries.next() => {
                let delivery = match next {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(e)) => break SessionEnd::Failed(e),
                    None => break SessionEnd::Closed,
                };

                let key = (delivery.topic.clone(), delivery.partition);
                let claim = claims.entry(key).or_insert_with(|| {
                    let (tx, rx) = mpsc::channel(CLAIM_BUFFER);
                    let processor = processor.clone();
                    let committer = committer.clone();
                    let cancelled = cancelled.clone();
                    workers.push(tokio::spawn(async move {
                        processor.run_claim(rx, committer, cancelled).await;
                    }));
                    tx
                });

                if let Err(e) = claim.send(delivery).await {
                    let lost = e.0;
                    warn!(
                        "⚠️ [KAFKA] Claim for {} [{}] closed, {} will be redelivered",
                        lost.topic, lost.partition, lost.offset
                    );
                }
            }
        }
    };

    // Partitions we may no longer own must not see further commits; a
    // delivery already being handled still runs to completion.
    if matches!(end, SessionEnd::Cancelled | SessionEnd::Revoked) {
        cancel.send_replace(true);
    }
    drop(claims);
    for result in join_all(workers).await {
        if let Err(e) = result {
            error!("❌ [KAFKA] Claim worker ended abnormally: {}", e);
        }
    }

    end
}

/// Owns the background session task and its cancellation flag
pub struct SessionHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { shutdown, task: None }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the session loop with a fresh cancellation flag. Returns false
    /// when a loop is already running.
    pub fn spawn<F, Fut>(&mut self, run: F) -> bool
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.task.is_some() {
            return false;
        }

        self.shutdown.send_replace(false);
        self.task = Some(tokio::spawn(run(self.shutdown.subscribe())));
        true
    }

    /// Raise cancellation and wait for the loop to finish. Returns false
    /// when nothing was running.
    pub async fn stop(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };

        self.shutdown.send_replace(true);
        if let Err(e) = task.await {
            error!("❌ [KAFKA] Consumer task ended abnormally: {}", e);
        }
        true
    }
}
