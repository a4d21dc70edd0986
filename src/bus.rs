use crate::events::AlertOutcome;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Fan-out of alert outcomes to the reporter and the audit publisher.
/// Publishing never fails; an outcome nobody listens to is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AlertOutcome>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertOutcome> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Returns how many subscribers the outcome reached
    pub fn publish(&self, outcome: AlertOutcome) -> usize {
        match self.tx.send(outcome) {
            Ok(reached) => reached,
            Err(broadcast::error::SendError(dropped)) => {
                trace!("[BUS] No subscribers, dropped {} outcome", dropped.label());
                0
            }
        }
    }
}

/// Wait for a subscriber task to finish once every bus handle has been
/// dropped. Outcomes still queued are handled before the task exits; after
/// `limit` the task is aborted and false is returned.
pub async fn drain_subscriber(name: &str, mut handle: JoinHandle<()>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(())) => {
            debug!("[BUS] {} drained", name);
            true
        }
        Ok(Err(e)) => {
            warn!("⚠️ [BUS] {} ended abnormally: {}", name, e);
            true
        }
        Err(_) => {
            warn!("⚠️ [BUS] {} still busy after {:?}, aborting", name, limit);
            handle.abort();
            false
        }
    }
}
