//! Per-partition claim processing, independent of the Kafka client.
//!
//! Every delivery is committed exactly once after its handler returns,
//! whether decoding or handling succeeded or not. Failures are logged and
//! skipped; nothing here can stop the claim loop except cancellation or
//! the claim channel closing.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::bus::EventBus;
use crate::error::AlertError;
use crate::events::AlertOutcome;
use crate::services::alerts::EventHandler;

use super::router::TopicRouter;

/// One message pulled from a partition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Records consumer progress for a delivery. Implementations commit the
/// position *after* the delivery so it is not fetched again.
pub trait OffsetCommitter: Send + Sync {
    fn commit(&self, delivery: &Delivery) -> Result<(), AlertError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClaimStats {
    pub processed: u64,
    pub undecodable: u64,
    pub handler_errors: u64,
    pub commit_errors: u64,
}

#[derive(Clone)]
pub struct ClaimProcessor {
    router: TopicRouter,
    handler: Arc<dyn EventHandler>,
    event_bus: EventBus,
}

impl ClaimProcessor {
    pub fn new(router: TopicRouter, handler: Arc<dyn EventHandler>, event_bus: EventBus) -> Self {
        Self {
            router,
            handler,
            event_bus,
        }
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Decode, handle, commit. Never returns an error.
    pub async fn process(
        &self,
        delivery: &Delivery,
        committer: &dyn OffsetCommitter,
        stats: &mut ClaimStats,
    ) {
        stats.processed += 1;

        match self.router.decode(&delivery.topic, delivery.payload.as_deref()) {
            Ok(event) => {
                if let Err(e) = self.handler.handle(&event).await {
                    stats.handler_errors += 1;
                    error!(
                        "❌ [KAFKA] Failed to handle {} event for {} ({} [{}] @ {}): {}",
                        event.kind(),
                        event.subject(),
                        delivery.topic,
                        delivery.partition,
                        delivery.offset,
                        e
                    );
                }
            }
            Err(e) => {
                stats.undecodable += 1;
                warn!(
                    "⚠️ [KAFKA] Skipping undecodable message {} [{}] @ {}: {}",
                    delivery.topic, delivery.partition, delivery.offset, e
                );
                self.event_bus.publish(AlertOutcome::Undecodable {
                    topic: delivery.topic.clone(),
                    error: e.to_string(),
                });
            }
        }

        if let Err(e) = committer.commit(delivery) {
            stats.commit_errors += 1;
            warn!(
                "⚠️ [KAFKA] Failed to commit {} [{}] @ {}: {}",
                delivery.topic, delivery.partition, delivery.offset, e
            );
        }
    }

    /// Process a claim sequentially until it closes or `shutdown` is raised.
    /// A delivery already being handled always runs to completion.
    pub async fn run_claim(
        &self,
        mut claim: mpsc::Receiver<Delivery>,
        committer: Arc<dyn OffsetCommitter>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ClaimStats {
        let mut stats = ClaimStats::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delivery = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = claim.recv() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            self.process(&delivery, committer.as_ref(), &mut stats).await;
        }

        debug!("[KAFKA] Claim finished: {:?}", stats);
        stats
    }
}
