//! Consumer-group membership for the decision and ranking topics.
//!
//! One background task owns the group session. Each partition that
//! delivers messages gets its own claim worker, so partitions are handled
//! concurrently while order within a partition is preserved. When the
//! group revokes our partitions the session cancels its workers and a new
//! session starts on the same membership.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::KafkaConfig;
use crate::constants::consumer::{SESSION_RETRY_DELAY, SESSION_TIMEOUT_MS};
use crate::error::AlertError;

use super::claim::{ClaimProcessor, Delivery, OffsetCommitter};
use super::session::{run_session, wait_until_assigned, Membership, SessionEnd, SessionHandle};

pub struct SessionContext {
    membership: watch::Sender<Membership>,
}

impl ClientContext for SessionContext {}

impl ConsumerContext for SessionContext {
    fn pre_rebalance(&self, rebalance: &Rebalance) {
        if let Rebalance::Revoke(tpl) = rebalance {
            info!("🔄 [KAFKA] Revoking {} partition(s)", tpl.count());
            self.membership.send_modify(Membership::on_revoke);
        }
    }

    fn post_rebalance(&self, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(tpl) => {
                info!("🔄 [KAFKA] Assigned {} partition(s)", tpl.count());
                self.membership.send_modify(Membership::on_assign);
            }
            Rebalance::Error(e) => warn!("⚠️ [KAFKA] Rebalance error: {}", e),
            Rebalance::Revoke(_) => {}
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        if let Err(e) = result {
            warn!("⚠️ [KAFKA] Offset commit failed: {}", e);
        }
    }
}

type GroupConsumer = StreamConsumer<SessionContext>;

/// Commits `offset + 1` for the delivery's partition without waiting
struct KafkaCommitter {
    consumer: Arc<GroupConsumer>,
}

impl OffsetCommitter for KafkaCommitter {
    fn commit(&self, delivery: &Delivery) -> Result<(), AlertError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&delivery.topic, delivery.partition, Offset::Offset(delivery.offset + 1))?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }
}

pub struct AlertConsumer {
    consumer: Arc<GroupConsumer>,
    processor: ClaimProcessor,
    membership: watch::Receiver<Membership>,
    session: SessionHandle,
}

impl AlertConsumer {
    /// Build the group consumer and confirm the brokers answer a metadata
    /// request. Failure here is fatal to startup.
    pub async fn connect(
        config: &KafkaConfig,
        processor: ClaimProcessor,
        metadata_timeout: Duration,
    ) -> Result<Self, AlertError> {
        let (membership_tx, membership_rx) = watch::channel(Membership::default());
        let context = SessionContext {
            membership: membership_tx,
        };

        let consumer: GroupConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.consumer_group)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "latest")
            .set("partition.assignment.strategy", "roundrobin")
            .set("session.timeout.ms", SESSION_TIMEOUT_MS)
            .set("enable.partition.eof", "false")
            .create_with_context(context)?;
        let consumer = Arc::new(consumer);

        let client = consumer.clone();
        tokio::task::spawn_blocking(move || client.fetch_metadata(None, metadata_timeout).map(|_| ()))
            .await
            .map_err(|e| AlertError::Consumer(format!("metadata request panicked: {}", e)))??;

        info!("✓ [KAFKA] Connected to {}", config.brokers.join(","));

        Ok(Self {
            consumer,
            processor,
            membership: membership_rx,
            session: SessionHandle::new(),
        })
    }

    /// Subscribe to both topics and return once the group has assigned
    /// partitions to this member. A no-op while already running; after
    /// `stop` it starts a fresh session and waits for a new assignment.
    pub async fn start(&mut self) -> Result<(), AlertError> {
        if self.session.is_running() {
            return Ok(());
        }

        let since = self.membership.borrow().generation;
        let topics = self.processor.router().topics();
        self.consumer.subscribe(&topics)?;

        let consumer = self.consumer.clone();
        let processor = self.processor.clone();
        let membership = self.membership.clone();
        self.session
            .spawn(move |shutdown| run_sessions(consumer, processor, membership, shutdown));

        let mut ready = self.membership.clone();
        let state = wait_until_assigned(&mut ready, since).await?;

        info!(
            "✅ [KAFKA] Consumer started and ready ({}, generation {})",
            topics.join(", "),
            state.generation
        );
        Ok(())
    }

    pub fn membership(&self) -> Membership {
        *self.membership.borrow()
    }

    /// Raise cancellation, wait for in-flight claims to finish, then leave
    /// the group. Safe to call more than once.
    pub async fn stop(&mut self) {
        if !self.session.stop().await {
            return;
        }

        self.consumer.unsubscribe();
        info!("🛑 [KAFKA] Consumer stopped");
    }
}

/// Re-enter the consume loop until cancelled
async fn run_sessions(
    consumer: Arc<GroupConsumer>,
    processor: ClaimProcessor,
    mut membership: watch::Receiver<Membership>,
    shutdown: watch::Receiver<bool>,
) {
    let committer: Arc<dyn OffsetCommitter> = Arc::new(KafkaCommitter {
        consumer: consumer.clone(),
    });

    loop {
        let end = {
            let mut deliveries = pin!(consumer
                .stream()
                .map(|message| message.map(|m| delivery_from(&m)).map_err(AlertError::from)));
            run_session(&mut deliveries, &processor, &committer, &mut membership, shutdown.clone()).await
        };

        if *shutdown.borrow() {
            break;
        }

        match end {
            SessionEnd::Cancelled | SessionEnd::Closed => break,
            SessionEnd::Revoked => info!("🔄 [KAFKA] Session ended by rebalance, rejoining"),
            SessionEnd::Failed(e) => {
                error!("❌ [KAFKA] Error from consumer: {}", e);
                tokio::time::sleep(SESSION_RETRY_DELAY).await;
            }
        }
    }
}

fn delivery_from(message: &BorrowedMessage<'_>) -> Delivery {
    Delivery {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        payload: message.payload().map(<[u8]>::to_vec),
    }
}
