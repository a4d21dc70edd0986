use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::constants::consumer::AUDIT_SEND_TIMEOUT;
use crate::error::AlertError;
use crate::events::{AlertOutcome, AlertRecord};

/// Mirrors every sent alert onto the audit topic. Best-effort: failures
/// are logged and never affect the notification itself.
pub struct AuditPublisher {
    producer: FutureProducer,
    topic: String,
}

impl AuditPublisher {
    pub fn new(brokers: &[String], topic: &str) -> Result<Self, AlertError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("message.timeout.ms", AUDIT_SEND_TIMEOUT.as_millis().to_string())
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, record: &AlertRecord) -> Result<(), AlertError> {
        let payload = audit_payload(record)?;
        let key = audit_key(record);

        self.producer
            .send(
                FutureRecord::to(&self.topic).key(key).payload(&payload),
                AUDIT_SEND_TIMEOUT,
            )
            .await
            .map_err(|(e, _)| AlertError::Kafka(e))?;

        debug!("[AUDIT] Recorded alert {} on {}", record.id, self.topic);
        Ok(())
    }

    /// Subscribe before returning so no alert sent afterwards is missed
    pub fn start(self: Arc<Self>, event_bus: &EventBus) -> JoinHandle<()> {
        let mut rx = event_bus.subscribe();

        tokio::spawn(async move {
            info!("🗂️ [AUDIT] Publishing sent alerts to {}", self.topic);
            loop {
                match rx.recv().await {
                    Ok(AlertOutcome::Sent(record)) => {
                        if let Err(e) = self.publish(&record).await {
                            warn!("⚠️ [AUDIT] Failed to record alert {}: {}", record.id, e);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ [AUDIT] Fell behind, {} outcomes not recorded", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Decision alerts are keyed by symbol, rankings by signal type
pub fn audit_key(record: &AlertRecord) -> &str {
    record.symbol.as_deref().unwrap_or(&record.signal)
}

pub fn audit_payload(record: &AlertRecord) -> Result<Vec<u8>, AlertError> {
    serde_json::to_vec(record).map_err(|e| AlertError::Audit(e.to_string()))
}
