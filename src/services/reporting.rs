use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::EventBus;
use crate::events::{AlertOutcome, SkipReason};
use crate::models::EventKind;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AlertSummary {
    pub start_time: Option<DateTime<Utc>>,

    pub decision_alerts_sent: u64,
    pub ranking_alerts_sent: u64,

    /// Suppressed events keyed by reason
    pub suppressed: HashMap<SkipReason, u64>,

    pub send_failures: u64,
    pub undecodable: u64,

    /// Sent decision alerts per symbol
    pub per_symbol: HashMap<String, u64>,

    pub last_sent_at: Option<DateTime<Utc>>,
}

impl AlertSummary {
    pub fn total_sent(&self) -> u64 {
        self.decision_alerts_sent + self.ranking_alerts_sent
    }

    pub fn total_suppressed(&self) -> u64 {
        self.suppressed.values().sum()
    }

    pub fn apply(&mut self, outcome: &AlertOutcome) {
        match outcome {
            AlertOutcome::Sent(record) => {
                match record.kind {
                    EventKind::Decision => self.decision_alerts_sent += 1,
                    EventKind::Ranking => self.ranking_alerts_sent += 1,
                }
                if let Some(symbol) = &record.symbol {
                    *self.per_symbol.entry(symbol.clone()).or_insert(0) += 1;
                }
                self.last_sent_at = Some(record.sent_at);
            }
            AlertOutcome::Suppressed { reason, .. } => {
                *self.suppressed.entry(*reason).or_insert(0) += 1;
            }
            AlertOutcome::Failed { .. } => self.send_failures += 1,
            AlertOutcome::Undecodable { .. } => self.undecodable += 1,
        }
    }
}

/// Tallies alert outcomes published on the bus
#[derive(Clone)]
pub struct AlertReporter {
    summary: Arc<Mutex<AlertSummary>>,
}

impl Default for AlertReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertReporter {
    pub fn new() -> Self {
        let summary = AlertSummary {
            start_time: Some(Utc::now()),
            ..Default::default()
        };
        Self {
            summary: Arc::new(Mutex::new(summary)),
        }
    }

    pub fn summary(&self) -> AlertSummary {
        self.summary.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn record(&self, outcome: &AlertOutcome) {
        self.summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(outcome);
    }

    /// Subscribe before returning so no outcome published afterwards is missed
    pub fn start(&self, event_bus: &EventBus) -> JoinHandle<()> {
        let mut rx = event_bus.subscribe();
        let reporter = self.clone();

        tokio::spawn(async move {
            info!("📈 [REPORT] AlertReporter started");
            loop {
                match rx.recv().await {
                    Ok(outcome) => reporter.record(&outcome),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[REPORT] Fell behind, {} outcomes not counted", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn log_summary(&self) {
        let s = self.summary();
        info!(
            "📈 [REPORT] Sent: {} decision / {} ranking | Suppressed: {} | Send failures: {} | Undecodable: {}",
            s.decision_alerts_sent,
            s.ranking_alerts_sent,
            s.total_suppressed(),
            s.send_failures,
            s.undecodable
        );
    }
}
