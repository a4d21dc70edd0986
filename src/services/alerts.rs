use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::AlertConfig;
use crate::error::AlertError;
use crate::events::{AlertOutcome, AlertRecord, SkipReason};
use crate::models::{AlertEvent, DecisionData, DecisionEvent, EventKind, RankingEvent};
use crate::notify::Notifier;

use super::gate::NotificationGate;
use super::render::{format_decision_message, format_ranking_message};

/// Entry point the claim processor calls for every decoded event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &AlertEvent) -> Result<(), AlertError>;
}

/// Composes gate, renderer and notifier for both event kinds.
/// Safe to share across partition claims.
pub struct AlertService {
    gate: NotificationGate,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
}

impl AlertService {
    pub fn new(config: AlertConfig, notifier: Arc<dyn Notifier>, event_bus: EventBus) -> Self {
        Self::with_gate(NotificationGate::new(config), notifier, event_bus)
    }

    pub fn with_gate(gate: NotificationGate, notifier: Arc<dyn Notifier>, event_bus: EventBus) -> Self {
        Self {
            gate,
            notifier,
            event_bus,
        }
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub async fn handle_decision(&self, event: &DecisionEvent) -> Result<(), AlertError> {
        let data = &event.data;

        if let Err(reason) = self.gate.evaluate_decision(data) {
            self.log_decision_skip(data, reason);
            self.event_bus.publish(AlertOutcome::Suppressed {
                kind: EventKind::Decision,
                subject: data.symbol.clone(),
                reason,
            });
            return Ok(());
        }

        let message = format_decision_message(event);
        if let Err(e) = self.notifier.send(&message).await {
            self.event_bus.publish(AlertOutcome::Failed {
                kind: EventKind::Decision,
                subject: data.symbol.clone(),
                error: e.to_string(),
            });
            return Err(AlertError::Notify {
                kind: EventKind::Decision.as_str(),
                subject: data.symbol.clone(),
                source: e,
            });
        }

        // Only a delivered alert starts the cooldown window
        self.gate.record_alert(&data.symbol);

        info!(
            "🔔 [ALERT] Sent alert for {} {} signal (confidence: {:.2})",
            data.symbol, data.signal, data.confidence
        );
        self.event_bus.publish(AlertOutcome::Sent(AlertRecord {
            id: Uuid::new_v4(),
            kind: EventKind::Decision,
            symbol: Some(data.symbol.clone()),
            signal: data.signal.clone(),
            confidence: Some(data.confidence),
            text: message,
            sent_at: self.gate.now(),
        }));

        Ok(())
    }

    pub async fn handle_ranking(&self, event: &RankingEvent) -> Result<(), AlertError> {
        let data = &event.data;

        if let Err(reason) = self.gate.evaluate_ranking() {
            info!("🔕 [ALERT] Skipping {} ranking alert: {}", data.signal_type, reason);
            self.event_bus.publish(AlertOutcome::Suppressed {
                kind: EventKind::Ranking,
                subject: data.signal_type.clone(),
                reason,
            });
            return Ok(());
        }

        let message = format_ranking_message(event, self.gate.settings().rankings_top_n);
        if let Err(e) = self.notifier.send(&message).await {
            self.event_bus.publish(AlertOutcome::Failed {
                kind: EventKind::Ranking,
                subject: data.signal_type.clone(),
                error: e.to_string(),
            });
            return Err(AlertError::Notify {
                kind: EventKind::Ranking.as_str(),
                subject: data.signal_type.clone(),
                source: e,
            });
        }

        info!(
            "🔔 [ALERT] Sent ranking alert for {} signals ({} symbols)",
            data.signal_type,
            data.rankings.len()
        );
        self.event_bus.publish(AlertOutcome::Sent(AlertRecord {
            id: Uuid::new_v4(),
            kind: EventKind::Ranking,
            symbol: None,
            signal: data.signal_type.clone(),
            confidence: None,
            text: message,
            sent_at: self.gate.now(),
        }));

        Ok(())
    }

    fn log_decision_skip(&self, data: &DecisionData, reason: SkipReason) {
        match reason {
            SkipReason::SignalDisabled => info!(
                "🔕 [GATE] Skipping alert for {} {} signal (not configured)",
                data.symbol, data.signal
            ),
            SkipReason::BelowConfidence => info!(
                "🔕 [GATE] Skipping alert for {}: confidence {:.2} below threshold {:.2}",
                data.symbol,
                data.confidence,
                self.gate.settings().min_confidence
            ),
            SkipReason::Cooldown => info!("⏰ [GATE] Skipping alert for {}: in cooldown period", data.symbol),
            SkipReason::QuietHours => info!("🌙 [GATE] Skipping alert for {}: quiet hours active", data.symbol),
            SkipReason::RankingsDisabled => {
                warn!("[GATE] Unexpected ranking skip reason for decision {}", data.symbol)
            }
        }
    }
}

#[async_trait]
impl EventHandler for AlertService {
    async fn handle(&self, event: &AlertEvent) -> Result<(), AlertError> {
        match event {
            AlertEvent::Decision(decision) => self.handle_decision(decision).await,
            AlertEvent::Ranking(ranking) => self.handle_ranking(ranking).await,
        }
    }
}
