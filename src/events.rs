use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::EventKind;

/// Why an event did not produce a notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SignalDisabled,
    BelowConfidence,
    Cooldown,
    QuietHours,
    RankingsDisabled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::SignalDisabled => "signal disabled",
            SkipReason::BelowConfidence => "confidence below threshold",
            SkipReason::Cooldown => "in cooldown period",
            SkipReason::QuietHours => "quiet hours active",
            SkipReason::RankingsDisabled => "ranking alerts disabled",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification that was accepted by the messaging API
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub kind: EventKind,
    /// Present for decision alerts
    pub symbol: Option<String>,
    pub signal: String,
    pub confidence: Option<f64>,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

// Global outcome enum, one per consumed message
#[derive(Clone, Debug)]
pub enum AlertOutcome {
    Sent(AlertRecord),
    Suppressed {
        kind: EventKind,
        subject: String,
        reason: SkipReason,
    },
    Failed {
        kind: EventKind,
        subject: String,
        error: String,
    },
    Undecodable {
        topic: String,
        error: String,
    },
}

impl AlertOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AlertOutcome::Sent(_) => "sent",
            AlertOutcome::Suppressed { .. } => "suppressed",
            AlertOutcome::Failed { .. } => "failed",
            AlertOutcome::Undecodable { .. } => "undecodable",
        }
    }
}
