//! Inbound event contracts published by the decision engine.
//!
//! Both topics carry an envelope `{event_type, source, schema_version,
//! timestamp, data}`; only `data` differs.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AlertError;

pub const SIGNAL_BUY: &str = "BUY";
pub const SIGNAL_SELL: &str = "SELL";
pub const SIGNAL_WATCH: &str = "WATCH";

/// Optional fields accept both a missing key and an explicit `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Recognized signal kinds. Payloads keep the raw string so an unknown
/// signal can still be logged and rendered verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Watch,
}

impl SignalType {
    /// Exact, case-sensitive match on the wire value
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            SIGNAL_BUY => Some(SignalType::Buy),
            SIGNAL_SELL => Some(SignalType::Sell),
            SIGNAL_WATCH => Some(SignalType::Watch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => SIGNAL_BUY,
            SignalType::Sell => SIGNAL_SELL,
            SignalType::Watch => SIGNAL_WATCH,
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: DecisionData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionData {
    pub symbol: String,
    /// "BUY" | "SELL" | "WATCH"
    pub signal: String,
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub primary_reasoning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules_triggered: Vec<RuleResult>,
    /// Ordered by name so rendering is deterministic
    #[serde(default, deserialize_with = "null_as_default")]
    pub indicators_snapshot: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, Value>,
}

impl DecisionData {
    pub fn signal_type(&self) -> Option<SignalType> {
        SignalType::parse(&self.signal)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_name: String,
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: RankingData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingData {
    pub signal_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub criteria: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_symbols: u64,
    /// Pre-sorted by desirability; consumers take a prefix
    #[serde(default, deserialize_with = "null_as_default")]
    pub rankings: Vec<SymbolRanking>,
}

impl RankingData {
    pub fn signal_type(&self) -> Option<SignalType> {
        SignalType::parse(&self.signal_type)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolRanking {
    pub symbol: String,
    pub rank: u32,
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signal_type: String,
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ranking_factors: BTreeMap<String, f64>,
}

/// Which inbound stream an event came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Decision,
    Ranking,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Decision => "decision",
            EventKind::Ranking => "ranking",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound event. The router produces exactly one variant per
/// topic so handlers match exhaustively instead of downcasting.
#[derive(Clone, Debug, PartialEq)]
pub enum AlertEvent {
    Decision(DecisionEvent),
    Ranking(RankingEvent),
}

impl AlertEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AlertEvent::Decision(_) => EventKind::Decision,
            AlertEvent::Ranking(_) => EventKind::Ranking,
        }
    }

    /// Symbol for logging; rankings report their signal type instead
    pub fn subject(&self) -> &str {
        match self {
            AlertEvent::Decision(e) => &e.data.symbol,
            AlertEvent::Ranking(e) => &e.data.signal_type,
        }
    }
}

impl TryFrom<AlertEvent> for DecisionEvent {
    type Error = AlertError;

    fn try_from(event: AlertEvent) -> Result<Self, Self::Error> {
        match event {
            AlertEvent::Decision(e) => Ok(e),
            other => Err(AlertError::UnexpectedEvent {
                expected: EventKind::Decision.as_str(),
                actual: other.kind().as_str(),
            }),
        }
    }
}

impl TryFrom<AlertEvent> for RankingEvent {
    type Error = AlertError;

    fn try_from(event: AlertEvent) -> Result<Self, Self::Error> {
        match event {
            AlertEvent::Ranking(e) => Ok(e),
            other => Err(AlertError::UnexpectedEvent {
                expected: EventKind::Ranking.as_str(),
                actual: other.kind().as_str(),
            }),
        }
    }
}
