//! Suppression rules applied before a notification is rendered.
//!
//! The gate is the only owner of cooldown state. Check and record are
//! separate steps, so two claims racing on the same symbol may both pass
//! the check; the later `record_alert` wins.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, Timelike, Utc};
use dashmap::DashMap;

use crate::config::{AlertConfig, QuietHoursConfig};
use crate::events::SkipReason;
use crate::models::{DecisionData, SignalType};

/// Source of wall-clock time for cooldown and quiet-hour checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Shared clones observe the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct NotificationGate {
    settings: AlertConfig,
    /// symbol -> last accepted alert
    cooldowns: DashMap<String, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl NotificationGate {
    pub fn new(settings: AlertConfig) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            cooldowns: DashMap::new(),
            clock,
        }
    }

    pub fn settings(&self) -> &AlertConfig {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Per-signal toggle. Unknown signals are rejected.
    pub fn allow_signal(&self, signal: &str) -> bool {
        match SignalType::parse(signal) {
            Some(SignalType::Buy) => self.settings.alert_on_buy,
            Some(SignalType::Sell) => self.settings.alert_on_sell,
            Some(SignalType::Watch) => self.settings.alert_on_watch,
            None => false,
        }
    }

    pub fn meets_confidence(confidence: f64, threshold: f64) -> bool {
        confidence >= threshold
    }

    /// True when `symbol` has never alerted or its cooldown has elapsed.
    /// A last-alert time in the future (clock stepped back) counts as
    /// still cooling down.
    pub fn check_cooldown(&self, symbol: &str) -> bool {
        let last_alert = match self.cooldowns.get(symbol) {
            Some(entry) => *entry,
            None => return true,
        };

        match (self.clock.now() - last_alert).to_std() {
            Ok(elapsed) => elapsed >= self.settings.cooldown(),
            Err(_) => false,
        }
    }

    /// Start (or restart) the cooldown window for `symbol`
    pub fn record_alert(&self, symbol: &str) {
        self.cooldowns.insert(symbol.to_string(), self.clock.now());
    }

    pub fn last_alert(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.cooldowns.get(symbol).map(|entry| *entry)
    }

    /// Quiet-hour check against the host's local time
    pub fn is_quiet_hours(&self) -> bool {
        self.is_quiet_hours_at(&self.clock.now().with_timezone(&Local))
    }

    pub fn is_quiet_hours_at<T: Timelike>(&self, now: &T) -> bool {
        in_quiet_window(&self.settings.quiet_hours, now.hour())
    }

    /// Signal enabled -> confidence -> cooldown -> quiet hours; first
    /// failing rule wins.
    pub fn evaluate_decision(&self, data: &DecisionData) -> Result<(), SkipReason> {
        if !self.allow_signal(&data.signal) {
            return Err(SkipReason::SignalDisabled);
        }
        if !Self::meets_confidence(data.confidence, self.settings.min_confidence) {
            return Err(SkipReason::BelowConfidence);
        }
        if !self.check_cooldown(&data.symbol) {
            return Err(SkipReason::Cooldown);
        }
        if self.is_quiet_hours() {
            return Err(SkipReason::QuietHours);
        }
        Ok(())
    }

    /// Rankings are not per-symbol, so only the toggle and quiet hours apply
    pub fn evaluate_ranking(&self) -> Result<(), SkipReason> {
        if !self.settings.alert_on_rankings {
            return Err(SkipReason::RankingsDisabled);
        }
        if self.is_quiet_hours() {
            return Err(SkipReason::QuietHours);
        }
        Ok(())
    }
}

/// `[start, end)` window; wraps midnight when `start > end`
pub fn in_quiet_window(quiet: &QuietHoursConfig, hour: u32) -> bool {
    if !quiet.enabled {
        return false;
    }

    if quiet.start > quiet.end {
        hour >= quiet.start || hour < quiet.end
    } else {
        hour >= quiet.start && hour < quiet.end
    }
}
