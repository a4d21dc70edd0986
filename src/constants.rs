//! Application-wide constants and defaults
//!
//! Centralizes tunable values so config defaults, rendering and the
//! consumer agree on them.

use std::time::Duration;

/// Configuration defaults (used when neither the config file nor the
/// environment provides a value)
pub mod defaults {
    pub const KAFKA_BROKERS: &str = "localhost:19092";
    pub const KAFKA_CONSUMER_GROUP: &str = "alert-service";
    pub const KAFKA_DECISION_TOPIC: &str = "trading.decisions";
    pub const KAFKA_RANKING_TOPIC: &str = "trading.rankings";

    pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

    pub const MIN_CONFIDENCE: f64 = 0.6;
    pub const ALERT_ON_BUY: bool = true;
    pub const ALERT_ON_SELL: bool = true;
    pub const ALERT_ON_WATCH: bool = false;
    pub const ALERT_ON_RANKINGS: bool = true;
    pub const RANKINGS_TOP_N: usize = 5;
    pub const COOLDOWN_MINUTES: u64 = 30;

    /// 10 PM
    pub const QUIET_HOURS_START: u32 = 22;
    /// 7 AM
    pub const QUIET_HOURS_END: u32 = 7;
    pub const ENABLE_QUIET_HOURS: bool = false;
}

/// Outbound notification constants
pub mod notify {
    use super::*;

    /// Per-request timeout for the messaging API
    pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

    pub const STARTUP_MESSAGE: &str =
        "🚀 <b>Alert Service Started</b>\n\nNow monitoring for trading signals.";
    pub const SHUTDOWN_MESSAGE: &str = "🛑 <b>Alert Service Stopped</b>";
}

/// Message rendering constants
pub mod render {
    pub const BUY_MARKER: &str = "🟢";
    pub const SELL_MARKER: &str = "🔴";
    pub const WATCH_MARKER: &str = "👀";

    pub const PODIUM: [&str; 3] = ["🥇", "🥈", "🥉"];

    pub const BAR_SEGMENTS: usize = 10;
    pub const BAR_FILLED: char = '█';
    pub const BAR_EMPTY: char = '░';

    /// Ranking reasoning longer than this is cut to `REASONING_KEEP` chars
    pub const REASONING_MAX_CHARS: usize = 100;
    pub const REASONING_KEEP: usize = 97;
    pub const TRUNCATION_MARKER: &str = "...";
}

/// Consumer constants
pub mod consumer {
    use super::*;

    /// Buffered deliveries per partition claim before polling backs off
    pub const CLAIM_BUFFER: usize = 64;

    /// Session timeout handed to the group coordinator
    pub const SESSION_TIMEOUT_MS: &str = "10000";

    /// Pause before re-entering a session that ended on a transport error
    pub const SESSION_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Audit producer delivery timeout
    pub const AUDIT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Event bus capacity for alert outcomes
pub const OUTCOME_BUS_CAPACITY: usize = 1024;

/// How long bus subscribers get to finish queued outcomes at shutdown
pub const SUBSCRIBER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
