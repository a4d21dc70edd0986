//! Signal Alerts - trading-signal notification service
//!
//! Consumes decision and ranking events from Kafka, decides per event
//! whether a notification should go out (signal toggles, confidence,
//! per-symbol cooldown, quiet hours) and delivers it through Telegram.

pub mod api;
pub mod bus;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod kafka;
pub mod models;
pub mod notify;
pub mod services;

// Re-export commonly used types
pub use bus::EventBus;
pub use config::AppConfig;
pub use error::AlertError;
pub use events::{AlertOutcome, AlertRecord, SkipReason};
pub use models::{AlertEvent, DecisionEvent, RankingEvent};
pub use services::alerts::{AlertService, EventHandler};

#[cfg(test)]
mod models_tests;
