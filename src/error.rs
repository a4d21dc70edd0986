//! Custom error types for the alert service
//!
//! Startup-fatal failures surface as `ConfigError` or `AlertError::Kafka`.
//! Everything raised while handling a single message is logged by the
//! claim processor and never stops consumption.

use thiserror::Error;

/// Top-level alert service errors
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to send {kind} alert for {subject}: {source}")]
    Notify {
        kind: &'static str,
        subject: String,
        #[source]
        source: NotifyError,
    },

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Consumer error: {0}")]
    Consumer(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Unexpected event: expected {expected}, got {actual}")]
    UnexpectedEvent {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Audit error: {0}")]
    Audit(String),
}

/// Configuration loading / validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Outbound notification transport errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to decode response (HTTP {status}): {body}")]
    Response { status: u16, body: String },

    #[error("telegram API error: {description}")]
    Api { status: u16, description: String },
}

/// Payload decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("No handler registered for topic {0}")]
    UnknownTopic(String),

    #[error("Empty payload on topic {0}")]
    EmptyPayload(String),

    #[error("Malformed {kind} payload: {source}")]
    Json {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl NotifyError {
    /// HTTP status reported by the remote service, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            NotifyError::Network(e) => e.status().map(|s| s.as_u16()),
            NotifyError::Response { status, .. } | NotifyError::Api { status, .. } => Some(*status),
        }
    }
}
