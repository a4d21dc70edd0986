use serde::Deserialize;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::defaults;
use crate::error::ConfigError;

/// Points at an optional YAML file loaded before environment overrides
pub const CONFIG_FILE_ENV: &str = "ALERTS_CONFIG_FILE";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub consumer_group: String,
    pub decision_topic: String, // trading.decisions from decision-engine
    pub ranking_topic: String,  // trading.rankings from decision-engine
    /// Audit topic for sent alerts; `None` disables the audit publisher
    pub alert_topic: Option<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: split_brokers(defaults::KAFKA_BROKERS),
            consumer_group: defaults::KAFKA_CONSUMER_GROUP.to_string(),
            decision_topic: defaults::KAFKA_DECISION_TOPIC.to_string(),
            ranking_topic: defaults::KAFKA_RANKING_TOPIC.to_string(),
            alert_topic: None,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            api_url: defaults::TELEGRAM_API_URL.to_string(),
        }
    }
}

// Keep the bot token out of the startup log
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = if self.bot_token.is_empty() { "<unset>" } else { "***" };
        f.debug_struct("TelegramConfig")
            .field("bot_token", &masked)
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuietHoursConfig {
    pub enabled: bool,
    /// Hour (0-23) at which quiet hours begin, inclusive
    pub start: u32,
    /// Hour (0-23) at which quiet hours end, exclusive
    pub end: u32,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::ENABLE_QUIET_HOURS,
            start: defaults::QUIET_HOURS_START,
            end: defaults::QUIET_HOURS_END,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub min_confidence: f64,
    pub alert_on_buy: bool,
    pub alert_on_sell: bool,
    pub alert_on_watch: bool,
    pub alert_on_rankings: bool,
    pub rankings_top_n: usize,
    pub cooldown_minutes: u64,
    pub quiet_hours: QuietHoursConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_confidence: defaults::MIN_CONFIDENCE,
            alert_on_buy: defaults::ALERT_ON_BUY,
            alert_on_sell: defaults::ALERT_ON_SELL,
            alert_on_watch: defaults::ALERT_ON_WATCH,
            alert_on_rankings: defaults::ALERT_ON_RANKINGS,
            rankings_top_n: defaults::RANKINGS_TOP_N,
            cooldown_minutes: defaults::COOLDOWN_MINUTES,
            quiet_hours: QuietHoursConfig::default(),
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kafka: KafkaConfig,
    pub telegram: TelegramConfig,
    pub alerts: AlertConfig,
    /// Bind address for the health endpoint; `None` disables it
    pub health_addr: Option<String>,
}

impl AppConfig {
    /// Load `.env`, the optional YAML file, then environment overrides.
    /// Any error here is fatal to startup.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;

        Self::from_yaml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Overlay values from `lookup` (normally the process environment).
    /// Unset or empty keys leave the current value untouched.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // Kafka
        if let Some(v) = get("KAFKA_BROKERS") {
            self.kafka.brokers = split_brokers(&v);
        }
        if let Some(v) = get("KAFKA_CONSUMER_GROUP") {
            self.kafka.consumer_group = v;
        }
        if let Some(v) = get("KAFKA_DECISION_TOPIC") {
            self.kafka.decision_topic = v;
        }
        if let Some(v) = get("KAFKA_RANKING_TOPIC") {
            self.kafka.ranking_topic = v;
        }
        if let Some(v) = get("KAFKA_ALERT_TOPIC") {
            self.kafka.alert_topic = Some(v);
        }

        // Telegram
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        parse_into(&get, "TELEGRAM_CHAT_ID", &mut self.telegram.chat_id)?;
        if let Some(v) = get("TELEGRAM_API_URL") {
            self.telegram.api_url = v;
        }

        // Alert settings
        let alerts = &mut self.alerts;
        parse_into(&get, "MIN_CONFIDENCE", &mut alerts.min_confidence)?;
        bool_into(&get, "ALERT_ON_BUY", &mut alerts.alert_on_buy)?;
        bool_into(&get, "ALERT_ON_SELL", &mut alerts.alert_on_sell)?;
        bool_into(&get, "ALERT_ON_WATCH", &mut alerts.alert_on_watch)?;
        bool_into(&get, "ALERT_ON_RANKINGS", &mut alerts.alert_on_rankings)?;
        parse_into(&get, "RANKINGS_TOP_N", &mut alerts.rankings_top_n)?;
        parse_into(&get, "COOLDOWN_MINUTES", &mut alerts.cooldown_minutes)?;
        parse_into(&get, "QUIET_HOURS_START", &mut alerts.quiet_hours.start)?;
        parse_into(&get, "QUIET_HOURS_END", &mut alerts.quiet_hours.end)?;
        bool_into(&get, "ENABLE_QUIET_HOURS", &mut alerts.quiet_hours.enabled)?;

        if let Some(v) = get("HEALTH_ADDR") {
            self.health_addr = Some(v);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        }
        if self.telegram.chat_id == 0 {
            return Err(ConfigError::Missing("TELEGRAM_CHAT_ID"));
        }
        if self.kafka.brokers.is_empty() {
            return Err(ConfigError::Missing("KAFKA_BROKERS"));
        }

        let alerts = &self.alerts;
        if !(0.0..=1.0).contains(&alerts.min_confidence) {
            return Err(ConfigError::OutOfRange {
                key: "MIN_CONFIDENCE",
                reason: format!("{} is not within [0, 1]", alerts.min_confidence),
            });
        }
        if alerts.rankings_top_n == 0 {
            return Err(ConfigError::OutOfRange {
                key: "RANKINGS_TOP_N",
                reason: "must be at least 1".to_string(),
            });
        }
        for (key, hour) in [
            ("QUIET_HOURS_START", alerts.quiet_hours.start),
            ("QUIET_HOURS_END", alerts.quiet_hours.end),
        ] {
            if hour > 23 {
                return Err(ConfigError::OutOfRange {
                    key,
                    reason: format!("hour {} is not within 0-23", hour),
                });
            }
        }

        Ok(())
    }
}

fn split_brokers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_into<G, T>(get: &G, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = get(key) {
        *target = raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw.clone() })?;
    }
    Ok(())
}

fn bool_into<G>(get: &G, key: &'static str, target: &mut bool) -> Result<(), ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *target = parse_bool(&raw).ok_or(ConfigError::Invalid { key, value: raw })?;
    }
    Ok(())
}

/// Accepts the usual spellings: 1/t/T/TRUE/true/True and their false forms
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
