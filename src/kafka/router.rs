use crate::error::DecodeError;
use crate::models::{AlertEvent, EventKind};

/// Maps the two subscribed topics to the model each one carries
#[derive(Clone, Debug)]
pub struct TopicRouter {
    decision_topic: String,
    ranking_topic: String,
}

impl TopicRouter {
    pub fn new(decision_topic: impl Into<String>, ranking_topic: impl Into<String>) -> Self {
        Self {
            decision_topic: decision_topic.into(),
            ranking_topic: ranking_topic.into(),
        }
    }

    pub fn topics(&self) -> [&str; 2] {
        [&self.decision_topic, &self.ranking_topic]
    }

    pub fn kind_for(&self, topic: &str) -> Option<EventKind> {
        if topic == self.decision_topic {
            Some(EventKind::Decision)
        } else if topic == self.ranking_topic {
            Some(EventKind::Ranking)
        } else {
            None
        }
    }

    pub fn decode(&self, topic: &str, payload: Option<&[u8]>) -> Result<AlertEvent, DecodeError> {
        let kind = self
            .kind_for(topic)
            .ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;

        let bytes = match payload {
            Some(b) if !b.is_empty() => b,
            _ => return Err(DecodeError::EmptyPayload(topic.to_string())),
        };

        let json_err = |source| DecodeError::Json {
            kind: kind.as_str(),
            source,
        };

        match kind {
            EventKind::Decision => serde_json::from_slice(bytes)
                .map(AlertEvent::Decision)
                .map_err(json_err),
            EventKind::Ranking => serde_json::from_slice(bytes)
                .map(AlertEvent::Ranking)
                .map_err(json_err),
        }
    }
}
