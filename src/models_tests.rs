#[cfg(test)]
mod models_tests {
    use crate::error::AlertError;
    use crate::models::*;
    use chrono::{TimeZone, Utc};

    const DECISION_JSON: &str = r#"{
        "event_type": "trading_decision",
        "source": "decision-engine",
        "schema_version": "1.0",
        "timestamp": "2024-03-15T14:30:00Z",
        "data": {
            "symbol": "AAPL",
            "signal": "BUY",
            "confidence": 0.82,
            "primary_reasoning": "RSI oversold with bullish MACD crossover",
            "rules_triggered": [
                {"rule_name": "rsi_oversold", "confidence": 0.9, "reasoning": "RSI at 28"},
                {"rule_name": "macd_cross", "confidence": 0.75}
            ],
            "indicators_snapshot": {"rsi_14": 28.4, "macd": 0.12},
            "metadata": {"timeframe": "1d", "bars": 200}
        }
    }"#;

    const RANKING_JSON: &str = r#"{
        "event_type": "symbol_rankings",
        "source": "decision-engine",
        "schema_version": "1.0",
        "timestamp": "2024-03-15T21:00:00Z",
        "data": {
            "signal_type": "SELL",
            "criteria": "confidence * trend strength",
            "timestamp": "2024-03-15T21:00:00Z",
            "total_symbols": 120,
            "rankings": [
                {"symbol": "TSLA", "rank": 1, "score": 0.91, "signal_type": "SELL",
                 "confidence": 0.88, "reasoning": "Breakdown below support",
                 "ranking_factors": {"momentum": 0.7}},
                {"symbol": "NFLX", "rank": 2, "score": 0.77, "confidence": 0.71}
            ]
        }
    }"#;

    #[test]
    fn test_decision_event_deserialize() {
        let event: DecisionEvent = serde_json::from_str(DECISION_JSON).unwrap();

        assert_eq!(event.event_type, "trading_decision");
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap());
        assert_eq!(event.data.symbol, "AAPL");
        assert_eq!(event.data.signal_type(), Some(SignalType::Buy));
        assert_eq!(event.data.confidence, 0.82);
        assert_eq!(event.data.rules_triggered.len(), 2);
        assert_eq!(event.data.rules_triggered[1].reasoning, "");
        assert_eq!(
            event.data.indicators_snapshot.keys().collect::<Vec<_>>(),
            vec!["macd", "rsi_14"]
        );
        assert_eq!(event.data.metadata["timeframe"], "1d");
    }

    #[test]
    fn test_decision_optional_fields_default() {
        let json = r#"{
            "timestamp": "2024-03-15T14:30:00Z",
            "data": {"symbol": "MSFT", "signal": "WATCH", "confidence": 0.4}
        }"#;
        let event: DecisionEvent = serde_json::from_str(json).unwrap();

        assert!(event.event_type.is_empty());
        assert!(event.data.primary_reasoning.is_empty());
        assert!(event.data.rules_triggered.is_empty());
        assert!(event.data.indicators_snapshot.is_empty());
        assert!(event.data.metadata.is_empty());
    }

    #[test]
    fn test_decision_null_collections_decode_empty() {
        let json = r#"{
            "event_type": null,
            "timestamp": "2024-03-15T14:30:00Z",
            "data": {
                "symbol": "AMD",
                "signal": "SELL",
                "confidence": 0.77,
                "primary_reasoning": null,
                "rules_triggered": null,
                "indicators_snapshot": null,
                "metadata": null
            }
        }"#;
        let event: DecisionEvent = serde_json::from_str(json).unwrap();

        assert!(event.event_type.is_empty());
        assert_eq!(event.data.symbol, "AMD");
        assert!(event.data.primary_reasoning.is_empty());
        assert!(event.data.rules_triggered.is_empty());
        assert!(event.data.indicators_snapshot.is_empty());
        assert!(event.data.metadata.is_empty());
    }

    #[test]
    fn test_ranking_null_collections_decode_empty() {
        let json = r#"{
            "timestamp": "2024-03-15T21:00:00Z",
            "data": {
                "signal_type": "BUY",
                "criteria": null,
                "timestamp": "2024-03-15T21:00:00Z",
                "total_symbols": null,
                "rankings": [
                    {"symbol": "AMD", "rank": 1, "score": 0.8, "confidence": 0.7,
                     "reasoning": null, "ranking_factors": null}
                ]
            }
        }"#;
        let event: RankingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.data.total_symbols, 0);
        assert!(event.data.rankings[0].reasoning.is_empty());
        assert!(event.data.rankings[0].ranking_factors.is_empty());

        let empty = r#"{
            "timestamp": "2024-03-15T21:00:00Z",
            "data": {"signal_type": "SELL", "timestamp": "2024-03-15T21:00:00Z", "rankings": null}
        }"#;
        let event: RankingEvent = serde_json::from_str(empty).unwrap();
        assert!(event.data.rankings.is_empty());
    }

    #[test]
    fn test_decision_missing_required_field_fails() {
        let json = r#"{
            "timestamp": "2024-03-15T14:30:00Z",
            "data": {"symbol": "MSFT", "signal": "BUY"}
        }"#;
        assert!(serde_json::from_str::<DecisionEvent>(json).is_err());
    }

    #[test]
    fn test_ranking_event_deserialize() {
        let event: RankingEvent = serde_json::from_str(RANKING_JSON).unwrap();

        assert_eq!(event.data.signal_type(), Some(SignalType::Sell));
        assert_eq!(event.data.total_symbols, 120);
        assert_eq!(event.data.rankings.len(), 2);
        assert_eq!(event.data.rankings[0].rank, 1);
        assert_eq!(event.data.rankings[0].ranking_factors["momentum"], 0.7);
        assert!(event.data.rankings[1].reasoning.is_empty());
    }

    #[test]
    fn test_signal_type_parse_is_exact() {
        assert_eq!(SignalType::parse("BUY"), Some(SignalType::Buy));
        assert_eq!(SignalType::parse("SELL"), Some(SignalType::Sell));
        assert_eq!(SignalType::parse("WATCH"), Some(SignalType::Watch));
        assert_eq!(SignalType::parse("buy"), None);
        assert_eq!(SignalType::parse("HOLD"), None);
        assert_eq!(SignalType::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_alert_event_kind_and_subject() {
        let decision = AlertEvent::Decision(serde_json::from_str(DECISION_JSON).unwrap());
        let ranking = AlertEvent::Ranking(serde_json::from_str(RANKING_JSON).unwrap());

        assert_eq!(decision.kind(), EventKind::Decision);
        assert_eq!(decision.subject(), "AAPL");
        assert_eq!(ranking.kind(), EventKind::Ranking);
        assert_eq!(ranking.subject(), "SELL");
    }

    #[test]
    fn test_try_from_matching_variant() {
        let event = AlertEvent::Decision(serde_json::from_str(DECISION_JSON).unwrap());
        let decision = DecisionEvent::try_from(event).unwrap();
        assert_eq!(decision.data.symbol, "AAPL");
    }

    #[test]
    fn test_try_from_wrong_variant() {
        let event = AlertEvent::Ranking(serde_json::from_str(RANKING_JSON).unwrap());

        match DecisionEvent::try_from(event) {
            Err(AlertError::UnexpectedEvent { expected, actual }) => {
                assert_eq!(expected, "decision");
                assert_eq!(actual, "ranking");
            }
            other => panic!("Expected UnexpectedEvent, got {:?}", other),
        }
    }
}
