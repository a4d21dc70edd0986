//! HTML message rendering for decision and ranking alerts.
//!
//! Pure functions only: identical input always yields identical text.

use crate::constants::render::*;
use crate::models::{DecisionEvent, RankingEvent, SignalType};

/// Marker for decision alerts; unknown signals get none
pub fn signal_marker(signal: &str) -> &'static str {
    match SignalType::parse(signal) {
        Some(SignalType::Buy) => BUY_MARKER,
        Some(SignalType::Sell) => SELL_MARKER,
        Some(SignalType::Watch) => WATCH_MARKER,
        None => "",
    }
}

/// Rankings only mark BUY and SELL lists
pub fn ranking_marker(signal: &str) -> &'static str {
    match SignalType::parse(signal) {
        Some(SignalType::Buy) => BUY_MARKER,
        Some(SignalType::Sell) => SELL_MARKER,
        _ => "",
    }
}

/// Fixed-width bar with `floor(confidence * 10)` filled segments.
/// Out-of-range input is clamped to [0, 1].
pub fn format_confidence_bar(confidence: f64) -> String {
    let c = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
    let filled = ((c * BAR_SEGMENTS as f64).floor() as usize).min(BAR_SEGMENTS);

    let mut bar = String::with_capacity(BAR_SEGMENTS * 3);
    bar.extend(std::iter::repeat(BAR_FILLED).take(filled));
    bar.extend(std::iter::repeat(BAR_EMPTY).take(BAR_SEGMENTS - filled));
    bar
}

/// 0.8 -> "80"
pub fn format_percent(confidence: f64) -> String {
    format!("{:.0}", confidence * 100.0)
}

/// Cut reasoning longer than 100 chars down to 97 plus "..."
pub fn truncate_reasoning(text: &str) -> String {
    if text.chars().count() > REASONING_MAX_CHARS {
        let mut out: String = text.chars().take(REASONING_KEEP).collect();
        out.push_str(TRUNCATION_MARKER);
        out
    } else {
        text.to_string()
    }
}

/// Escape the characters the HTML parse mode treats as markup
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn with_marker(marker: &str, rest: &str) -> String {
    if marker.is_empty() {
        rest.to_string()
    } else {
        format!("{} {}", marker, rest)
    }
}

pub fn format_decision_message(event: &DecisionEvent) -> String {
    let data = &event.data;
    let mut sb = String::new();

    // Header
    let title = format!(
        "<b>{} Signal: {}</b>",
        escape_html(&data.signal),
        escape_html(&data.symbol)
    );
    sb.push_str(&with_marker(signal_marker(&data.signal), &title));
    sb.push_str("\n\n");

    // Confidence
    sb.push_str(&format!(
        "📊 Confidence: {}% {}\n\n",
        format_percent(data.confidence),
        format_confidence_bar(data.confidence)
    ));

    // Primary reasoning
    sb.push_str(&format!(
        "💡 <b>Reason:</b>\n{}\n\n",
        escape_html(&data.primary_reasoning)
    ));

    if !data.rules_triggered.is_empty() {
        sb.push_str("📋 <b>Rules Triggered:</b>\n");
        for rule in &data.rules_triggered {
            sb.push_str(&format!(
                "  • {} ({}%)\n",
                escape_html(&rule.rule_name),
                format_percent(rule.confidence)
            ));
        }
        sb.push('\n');
    }

    if !data.indicators_snapshot.is_empty() {
        sb.push_str("📈 <b>Key Indicators:</b>\n");
        for (name, value) in &data.indicators_snapshot {
            sb.push_str(&format!("  • {}: {:.2}\n", escape_html(name), value));
        }
        sb.push('\n');
    }

    sb.push_str(&format!(
        "🕐 {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    sb
}

pub fn format_ranking_message(event: &RankingEvent, top_n: usize) -> String {
    let data = &event.data;
    let signal = escape_html(&data.signal_type);
    let mut sb = String::new();

    // Header
    let title = format!("<b>{} Rankings Update</b>", signal);
    sb.push_str(&with_marker(ranking_marker(&data.signal_type), &title));
    sb.push('\n');
    sb.push_str(&format!("📅 {}\n", data.timestamp.format("%Y-%m-%d %H:%M")));
    if !data.criteria.is_empty() {
        sb.push_str(&format!("🔎 Criteria: {}\n", escape_html(&data.criteria)));
    }
    sb.push('\n');

    let count = top_n.min(data.rankings.len());
    sb.push_str(&format!("<b>Top {} {} Candidates:</b>\n\n", count, signal));

    for (i, r) in data.rankings.iter().take(count).enumerate() {
        let position = match PODIUM.get(i) {
            Some(medal) => medal.to_string(),
            None => format!("{}.", i + 1),
        };

        sb.push_str(&format!(
            "{} <b>{}</b> - Score: {:.2} ({}% confidence)\n",
            position,
            escape_html(&r.symbol),
            r.score,
            format_percent(r.confidence)
        ));

        if !r.reasoning.is_empty() {
            sb.push_str(&format!(
                "    └ {}\n",
                escape_html(&truncate_reasoning(&r.reasoning))
            ));
        }
        sb.push('\n');
    }

    sb.push_str(&format!("📊 Total symbols analyzed: {}", data.total_symbols));

    sb
}
