// --- Engine event structures, broadcast to observers ---

use chrono::{DateTime, Utc};
use core_types::{Position, PositionId, Symbol, TradingSignal};
use ledger::{CorruptionReport, TradeRecord};
use rust_decimal::Decimal;
use serde::Serialize;

/// One partial profit-taking step on an open position.
#[derive(Debug, Clone, Serialize)]
pub struct PartialExitEvent {
    pub position_id: PositionId,
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub exit_price: Decimal,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// A position fully closed, with the realized result.
#[derive(Debug, Clone, Serialize)]
pub struct PositionClosedEvent {
    pub position: Position,
    pub reason: String,
    pub realized_pnl: Decimal,
}

/// The top-level engine event enum.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    SignalGenerated(TradingSignal),
    SignalSuppressed { symbol: Symbol, reason: String },
    OrderRejected { symbol: Symbol, notional: Decimal, failed_checks: Vec<String> },
    PositionOpened(Position),
    PartialExit(PartialExitEvent),
    PositionClosed(PositionClosedEvent),
    TradeRecorded(TradeRecord),
    CorruptionDetected(CorruptionReport),
    ConfigUpdated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_and_payload_tags() {
        let event = EngineEvent::SignalSuppressed {
            symbol: Symbol("BTCUSDT".to_string()),
            reason: "rate limited".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SignalSuppressed");
        assert_eq!(json["payload"]["reason"], "rate limited");
    }

    #[test]
    fn unit_variant_serializes_without_payload() {
        let json = serde_json::to_value(EngineEvent::ConfigUpdated).unwrap();
        assert_eq!(json["type"], "ConfigUpdated");
    }
}
