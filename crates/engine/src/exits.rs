use crate::lifecycle::PositionTracking;
use chrono::{DateTime, Utc};
use core_types::{Position, Side, TradingConfig};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fraction of the current position size taken at each partial-profit level.
const PARTIAL_EXIT_FRACTION: Decimal = dec!(0.25);
/// Positions are never held longer than this, whatever the model's horizon.
const MAX_HOLD_SECS: f64 = 100.0;
/// Dynamic profit target never drops below this fraction of entry.
const DYNAMIC_TARGET_FLOOR: f64 = 0.006;

/// How much of the position an exit decision closes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitKind {
    Full,
    Partial { quantity: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub kind: ExitKind,
    pub reason: String,
}

/// Evaluates every exit rule against the current price and returns at most
/// one decision.
///
/// Rules are checked in a fixed order and the reason of the last rule that
/// fires wins; any full-exit rule overrides a partial one fired on the same
/// tick, because closing everything subsumes trimming.
pub fn evaluate(
    position: &Position,
    tracking: &PositionTracking,
    price: Decimal,
    now: DateTime<Utc>,
    config: &TradingConfig,
) -> Option<ExitDecision> {
    let change = position.price_change(price).to_f64().unwrap_or(0.0);
    let mut reason: Option<String> = None;
    let mut full = false;
    let mut partial = false;

    // 1. Time horizon.
    let held_secs = (now - tracking.opened_at).num_milliseconds() as f64 / 1_000.0;
    let max_hold = tracking.prediction.time_horizon_secs.min(MAX_HOLD_SECS);
    if held_secs >= max_hold {
        full = true;
        reason = Some(format!("time horizon reached ({held_secs:.0}s)"));
    }

    // 2. Partial-profit ladder: one 25% trim per configured level, in order.
    if config.enable_partial_profits {
        if let Some(level_pct) = config.partial_profit_levels.get(tracking.partial_exits_taken) {
            if change >= level_pct / 100.0 {
                partial = true;
                reason = Some(format!("partial profit at +{level_pct}%"));
            }
        }
    }

    // 3. Trailing stop.
    if let Some(stop) = tracking.trailing_stop {
        let hit = match position.side {
            Side::Long => price <= stop,
            Side::Short => price >= stop,
        };
        if hit {
            full = true;
            reason = Some(format!("trailing stop at {stop}"));
        }
    }

    // 4. Adverse-excursion stop: the model's own MAE forecast widens the
    //    configured stop loss when it is the larger of the two.
    let mae_limit = (tracking.prediction.max_adverse_excursion / 100.0)
        .max(config.stop_loss_percentage / 100.0);
    if change <= -mae_limit {
        full = true;
        reason = Some(format!("adverse excursion stop ({:.2}%)", change * 100.0));
    }

    // 5. Take profit. Skipped on a tick where the ladder fired, so a trim
    //    is not immediately escalated to a full close at the same price.
    let tp_fraction = config.take_profit_percentage / 100.0;
    if !partial && change >= tp_fraction {
        full = true;
        reason = Some("take profit".to_string());
    }

    // 6. Dynamic target from the model's expected return. Once the move has
    //    reached the fixed take profit, rule 5's reason stands.
    let dynamic_target = (tracking.prediction.expected_return / 100.0).max(DYNAMIC_TARGET_FLOOR);
    if !partial && change < tp_fraction && change >= dynamic_target {
        full = true;
        reason = Some(format!("dynamic target +{:.2}%", dynamic_target * 100.0));
    }

    let reason = reason?;
    if full {
        Some(ExitDecision { kind: ExitKind::Full, reason })
    } else if partial {
        Some(ExitDecision {
            kind: ExitKind::Partial { quantity: position.quantity * PARTIAL_EXIT_FRACTION },
            reason,
        })
    } else {
        None
    }
}
