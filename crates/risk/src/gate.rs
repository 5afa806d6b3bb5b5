use crate::{OrderCandidate, RiskCheck, RiskDecision, RiskPolicy};
use core_types::{Portfolio, TradingConfig};
use tracing::debug;

/// Gate admitting a candidate order only when every configured notional and
/// exposure limit holds: balance coverage, open-position count, single
/// position size and the daily-loss circuit breaker.
#[derive(Debug, Default)]
pub struct NotionalRiskGate;

impl NotionalRiskGate {
    pub fn new() -> Self {
        Self
    }
}

impl RiskPolicy for NotionalRiskGate {
    fn name(&self) -> &'static str {
        "NotionalRiskGate"
    }

    fn assess(
        &self,
        candidate: &OrderCandidate,
        portfolio: &Portfolio,
        config: &TradingConfig,
    ) -> RiskDecision {
        let open = portfolio.open_position_count();
        let mut failed = Vec::new();

        if portfolio.available_balance < candidate.notional {
            failed.push(RiskCheck::InsufficientBalance {
                available: portfolio.available_balance,
                required: candidate.notional,
            });
        }
        if open >= config.max_open_positions {
            failed.push(RiskCheck::TooManyOpenPositions {
                open,
                limit: config.max_open_positions,
            });
        }
        if candidate.notional > config.max_position_size {
            failed.push(RiskCheck::PositionTooLarge {
                notional: candidate.notional,
                limit: config.max_position_size,
            });
        }
        if portfolio.day_pnl.abs() >= config.max_daily_loss {
            failed.push(RiskCheck::DailyLossLimit {
                day_pnl: portfolio.day_pnl,
                limit: config.max_daily_loss,
            });
        }

        if config.debug_mode {
            debug!(
                symbol = %candidate.symbol,
                notional = %candidate.notional,
                available = %portfolio.available_balance,
                open_positions = open,
                day_pnl = %portfolio.day_pnl,
                failed_checks = failed.len(),
                "Risk gate assessment"
            );
        }

        if failed.is_empty() {
            RiskDecision::Admitted
        } else {
            RiskDecision::Rejected(failed)
        }
    }
}
