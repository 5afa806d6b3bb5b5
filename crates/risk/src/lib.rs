use core_types::{Portfolio, Symbol, TradingConfig};
use rust_decimal::Decimal;
use serde::Serialize;

pub mod gate;

pub use gate::NotionalRiskGate;

/// A candidate order awaiting risk admission.
#[derive(Debug, Clone)]
pub struct OrderCandidate {
    pub symbol: Symbol,
    /// The capital the order would commit (price × quantity).
    pub notional: Decimal,
}

/// One specific risk limit a candidate order violated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RiskCheck {
    InsufficientBalance { available: Decimal, required: Decimal },
    TooManyOpenPositions { open: usize, limit: usize },
    PositionTooLarge { notional: Decimal, limit: Decimal },
    DailyLossLimit { day_pnl: Decimal, limit: Decimal },
}

impl std::fmt::Display for RiskCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCheck::InsufficientBalance { available, required } => {
                write!(f, "insufficient balance: {available} available, {required} required")
            }
            RiskCheck::TooManyOpenPositions { open, limit } => {
                write!(f, "too many open positions: {open} open, limit {limit}")
            }
            RiskCheck::PositionTooLarge { notional, limit } => {
                write!(f, "position too large: {notional} notional, limit {limit}")
            }
            RiskCheck::DailyLossLimit { day_pnl, limit } => {
                write!(f, "daily loss limit reached: day P&L {day_pnl}, limit {limit}")
            }
        }
    }
}

/// The outcome of a risk assessment. Rejection is a normal result, not an
/// error; callers are expected to surface the failing checks as an
/// observable event and move on.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Admitted,
    Rejected(Vec<RiskCheck>),
}

impl RiskDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RiskDecision::Admitted)
    }
}

/// The universal interface for a risk admission policy.
///
/// A `RiskPolicy` evaluates a candidate order against the current portfolio
/// state and the configured limits. It is pure: no side effects beyond
/// diagnostic logging.
pub trait RiskPolicy: Send + Sync {
    /// The name of the risk policy.
    fn name(&self) -> &'static str;

    /// Evaluates a candidate order, returning either admission or the full
    /// list of violated limits.
    fn assess(
        &self,
        candidate: &OrderCandidate,
        portfolio: &Portfolio,
        config: &TradingConfig,
    ) -> RiskDecision;
}
