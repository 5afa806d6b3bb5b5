use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A trading symbol (e.g., "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. All direction-aware P&L math goes through this.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// The lifecycle state of a position. Partial exits shrink the size but leave
/// the position `Open`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

pub type PositionId = u64;

/// A single speculative position owned by the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub status: PositionStatus,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// The capital committed at entry.
    pub fn entry_notional(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Signed fractional price change relative to entry, direction-aware.
    /// Positive means the position is in profit.
    pub fn price_change(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.side.sign() * (price - self.entry_price) / self.entry_price
    }
}

/// The full state of the simulated trading account.
///
/// Invariant (restored by [`Portfolio::revalue`] after every mutation):
/// `equity = available_balance + locked_profits + Σ unrealized_pnl(open)` and
/// `available_balance = base_capital + total_pnl - locked_profits - Σ entry_notional(open)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub base_capital: Decimal,
    pub available_balance: Decimal,
    pub locked_profits: Decimal,
    pub positions: Vec<Position>,
    /// Cumulative realized P&L over the life of the account.
    pub total_pnl: Decimal,
    /// Realized P&L accumulated during the current trading day, consumed by
    /// the daily-loss risk limit.
    pub day_pnl: Decimal,
    pub equity: Decimal,
}

impl Portfolio {
    pub fn new(base_capital: Decimal) -> Self {
        Self {
            base_capital,
            available_balance: base_capital,
            locked_profits: Decimal::ZERO,
            positions: Vec::new(),
            total_pnl: Decimal::ZERO,
            day_pnl: Decimal::ZERO,
            equity: base_capital,
        }
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn open_position_count(&self) -> usize {
        self.open_positions().count()
    }

    pub fn open_position_count_for(&self, symbol: &Symbol) -> usize {
        self.open_positions().filter(|p| &p.symbol == symbol).count()
    }

    /// Recomputes unrealized P&L, available balance and equity from the
    /// position list. Pure arithmetic; the only way derived fields change.
    pub fn revalue(&mut self) {
        let mut unrealized = Decimal::ZERO;
        let mut open_notional = Decimal::ZERO;

        for position in self.positions.iter_mut() {
            if position.status == PositionStatus::Open {
                position.unrealized_pnl = position.side.sign()
                    * (position.current_price - position.entry_price)
                    * position.quantity;
                unrealized += position.unrealized_pnl;
                open_notional += position.entry_notional();
            }
        }

        self.available_balance =
            self.base_capital + self.total_pnl - self.locked_profits - open_notional;
        self.equity = self.available_balance + self.locked_profits + unrealized;
    }
}

// --- Collaborator payloads (indicators, market context, predictions) ---

/// A snapshot of technical indicators, produced by an external analysis
/// engine and consumed opaquely by the decision core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub vwap: f64,
    pub bollinger_middle: f64,
    /// Average true range, absent until the indicator warms up.
    pub atr: Option<f64>,
    pub volume_ratio: f64,
    /// Signed order-flow pressure, absent when the feed supplies none. A
    /// present 0.0 is a genuine neutral reading, not a gap.
    pub orderbook_pressure: Option<f64>,
}

/// Trend-strength/direction classification supplied by the market-context
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRegime {
    StrongBull,
    WeakBull,
    SidewaysQuiet,
    SidewaysVolatile,
    WeakBear,
    StrongBear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
}

/// Market-context snapshot accompanying each indicator refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_regime: MarketRegime,
    pub volatility_regime: VolatilityRegime,
    /// Normalized [0, 1] order-book depth score.
    pub liquidity_score: f64,
    /// Normalized [0, 1] bid/ask tightness score.
    pub spread_quality: f64,
    pub trend: TrendDirection,
    pub volatility: f64,
}

/// Per-feature-group scores backing a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureScores {
    pub technical: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub microstructure: f64,
}

/// The output of the (external) prediction model for one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Probability of a favorable move, centered on 0.5.
    pub probability: f64,
    pub confidence: f64,
    pub risk_score: f64,
    /// Expected return in percent.
    pub expected_return: f64,
    /// Suggested holding horizon in seconds.
    pub time_horizon_secs: f64,
    /// Model-suggested optimal bet-sizing fraction (consumed, not computed).
    pub kelly_fraction: f64,
    /// Model-predicted worst-case adverse excursion, in percent.
    pub max_adverse_excursion: f64,
    /// Per-feature contribution breakdown, used for signal reasoning.
    pub feature_contributions: HashMap<String, f64>,
    pub features: FeatureScores,
}

// --- Raw market data ---

/// One price level of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// A raw top-of-book tick: bid/ask ladders plus the last traded price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookTick {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub last_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Number of book levels considered when computing the imbalance.
const IMBALANCE_DEPTH: usize = 15;

impl BookTick {
    /// Returns a copy with zero-quantity levels removed. Feeds occasionally
    /// deliver emptied levels as zero entries; they must not survive into
    /// imbalance or volume math.
    pub fn normalized(&self) -> BookTick {
        BookTick {
            bids: self
                .bids
                .iter()
                .copied()
                .filter(|l| l.quantity > Decimal::ZERO)
                .collect(),
            asks: self
                .asks
                .iter()
                .copied()
                .filter(|l| l.quantity > Decimal::ZERO)
                .collect(),
            last_price: self.last_price,
            timestamp: self.timestamp,
        }
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// The price the decision core marks positions against: the last traded
    /// price when the ticker supplies one, else the best bid.
    pub fn mark_price(&self) -> Option<Decimal> {
        self.last_price.or_else(|| self.best_bid().map(|l| l.price))
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Order-book imbalance over the top levels: (bids - asks) / total,
    /// in [-1, 1]. Zero when the book is empty.
    pub fn imbalance(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;

        let bid_volume: Decimal = self
            .bids
            .iter()
            .take(IMBALANCE_DEPTH)
            .map(|l| l.quantity)
            .sum();
        let ask_volume: Decimal = self
            .asks
            .iter()
            .take(IMBALANCE_DEPTH)
            .map(|l| l.quantity)
            .sum();
        let total = bid_volume + ask_volume;
        if total.is_zero() {
            return 0.0;
        }
        ((bid_volume - ask_volume) / total).to_f64().unwrap_or(0.0)
    }
}

// --- Signals ---

/// The direction of an emitted trading signal. HOLD outcomes are never
/// materialized as signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
}

impl SignalAction {
    pub fn side(&self) -> Side {
        match self {
            SignalAction::Buy => Side::Long,
            SignalAction::Sell => Side::Short,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
        }
    }
}

/// A sized, directional trading signal. Immutable once created; the indicator
/// and market snapshots are frozen copies of the values that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: Symbol,
    pub action: SignalAction,
    pub confidence: f64,
    pub price: Decimal,
    pub quantity: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub expected_return: f64,
    pub risk_score: f64,
    pub time_horizon_secs: f64,
    pub timestamp: DateTime<Utc>,
    pub reasoning: String,
    pub indicators: IndicatorSnapshot,
    pub market: MarketSnapshot,
}

impl TradingSignal {
    /// The capital this signal would commit.
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}
