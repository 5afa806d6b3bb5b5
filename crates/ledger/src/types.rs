use chrono::{DateTime, Utc};
use core_types::{IndicatorSnapshot, MarketSnapshot, Prediction, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Binary trade outcome: WIN iff the realized P&L is strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeOutcomeKind {
    Win,
    Loss,
}

/// One completed round trip, frozen at exit time. Snapshots are the values
/// that were live when the position was opened, so a record can be analyzed
/// long after the market has moved on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub profit_loss: Decimal,
    /// Direction-aware return in percent.
    pub return_percentage: f64,
    pub holding_secs: f64,
    /// Maximum favorable excursion over the holding period, in percent.
    pub mfe_pct: f64,
    /// Maximum adverse excursion over the holding period, in percent.
    pub mae_pct: f64,
    pub market: MarketSnapshot,
    pub indicators: IndicatorSnapshot,
    pub prediction: Prediction,
    pub outcome: TradeOutcomeKind,
    pub exit_reason: String,
}

/// The exit-side facts the ledger needs to turn into a [`TradeRecord`].
/// Derived fields (P&L, return, holding time, outcome) are computed by the
/// ledger itself so every record is internally consistent.
#[derive(Debug, Clone)]
pub struct TradeFill {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub mfe_pct: f64,
    pub mae_pct: f64,
    pub market: MarketSnapshot,
    pub indicators: IndicatorSnapshot,
    pub prediction: Prediction,
    pub exit_reason: String,
}

/// One observed market tick, optionally enriched with the indicator and
/// market snapshots that were current at the time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume: Decimal,
    pub spread: Decimal,
    pub bid_quantity: Decimal,
    pub ask_quantity: Decimal,
    pub order_book_imbalance: f64,
    pub indicators: Option<IndicatorSnapshot>,
    pub market: Option<MarketSnapshot>,
}

/// Aggregate performance statistics over the retained trade history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Win rate in percent.
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    /// Mean per-trade return, in percent.
    pub average_return_pct: f64,
    pub average_holding_secs: f64,
    pub average_mfe_pct: f64,
    pub average_mae_pct: f64,
    /// Gross profit over gross loss; zero when there are no losses.
    pub profit_factor: f64,
    /// Mean return over return standard deviation; zero when there is no
    /// variance.
    pub return_volatility_ratio: f64,
    /// Worst peak-to-trough fall of the cumulative return series, in percent.
    pub max_drawdown_pct: f64,
    pub best_trade: Decimal,
    pub worst_trade: Decimal,
    /// Longest run of winning trades in the retained history.
    pub consecutive_wins: usize,
    /// Longest run of losing trades in the retained history.
    pub consecutive_losses: usize,
}

/// Patterns extracted from the recent market-data window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPatterns {
    pub trend: core_types::TrendDirection,
    pub average_price: Decimal,
    /// Population standard deviation of the window's prices.
    pub price_volatility: f64,
    pub average_volume: Decimal,
    pub volume_volatility: f64,
    pub average_spread: Decimal,
    /// Mean absolute tick-to-tick price change.
    pub average_price_change: Decimal,
    /// Spread-to-movement ratio, capped at 1.
    pub efficiency: f64,
}

/// Data-recency and model-accuracy summary for operator dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_trades: usize,
    pub total_market_points: usize,
    pub trades_last_24h: usize,
    pub market_points_last_hour: usize,
    /// Seconds since the newest market point, if any.
    pub data_age_secs: Option<f64>,
    /// Fraction of trades where the model's directional call matched the
    /// outcome.
    pub prediction_accuracy: Option<f64>,
    pub has_enough_data: bool,
}

/// A point-in-time snapshot of the whole ledger, for external inspection.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerExport {
    pub exported_at: DateTime<Utc>,
    pub statistics: TradeStatistics,
    pub patterns: Option<MarketPatterns>,
    pub quality: DataQuality,
    pub trades: Vec<TradeRecord>,
    pub market_data: Vec<MarketDataPoint>,
}

/// A single integrity problem found by corruption detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CorruptionIssue {
    /// A win rate of exactly zero across a large history is overwhelmingly
    /// more likely to be a data defect than real performance.
    ZeroWinRate { total_trades: usize },
    DuplicateTradeIds { ids: Vec<String> },
    /// Stored P&L disagrees with the P&L recomputed from prices on more
    /// than a tolerable share of records.
    PnlMismatch { mismatched: usize, total: usize },
}

impl std::fmt::Display for CorruptionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorruptionIssue::ZeroWinRate { total_trades } => {
                write!(f, "zero win rate across {total_trades} trades")
            }
            CorruptionIssue::DuplicateTradeIds { ids } => {
                write!(f, "{} duplicated trade id(s)", ids.len())
            }
            CorruptionIssue::PnlMismatch { mismatched, total } => {
                write!(f, "P&L mismatch on {mismatched} of {total} trades")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorruptionReport {
    pub issues: Vec<CorruptionIssue>,
}

impl CorruptionReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
