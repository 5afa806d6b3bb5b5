use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashSet, VecDeque};
use tracing::{info, warn};

pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::{JsonFileStore, LedgerStore, NullStore};
pub use types::{
    CorruptionIssue, CorruptionReport, DataQuality, LedgerExport, MarketDataPoint, MarketPatterns,
    TradeFill, TradeOutcomeKind, TradeRecord, TradeStatistics,
};

/// Retained trade history, oldest evicted first.
const MAX_TRADES: usize = 10_000;
/// Retained market-data window, oldest evicted first.
const MAX_MARKET_POINTS: usize = 5_000;
/// Market data is persisted once per this many appends; trades persist on
/// every write.
const MARKET_PERSIST_INTERVAL: u64 = 50;
/// Window of recent points used for pattern extraction.
const PATTERN_WINDOW: usize = 100;
/// Half-window average price drift beyond this fraction counts as a trend.
const TREND_EDGE: Decimal = rust_decimal_macros::dec!(0.001);
/// Absolute P&L disagreement above this is a mismatch.
const PNL_TOLERANCE: Decimal = rust_decimal_macros::dec!(0.01);
/// Mismatches on more than this share of trades flag corruption.
const PNL_MISMATCH_SHARE: f64 = 0.10;
/// A zero win rate over a history this large is treated as corruption.
const ZERO_WIN_RATE_MIN_TRADES: usize = 100;
/// Minimum history before downstream learning is considered meaningful.
const MIN_TRADES_FOR_LEARNING: usize = 20;
const MIN_MARKET_POINTS_FOR_LEARNING: usize = 500;

/// Summary of what a repair pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub duplicates_removed: usize,
    pub pnl_recomputed: usize,
}

impl RepairSummary {
    pub fn changed(&self) -> bool {
        self.duplicates_removed > 0 || self.pnl_recomputed > 0
    }
}

/// Bounded, persistent record of completed trades and observed market data.
///
/// Both histories are capped; appending beyond the cap evicts the oldest
/// entries. Persistence failures are logged and never poison the in-memory
/// state: the ledger keeps trading on a broken disk.
pub struct TradeLedger {
    trades: VecDeque<TradeRecord>,
    market_data: VecDeque<MarketDataPoint>,
    store: Box<dyn LedgerStore>,
    seq: u64,
    market_appends: u64,
}

impl TradeLedger {
    /// Loads retained history from the store. Load failures start the ledger
    /// empty rather than failing the whole engine.
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        let trades = match store.load_trades() {
            Ok(trades) => trades,
            Err(e) => {
                warn!(error = %e, "Failed to load trade history, starting empty");
                Vec::new()
            }
        };
        let market_data = match store.load_market_data() {
            Ok(points) => points,
            Err(e) => {
                warn!(error = %e, "Failed to load market data, starting empty");
                Vec::new()
            }
        };

        let mut trades: VecDeque<_> = trades.into();
        while trades.len() > MAX_TRADES {
            trades.pop_front();
        }
        let mut market_data: VecDeque<_> = market_data.into();
        while market_data.len() > MAX_MARKET_POINTS {
            market_data.pop_front();
        }

        let seq = trades.len() as u64;
        Self { trades, market_data, store, seq, market_appends: 0 }
    }

    pub fn trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn market_data_count(&self) -> usize {
        self.market_data.len()
    }

    /// Records a completed round trip. P&L, return, holding time and outcome
    /// are derived here from the fill so stored records are always internally
    /// consistent.
    pub fn record_trade(&mut self, fill: TradeFill) -> TradeRecord {
        let profit_loss = fill.side.sign() * (fill.exit_price - fill.entry_price) * fill.quantity;
        let return_percentage = if fill.entry_price > Decimal::ZERO {
            let raw = (fill.exit_price - fill.entry_price) / fill.entry_price
                * rust_decimal_macros::dec!(100)
                * fill.side.sign();
            raw.to_f64().unwrap_or(0.0)
        } else {
            0.0
        };
        let holding_secs =
            (fill.exit_time - fill.entry_time).num_milliseconds() as f64 / 1_000.0;
        let outcome = if profit_loss > Decimal::ZERO {
            TradeOutcomeKind::Win
        } else {
            TradeOutcomeKind::Loss
        };

        self.seq += 1;
        let record = TradeRecord {
            id: format!("{}_{}_{}", fill.symbol, fill.entry_time.timestamp_millis(), self.seq),
            timestamp: fill.exit_time,
            symbol: fill.symbol,
            side: fill.side,
            entry_price: fill.entry_price,
            exit_price: fill.exit_price,
            quantity: fill.quantity,
            entry_time: fill.entry_time,
            exit_time: fill.exit_time,
            profit_loss,
            return_percentage,
            holding_secs,
            mfe_pct: fill.mfe_pct,
            mae_pct: fill.mae_pct,
            market: fill.market,
            indicators: fill.indicators,
            prediction: fill.prediction,
            outcome,
            exit_reason: fill.exit_reason,
        };

        self.trades.push_back(record.clone());
        while self.trades.len() > MAX_TRADES {
            self.trades.pop_front();
        }
        self.persist_trades();
        record
    }

    /// Appends one market observation. Persists only every
    /// [`MARKET_PERSIST_INTERVAL`]th append, since market data arrives far
    /// more often than trades complete.
    pub fn record_market_data(&mut self, point: MarketDataPoint) {
        self.market_data.push_back(point);
        while self.market_data.len() > MAX_MARKET_POINTS {
            self.market_data.pop_front();
        }
        self.market_appends += 1;
        if self.market_appends % MARKET_PERSIST_INTERVAL == 0 {
            self.persist_market_data();
        }
    }

    pub fn statistics(&self) -> TradeStatistics {
        if self.trades.is_empty() {
            return TradeStatistics::default();
        }

        let total = self.trades.len();
        let mut wins = 0usize;
        let mut total_pnl = Decimal::ZERO;
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut holding_sum = 0.0;
        let mut return_sum = 0.0;
        let mut mfe_sum = 0.0;
        let mut mae_sum = 0.0;
        let mut best = self.trades[0].profit_loss;
        let mut worst = self.trades[0].profit_loss;

        // Longest streaks and the drawdown of the cumulative return series,
        // both walked in arrival order.
        let mut consecutive_wins = 0usize;
        let mut consecutive_losses = 0usize;
        let mut win_run = 0usize;
        let mut loss_run = 0usize;
        let mut cumulative_return = 0.0;
        let mut peak_return = 0.0f64;
        let mut max_drawdown = 0.0f64;

        for trade in &self.trades {
            total_pnl += trade.profit_loss;
            holding_sum += trade.holding_secs;
            return_sum += trade.return_percentage;
            mfe_sum += trade.mfe_pct;
            mae_sum += trade.mae_pct;
            if trade.outcome == TradeOutcomeKind::Win {
                wins += 1;
                gross_profit += trade.profit_loss;
                win_run += 1;
                loss_run = 0;
            } else {
                gross_loss += -trade.profit_loss;
                loss_run += 1;
                win_run = 0;
            }
            consecutive_wins = consecutive_wins.max(win_run);
            consecutive_losses = consecutive_losses.max(loss_run);

            cumulative_return += trade.return_percentage;
            peak_return = peak_return.max(cumulative_return);
            max_drawdown = max_drawdown.max(peak_return - cumulative_return);

            if trade.profit_loss > best {
                best = trade.profit_loss;
            }
            if trade.profit_loss < worst {
                worst = trade.profit_loss;
            }
        }

        let losses = total - wins;
        let average_win = if wins > 0 {
            gross_profit / Decimal::from(wins as u64)
        } else {
            Decimal::ZERO
        };
        let average_loss = if losses > 0 {
            gross_loss / Decimal::from(losses as u64)
        } else {
            Decimal::ZERO
        };
        let profit_factor = if gross_loss > Decimal::ZERO {
            (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        let average_return_pct = return_sum / total as f64;
        let return_variance = self
            .trades
            .iter()
            .map(|t| (t.return_percentage - average_return_pct).powi(2))
            .sum::<f64>()
            / total as f64;
        let return_std = return_variance.sqrt();
        let return_volatility_ratio = if return_std > 0.0 {
            average_return_pct / return_std
        } else {
            0.0
        };

        TradeStatistics {
            total_trades: total,
            wins,
            losses,
            win_rate: wins as f64 / total as f64 * 100.0,
            total_pnl,
            average_win,
            average_loss,
            average_return_pct,
            average_holding_secs: holding_sum / total as f64,
            average_mfe_pct: mfe_sum / total as f64,
            average_mae_pct: mae_sum / total as f64,
            profit_factor,
            return_volatility_ratio,
            max_drawdown_pct: max_drawdown,
            best_trade: best,
            worst_trade: worst,
            consecutive_wins,
            consecutive_losses,
        }
    }

    /// Extracts trend and efficiency over the most recent window of market
    /// points. `None` until enough points have accumulated.
    pub fn market_patterns(&self) -> Option<MarketPatterns> {
        if self.market_data.len() < PATTERN_WINDOW {
            return None;
        }
        let window: Vec<&MarketDataPoint> = self
            .market_data
            .iter()
            .skip(self.market_data.len() - PATTERN_WINDOW)
            .collect();

        let half = window.len() / 2;
        let first_avg = Self::average_price(&window[..half]);
        let second_avg = Self::average_price(&window[half..]);
        let trend = if first_avg > Decimal::ZERO {
            let drift = (second_avg - first_avg) / first_avg;
            if drift > TREND_EDGE {
                core_types::TrendDirection::Up
            } else if drift < -TREND_EDGE {
                core_types::TrendDirection::Down
            } else {
                core_types::TrendDirection::Sideways
            }
        } else {
            core_types::TrendDirection::Sideways
        };

        let count = Decimal::from(window.len() as u64);
        let average_price = Self::average_price(&window);
        let average_volume: Decimal = window.iter().map(|p| p.volume).sum::<Decimal>() / count;
        let spread_sum: Decimal = window.iter().map(|p| p.spread).sum();
        let average_spread = spread_sum / count;

        let price_volatility = Self::population_std(
            window.iter().map(|p| p.price.to_f64().unwrap_or(0.0)),
            window.len(),
        );
        let volume_volatility = Self::population_std(
            window.iter().map(|p| p.volume.to_f64().unwrap_or(0.0)),
            window.len(),
        );

        let mut change_sum = Decimal::ZERO;
        for pair in window.windows(2) {
            change_sum += (pair[1].price - pair[0].price).abs();
        }
        let average_price_change = change_sum / Decimal::from((window.len() - 1) as u64);

        let efficiency = if average_price_change > Decimal::ZERO {
            (average_spread / average_price_change)
                .to_f64()
                .unwrap_or(1.0)
                .min(1.0)
        } else {
            1.0
        };

        Some(MarketPatterns {
            trend,
            average_price,
            price_volatility,
            average_volume,
            volume_volatility,
            average_spread,
            average_price_change,
            efficiency,
        })
    }

    fn population_std(values: impl Iterator<Item = f64> + Clone, count: usize) -> f64 {
        if count == 0 {
            return 0.0;
        }
        let mean = values.clone().sum::<f64>() / count as f64;
        let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        variance.sqrt()
    }

    fn average_price(points: &[&MarketDataPoint]) -> Decimal {
        if points.is_empty() {
            return Decimal::ZERO;
        }
        let sum: Decimal = points.iter().map(|p| p.price).sum();
        sum / Decimal::from(points.len() as u64)
    }

    /// True once the retained history is large enough for learning layers to
    /// draw conclusions from it.
    pub fn has_enough_data(&self) -> bool {
        self.trades.len() >= MIN_TRADES_FOR_LEARNING
            && self.market_data.len() >= MIN_MARKET_POINTS_FOR_LEARNING
    }

    pub fn data_quality(&self) -> DataQuality {
        let now = Utc::now();
        let day_ago = now - chrono::Duration::hours(24);
        let hour_ago = now - chrono::Duration::hours(1);

        let trades_last_24h = self.trades.iter().filter(|t| t.exit_time >= day_ago).count();
        let market_points_last_hour = self
            .market_data
            .iter()
            .filter(|p| p.timestamp >= hour_ago)
            .count();
        let data_age_secs = self
            .market_data
            .back()
            .map(|p| (now - p.timestamp).num_milliseconds() as f64 / 1_000.0);

        let prediction_accuracy = if self.trades.is_empty() {
            None
        } else {
            let correct = self
                .trades
                .iter()
                .filter(|t| {
                    let predicted_win = t.prediction.probability > 0.5;
                    predicted_win == (t.outcome == TradeOutcomeKind::Win)
                })
                .count();
            Some(correct as f64 / self.trades.len() as f64)
        };

        DataQuality {
            total_trades: self.trades.len(),
            total_market_points: self.market_data.len(),
            trades_last_24h,
            market_points_last_hour,
            data_age_secs,
            prediction_accuracy,
            has_enough_data: self.has_enough_data(),
        }
    }

    /// Scans retained trades for integrity defects without modifying them.
    pub fn detect_corruption(&self) -> CorruptionReport {
        let mut issues = Vec::new();
        let total = self.trades.len();

        if total > ZERO_WIN_RATE_MIN_TRADES
            && self.trades.iter().all(|t| t.outcome == TradeOutcomeKind::Loss)
        {
            issues.push(CorruptionIssue::ZeroWinRate { total_trades: total });
        }

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for trade in &self.trades {
            if !seen.insert(trade.id.as_str()) && !duplicates.contains(&trade.id) {
                duplicates.push(trade.id.clone());
            }
        }
        if !duplicates.is_empty() {
            issues.push(CorruptionIssue::DuplicateTradeIds { ids: duplicates });
        }

        if total > 0 {
            let mismatched = self
                .trades
                .iter()
                .filter(|t| (t.profit_loss - Self::expected_pnl(t)).abs() > PNL_TOLERANCE)
                .count();
            if mismatched as f64 / total as f64 > PNL_MISMATCH_SHARE {
                issues.push(CorruptionIssue::PnlMismatch { mismatched, total });
            }
        }

        CorruptionReport { issues }
    }

    /// Repairs what [`detect_corruption`](Self::detect_corruption) can find
    /// mechanically: duplicate ids keep their first occurrence, and
    /// mismatched P&L is recomputed from prices in place. Idempotent.
    pub fn repair(&mut self) -> RepairSummary {
        let before = self.trades.len();
        let mut seen = HashSet::new();
        self.trades.retain(|t| seen.insert(t.id.clone()));
        let duplicates_removed = before - self.trades.len();

        let mut pnl_recomputed = 0usize;
        for trade in self.trades.iter_mut() {
            let expected = trade.side.sign() * (trade.exit_price - trade.entry_price) * trade.quantity;
            if (trade.profit_loss - expected).abs() > PNL_TOLERANCE {
                trade.profit_loss = expected;
                trade.outcome = if expected > Decimal::ZERO {
                    TradeOutcomeKind::Win
                } else {
                    TradeOutcomeKind::Loss
                };
                if trade.entry_price > Decimal::ZERO {
                    trade.return_percentage = ((trade.exit_price - trade.entry_price)
                        / trade.entry_price
                        * rust_decimal_macros::dec!(100)
                        * trade.side.sign())
                    .to_f64()
                    .unwrap_or(0.0);
                }
                pnl_recomputed += 1;
            }
        }

        let summary = RepairSummary { duplicates_removed, pnl_recomputed };
        if summary.changed() {
            info!(
                duplicates = duplicates_removed,
                recomputed = pnl_recomputed,
                "Repaired trade ledger"
            );
            self.persist_trades();
        }
        summary
    }

    /// Clones the full retained state into a consistent snapshot.
    pub fn export(&self) -> LedgerExport {
        LedgerExport {
            exported_at: Utc::now(),
            statistics: self.statistics(),
            patterns: self.market_patterns(),
            quality: self.data_quality(),
            trades: self.trades.iter().cloned().collect(),
            market_data: self.market_data.iter().cloned().collect(),
        }
    }

    /// Forces both datasets to disk, regardless of the persist interval.
    pub fn flush(&mut self) {
        self.persist_trades();
        self.persist_market_data();
    }

    fn expected_pnl(trade: &TradeRecord) -> Decimal {
        trade.side.sign() * (trade.exit_price - trade.entry_price) * trade.quantity
    }

    fn persist_trades(&mut self) {
        let trades: Vec<TradeRecord> = self.trades.iter().cloned().collect();
        if let Err(e) = self.store.save_trades(&trades) {
            warn!(error = %e, "Failed to persist trade history");
        }
    }

    fn persist_market_data(&mut self) {
        let points: Vec<MarketDataPoint> = self.market_data.iter().cloned().collect();
        if let Err(e) = self.store.save_market_data(&points) {
            warn!(error = %e, "Failed to persist market data");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_types::{
        FeatureScores, IndicatorSnapshot, MarketRegime, MarketSnapshot, Prediction, Side, Symbol,
        TrendDirection, VolatilityRegime,
    };
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn market() -> MarketSnapshot {
        MarketSnapshot {
            market_regime: MarketRegime::SidewaysQuiet,
            volatility_regime: VolatilityRegime::Normal,
            liquidity_score: 0.5,
            spread_quality: 0.5,
            trend: TrendDirection::Sideways,
            volatility: 0.01,
        }
    }

    fn indicators() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            vwap: 100.0,
            bollinger_middle: 100.0,
            atr: None,
            volume_ratio: 1.0,
            orderbook_pressure: None,
        }
    }

    fn prediction(probability: f64) -> Prediction {
        Prediction {
            probability,
            confidence: 0.5,
            risk_score: 0.3,
            expected_return: 0.5,
            time_horizon_secs: 60.0,
            kelly_fraction: 0.05,
            max_adverse_excursion: 0.4,
            feature_contributions: HashMap::new(),
            features: FeatureScores::default(),
        }
    }

    fn fill(entry: Decimal, exit: Decimal, side: Side) -> TradeFill {
        let entry_time = Utc::now() - Duration::seconds(30);
        TradeFill {
            symbol: Symbol("BTCUSDT".to_string()),
            side,
            entry_price: entry,
            exit_price: exit,
            quantity: dec!(1),
            entry_time,
            exit_time: entry_time + Duration::seconds(30),
            mfe_pct: 0.5,
            mae_pct: -0.2,
            market: market(),
            indicators: indicators(),
            prediction: prediction(0.6),
            exit_reason: "take profit".to_string(),
        }
    }

    fn ledger() -> TradeLedger {
        TradeLedger::new(Box::new(NullStore))
    }

    #[test]
    fn long_trade_derives_pnl_return_and_outcome() {
        let mut ledger = ledger();
        let record = ledger.record_trade(fill(dec!(100), dec!(102), Side::Long));

        assert_eq!(record.profit_loss, dec!(2));
        assert!((record.return_percentage - 2.0).abs() < 1e-9);
        assert_eq!(record.outcome, TradeOutcomeKind::Win);
        assert!((record.holding_secs - 30.0).abs() < 0.5);
    }

    #[test]
    fn short_trade_profits_when_price_falls() {
        let mut ledger = ledger();
        let record = ledger.record_trade(fill(dec!(100), dec!(98), Side::Short));

        assert_eq!(record.profit_loss, dec!(2));
        assert!((record.return_percentage - 2.0).abs() < 1e-9);
        assert_eq!(record.outcome, TradeOutcomeKind::Win);
    }

    #[test]
    fn trade_ids_are_unique_across_identical_fills() {
        let mut ledger = ledger();
        let a = ledger.record_trade(fill(dec!(100), dec!(101), Side::Long));
        let b = ledger.record_trade(fill(dec!(100), dec!(101), Side::Long));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn statistics_over_mixed_outcomes() {
        let mut ledger = ledger();
        for _ in 0..5 {
            ledger.record_trade(fill(dec!(100), dec!(102), Side::Long));
        }
        ledger.record_trade(fill(dec!(100), dec!(99), Side::Long));

        let stats = ledger.statistics();
        assert_eq!(stats.total_trades, 6);
        assert_eq!(stats.wins, 5);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 5.0 / 6.0 * 100.0).abs() < 1e-9);
        assert_eq!(stats.total_pnl, dec!(9));
        assert_eq!(stats.average_win, dec!(2));
        assert_eq!(stats.average_loss, dec!(1));
        assert!((stats.profit_factor - 10.0).abs() < 1e-9);
        assert_eq!(stats.best_trade, dec!(2));
        assert_eq!(stats.worst_trade, dec!(-1));
        // Five straight wins then one loss.
        assert_eq!(stats.consecutive_wins, 5);
        assert_eq!(stats.consecutive_losses, 1);
        // Cumulative return peaks at +10% then falls 1% on the loss.
        assert!((stats.max_drawdown_pct - 1.0).abs() < 1e-9);
        assert!(stats.return_volatility_ratio > 0.0);
        assert!((stats.average_return_pct - 9.0 / 6.0).abs() < 1e-9);
        assert!(stats.average_mfe_pct > 0.0);
        assert!(stats.average_mae_pct < 0.0);
    }

    #[test]
    fn statistics_zeroed_when_empty() {
        assert_eq!(ledger().statistics(), TradeStatistics::default());
    }

    #[test]
    fn profit_factor_zero_without_losses() {
        let mut ledger = ledger();
        ledger.record_trade(fill(dec!(100), dec!(101), Side::Long));
        assert_eq!(ledger.statistics().profit_factor, 0.0);
    }

    fn point(price: Decimal, offset_secs: i64) -> MarketDataPoint {
        MarketDataPoint {
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            price,
            volume: dec!(10),
            spread: dec!(0.01),
            bid_quantity: dec!(5),
            ask_quantity: dec!(5),
            order_book_imbalance: 0.0,
            indicators: None,
            market: None,
        }
    }

    #[test]
    fn market_data_window_is_bounded_and_keeps_newest() {
        let mut ledger = ledger();
        for i in 0..(MAX_MARKET_POINTS + 10) {
            ledger.record_market_data(point(Decimal::from(i as u64), i as i64));
        }
        assert_eq!(ledger.market_data_count(), MAX_MARKET_POINTS);
        assert_eq!(ledger.market_data.front().map(|p| p.price), Some(dec!(10)));
        assert_eq!(
            ledger.market_data.back().map(|p| p.price),
            Some(Decimal::from((MAX_MARKET_POINTS + 9) as u64))
        );
    }

    #[test]
    fn patterns_need_a_full_window() {
        let mut ledger = ledger();
        for i in 0..(PATTERN_WINDOW - 1) {
            ledger.record_market_data(point(dec!(100), i as i64));
        }
        assert!(ledger.market_patterns().is_none());
    }

    #[test]
    fn rising_prices_read_as_uptrend() {
        let mut ledger = ledger();
        for i in 0..PATTERN_WINDOW {
            let price = dec!(100) + Decimal::from(i as u64) * dec!(0.05);
            ledger.record_market_data(point(price, i as i64));
        }
        let patterns = ledger.market_patterns().unwrap();
        assert_eq!(patterns.trend, TrendDirection::Up);
        // Spread 0.01 against 0.05 moves: efficient market.
        assert!((patterns.efficiency - 0.2).abs() < 1e-9);
    }

    #[test]
    fn flat_prices_read_as_sideways_with_full_friction() {
        let mut ledger = ledger();
        for i in 0..PATTERN_WINDOW {
            ledger.record_market_data(point(dec!(100), i as i64));
        }
        let patterns = ledger.market_patterns().unwrap();
        assert_eq!(patterns.trend, TrendDirection::Sideways);
        assert_eq!(patterns.efficiency, 1.0);
    }

    #[test]
    fn enough_data_requires_both_histories() {
        let mut ledger = ledger();
        for _ in 0..MIN_TRADES_FOR_LEARNING {
            ledger.record_trade(fill(dec!(100), dec!(101), Side::Long));
        }
        assert!(!ledger.has_enough_data());
        for i in 0..MIN_MARKET_POINTS_FOR_LEARNING {
            ledger.record_market_data(point(dec!(100), i as i64));
        }
        assert!(ledger.has_enough_data());
    }

    #[test]
    fn corruption_detected_and_repaired() {
        let mut ledger = ledger();
        let record = ledger.record_trade(fill(dec!(100), dec!(102), Side::Long));

        // Inject a duplicate id and a corrupted P&L.
        let mut duplicate = record.clone();
        duplicate.profit_loss = dec!(50);
        ledger.trades.push_back(duplicate);

        let report = ledger.detect_corruption();
        assert!(!report.is_clean());
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, CorruptionIssue::DuplicateTradeIds { .. })));
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, CorruptionIssue::PnlMismatch { .. })));

        let summary = ledger.repair();
        assert_eq!(summary.duplicates_removed, 1);
        assert!(ledger.detect_corruption().is_clean());

        // Repair is idempotent.
        assert!(!ledger.repair().changed());
    }

    #[test]
    fn repair_recomputes_pnl_from_prices() {
        let mut ledger = ledger();
        ledger.record_trade(fill(dec!(100), dec!(102), Side::Long));
        if let Some(trade) = ledger.trades.back_mut() {
            trade.profit_loss = dec!(-7);
            trade.outcome = TradeOutcomeKind::Loss;
        }

        let summary = ledger.repair();
        assert_eq!(summary.pnl_recomputed, 1);
        let trade = ledger.trades.back().unwrap();
        assert_eq!(trade.profit_loss, dec!(2));
        assert_eq!(trade.outcome, TradeOutcomeKind::Win);
        assert!((trade.return_percentage - 2.0).abs() < 1e-9);
    }

    #[test]
    fn prediction_accuracy_matches_direction_calls() {
        let mut ledger = ledger();
        // prob 0.6 + win: correct.
        ledger.record_trade(fill(dec!(100), dec!(102), Side::Long));
        // prob 0.6 + loss: incorrect.
        ledger.record_trade(fill(dec!(100), dec!(99), Side::Long));

        let quality = ledger.data_quality();
        assert_eq!(quality.prediction_accuracy, Some(0.5));
        assert_eq!(quality.trades_last_24h, 2);
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let trades_path = dir.path().join("trades.json");
        let market_path = dir.path().join("market.json");

        {
            let store = JsonFileStore::new(&trades_path, &market_path);
            let mut ledger = TradeLedger::new(Box::new(store));
            ledger.record_trade(fill(dec!(100), dec!(103), Side::Long));
            ledger.record_market_data(point(dec!(100), 0));
            ledger.flush();
        }

        let store = JsonFileStore::new(&trades_path, &market_path);
        let ledger = TradeLedger::new(Box::new(store));
        assert_eq!(ledger.trade_count(), 1);
        assert_eq!(ledger.market_data_count(), 1);
        assert_eq!(ledger.trades().next().map(|t| t.profit_loss), Some(dec!(3)));
    }
}
