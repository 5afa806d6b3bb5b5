use core_types::{
    BookTick, IndicatorSnapshot, MarketRegime, MarketSnapshot, TrendDirection, VolatilityRegime,
};
use rust_decimal::prelude::ToPrimitive;
use std::collections::VecDeque;

/// Ticks required before any indicators are produced.
const WARM_UP: usize = 20;
const WINDOW: usize = 120;

/// Rolling-window indicator engine over the synthetic feed. Returns nothing
/// until warmed up, which exercises the engine's tolerance for missing
/// snapshots.
pub struct NaiveAnalysis {
    prices: VecDeque<f64>,
    last_imbalance: f64,
}

impl NaiveAnalysis {
    pub fn new() -> Self {
        Self { prices: VecDeque::new(), last_imbalance: 0.0 }
    }

    pub fn observe(&mut self, tick: &BookTick) -> Option<(IndicatorSnapshot, MarketSnapshot)> {
        let price = tick.mark_price()?.to_f64()?;
        self.prices.push_back(price);
        while self.prices.len() > WINDOW {
            self.prices.pop_front();
        }
        self.last_imbalance = tick.imbalance();

        if self.prices.len() < WARM_UP {
            return None;
        }

        let mean = self.mean();
        let volatility = self.volatility(mean);
        let atr = self.average_true_range();
        let spread_quality = tick
            .spread()
            .and_then(|s| s.to_f64())
            .map(|s| (1.0 - (s / price) * 1_000.0).clamp(0.0, 1.0))
            .unwrap_or(0.0);
        let depth: f64 = tick
            .bids
            .iter()
            .chain(tick.asks.iter())
            .filter_map(|l| l.quantity.to_f64())
            .sum();

        let indicators = IndicatorSnapshot {
            rsi: self.rsi(),
            macd: self.short_mean(12) - self.short_mean(26),
            macd_signal: self.short_mean(9) - self.short_mean(26),
            vwap: mean,
            bollinger_middle: mean,
            atr: Some(atr),
            volume_ratio: 1.0,
            orderbook_pressure: Some(self.last_imbalance),
        };

        let trend = self.trend(mean, price);
        let volatility_regime = if volatility > 0.004 {
            VolatilityRegime::High
        } else if volatility < 0.001 {
            VolatilityRegime::Low
        } else {
            VolatilityRegime::Normal
        };
        let market = MarketSnapshot {
            market_regime: Self::regime(trend, volatility_regime),
            volatility_regime,
            liquidity_score: (depth / 200.0).clamp(0.0, 1.0),
            spread_quality,
            trend,
            volatility,
        };

        Some((indicators, market))
    }

    pub fn book_imbalance(&self) -> f64 {
        self.last_imbalance
    }

    fn mean(&self) -> f64 {
        self.prices.iter().sum::<f64>() / self.prices.len() as f64
    }

    fn short_mean(&self, n: usize) -> f64 {
        let take = n.min(self.prices.len());
        self.prices.iter().rev().take(take).sum::<f64>() / take as f64
    }

    fn volatility(&self, mean: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        let variance = self
            .prices
            .iter()
            .map(|p| (p - mean).powi(2))
            .sum::<f64>()
            / self.prices.len() as f64;
        variance.sqrt() / mean
    }

    fn average_true_range(&self) -> f64 {
        let changes: Vec<f64> = self
            .prices
            .iter()
            .zip(self.prices.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .collect();
        if changes.is_empty() {
            0.0
        } else {
            changes.iter().sum::<f64>() / changes.len() as f64
        }
    }

    fn rsi(&self) -> f64 {
        let mut gains = 0.0;
        let mut losses = 0.0;
        for (a, b) in self.prices.iter().zip(self.prices.iter().skip(1)) {
            let diff = b - a;
            if diff > 0.0 {
                gains += diff;
            } else {
                losses -= diff;
            }
        }
        if gains + losses == 0.0 {
            50.0
        } else {
            100.0 * gains / (gains + losses)
        }
    }

    fn trend(&self, mean: f64, price: f64) -> TrendDirection {
        if mean <= 0.0 {
            return TrendDirection::Sideways;
        }
        let drift = (price - mean) / mean;
        if drift > 0.001 {
            TrendDirection::Up
        } else if drift < -0.001 {
            TrendDirection::Down
        } else {
            TrendDirection::Sideways
        }
    }

    fn regime(trend: TrendDirection, volatility: VolatilityRegime) -> MarketRegime {
        match (trend, volatility) {
            (TrendDirection::Up, VolatilityRegime::High) => MarketRegime::StrongBull,
            (TrendDirection::Up, _) => MarketRegime::WeakBull,
            (TrendDirection::Down, VolatilityRegime::High) => MarketRegime::StrongBear,
            (TrendDirection::Down, _) => MarketRegime::WeakBear,
            (TrendDirection::Sideways, VolatilityRegime::High) => MarketRegime::SidewaysVolatile,
            (TrendDirection::Sideways, _) => MarketRegime::SidewaysQuiet,
        }
    }
}

impl Default for NaiveAnalysis {
    fn default() -> Self {
        Self::new()
    }
}
