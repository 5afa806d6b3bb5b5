use core_types::{FeatureScores, IndicatorSnapshot, MarketSnapshot, Prediction, TrendDirection};
use engine::{OutcomeSink, TradeOutcome};
use std::collections::HashMap;
use tracing::debug;

/// A deliberately simple prediction model for demo runs: momentum plus
/// order-flow, with a running record of its own hit rate.
pub struct HeuristicModel {
    outcomes_seen: usize,
    hits: usize,
}

impl HeuristicModel {
    pub fn new() -> Self {
        Self { outcomes_seen: 0, hits: 0 }
    }

    /// Fraction of recorded trades that ended profitable, once any exist.
    pub fn hit_rate(&self) -> Option<f64> {
        if self.outcomes_seen == 0 {
            None
        } else {
            Some(self.hits as f64 / self.outcomes_seen as f64)
        }
    }

    pub fn predict(
        &self,
        price: f64,
        indicators: &IndicatorSnapshot,
        market: &MarketSnapshot,
    ) -> Prediction {
        let technical = ((indicators.rsi - 50.0) / 50.0) * 0.05;
        let momentum = match market.trend {
            TrendDirection::Up => 0.03,
            TrendDirection::Down => -0.03,
            TrendDirection::Sideways => 0.0,
        };
        let microstructure = indicators.orderbook_pressure.unwrap_or(0.0) * 0.05;

        let edge = technical + momentum + microstructure;
        let probability = (0.5 + edge).clamp(0.05, 0.95);
        let confidence = (0.3 + edge.abs() * 4.0).clamp(0.0, 0.9);
        let risk_score = (market.volatility * 50.0).clamp(0.05, 0.9);

        let atr_pct = indicators
            .atr
            .filter(|_| price > 0.0)
            .map(|atr| atr / price * 100.0)
            .unwrap_or(0.3);

        let mut contributions = HashMap::new();
        contributions.insert("technical".to_string(), technical);
        contributions.insert("momentum".to_string(), momentum);
        contributions.insert("microstructure".to_string(), microstructure);

        Prediction {
            probability,
            confidence,
            risk_score,
            expected_return: atr_pct * 2.0,
            time_horizon_secs: 60.0,
            kelly_fraction: (edge * 2.0).clamp(0.0, 0.25),
            max_adverse_excursion: atr_pct,
            feature_contributions: contributions,
            features: FeatureScores {
                technical,
                momentum,
                volatility: market.volatility,
                microstructure,
            },
        }
    }
}

impl Default for HeuristicModel {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeSink for HeuristicModel {
    fn on_trade_outcome(&mut self, outcome: &TradeOutcome) {
        self.outcomes_seen += 1;
        if outcome.success {
            self.hits += 1;
        }
        debug!(
            seen = self.outcomes_seen,
            hits = self.hits,
            return_pct = outcome.actual_return_pct,
            "Model observed trade outcome"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{MarketRegime, VolatilityRegime};
    use rust_decimal_macros::dec;

    fn indicators(rsi: f64, pressure: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi,
            macd: 0.0,
            macd_signal: 0.0,
            vwap: 100.0,
            bollinger_middle: 100.0,
            atr: Some(0.3),
            volume_ratio: 1.0,
            orderbook_pressure: Some(pressure),
        }
    }

    fn market(trend: TrendDirection) -> MarketSnapshot {
        MarketSnapshot {
            market_regime: MarketRegime::SidewaysQuiet,
            volatility_regime: VolatilityRegime::Normal,
            liquidity_score: 0.5,
            spread_quality: 0.5,
            trend,
            volatility: 0.002,
        }
    }

    #[test]
    fn bullish_inputs_push_probability_above_half() {
        let model = HeuristicModel::new();
        let prediction = model.predict(100.0, &indicators(70.0, 0.5), &market(TrendDirection::Up));
        assert!(prediction.probability > 0.55);
        assert!(prediction.kelly_fraction > 0.0);
    }

    #[test]
    fn hit_rate_tracks_outcomes() {
        let mut model = HeuristicModel::new();
        assert_eq!(model.hit_rate(), None);

        let outcome = TradeOutcome {
            entry_price: dec!(100),
            exit_price: dec!(101),
            profit_loss: dec!(1),
            holding_secs: 10.0,
            prediction: model.predict(
                100.0,
                &indicators(60.0, 0.2),
                &market(TrendDirection::Up),
            ),
            actual_return_pct: 1.0,
            success: true,
            mfe_pct: 1.2,
            mae_pct: -0.1,
        };
        model.on_trade_outcome(&outcome);
        assert_eq!(model.hit_rate(), Some(1.0));
    }
}
