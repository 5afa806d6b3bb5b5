use core_types::{MarketRegime, MarketSnapshot, TradingConfig};

/// Hard floor the probability threshold can never be relaxed below.
pub const PROBABILITY_FLOOR: f64 = 0.35;
/// Hard floor for the confidence threshold.
pub const CONFIDENCE_FLOOR: f64 = 0.15;
/// Hard ceiling for the risk-score threshold.
pub const RISK_CEILING: f64 = 0.95;

/// Sensitivity of the probability threshold to the liquidity score.
const LIQUIDITY_SENSITIVITY: f64 = 0.035;

/// The effective entry thresholds for one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_probability: f64,
    pub min_confidence: f64,
    pub max_risk_score: f64,
}

impl Thresholds {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            min_probability: config.min_probability,
            min_confidence: config.min_confidence,
            max_risk_score: config.max_risk_score,
        }
    }
}

/// Adapts the base thresholds to the current market regime and liquidity.
///
/// Trending regimes relax the probability/confidence floors and raise the
/// risk ceiling; choppy or quiet regimes tighten them. On top of the regime
/// step, a continuous term proportional to `(liquidity_score - 0.5)` shifts
/// the probability floor. The result is clamped to the hard bounds above so
/// no amount of adjustment can make the synthesizer reckless.
pub fn adjusted(base: Thresholds, market: &MarketSnapshot) -> Thresholds {
    let (probability_delta, confidence_delta, risk_delta) = match market.market_regime {
        MarketRegime::StrongBull | MarketRegime::StrongBear => (-0.02, -0.03, 0.06),
        MarketRegime::WeakBull | MarketRegime::WeakBear => (-0.015, -0.02, 0.0),
        MarketRegime::SidewaysVolatile => (0.015, 0.025, -0.05),
        MarketRegime::SidewaysQuiet => (0.01, 0.015, -0.03),
    };

    let liquidity_delta = (market.liquidity_score - 0.5) * LIQUIDITY_SENSITIVITY;

    Thresholds {
        min_probability: (base.min_probability + probability_delta + liquidity_delta)
            .max(PROBABILITY_FLOOR),
        min_confidence: (base.min_confidence + confidence_delta).max(CONFIDENCE_FLOOR),
        max_risk_score: (base.max_risk_score + risk_delta).min(RISK_CEILING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{TrendDirection, VolatilityRegime};

    fn market(regime: MarketRegime, liquidity: f64) -> MarketSnapshot {
        MarketSnapshot {
            market_regime: regime,
            volatility_regime: VolatilityRegime::Normal,
            liquidity_score: liquidity,
            spread_quality: 0.5,
            trend: TrendDirection::Sideways,
            volatility: 0.01,
        }
    }

    #[test]
    fn trending_regimes_relax_thresholds() {
        let base = Thresholds {
            min_probability: 0.40,
            min_confidence: 0.20,
            max_risk_score: 0.90,
        };
        let adjusted = adjusted(base, &market(MarketRegime::StrongBull, 0.5));
        assert!(adjusted.min_probability < base.min_probability);
        assert!(adjusted.min_confidence < base.min_confidence);
        assert!(adjusted.max_risk_score > base.max_risk_score);
    }

    #[test]
    fn quiet_regimes_tighten_thresholds() {
        let base = Thresholds {
            min_probability: 0.40,
            min_confidence: 0.20,
            max_risk_score: 0.90,
        };
        let adjusted = adjusted(base, &market(MarketRegime::SidewaysQuiet, 0.5));
        assert!(adjusted.min_probability > base.min_probability);
        assert!(adjusted.max_risk_score < base.max_risk_score);
    }

    #[test]
    fn probability_threshold_scales_with_liquidity() {
        let base = Thresholds {
            min_probability: 0.40,
            min_confidence: 0.20,
            max_risk_score: 0.90,
        };
        // (liquidity - 0.5) * 0.035 is a signed term: deep books demand more
        // edge, thin books relax toward the hard floor.
        let deep = adjusted(base, &market(MarketRegime::WeakBull, 1.0));
        let thin = adjusted(base, &market(MarketRegime::WeakBull, 0.0));
        assert!(deep.min_probability > thin.min_probability);
        assert!((deep.min_probability - (0.40 - 0.015 + 0.0175)).abs() < 1e-9);
    }

    #[test]
    fn adjustment_respects_hard_bounds() {
        let base = Thresholds {
            min_probability: 0.36,
            min_confidence: 0.16,
            max_risk_score: 0.94,
        };
        let adjusted = adjusted(base, &market(MarketRegime::StrongBull, 0.0));
        assert!(adjusted.min_probability >= PROBABILITY_FLOOR);
        assert!(adjusted.min_confidence >= CONFIDENCE_FLOOR);
        assert!(adjusted.max_risk_score <= RISK_CEILING);
    }
}
