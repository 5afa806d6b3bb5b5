use core_types::{IndicatorSnapshot, MarketSnapshot, Prediction};

/// Feature contributions smaller than this are left out of the reasoning.
const CONTRIBUTION_MATERIALITY: f64 = 0.08;
/// Technical-score magnitude at which confluence language is used.
const TECHNICAL_CONFLUENCE: f64 = 0.55;
/// VWAP deviation (in percent) worth commenting on.
const VWAP_DEVIATION_PCT: f64 = 0.06;
/// Order-book pressure magnitude worth commenting on.
const ORDER_FLOW_PRESSURE: f64 = 0.20;

/// Builds the human-readable explanation attached to each emitted signal:
/// material feature contributions, technical-score language, deviation from
/// the fair-value line, order-flow commentary and the fixed liquidity/Kelly/
/// MAE annotations.
pub fn describe(
    prediction: &Prediction,
    indicators: &IndicatorSnapshot,
    market: &MarketSnapshot,
) -> String {
    let mut reasons: Vec<String> = Vec::new();

    let mut contributions: Vec<(&String, &f64)> = prediction.feature_contributions.iter().collect();
    contributions.sort_by(|a, b| a.0.cmp(b.0));
    for (feature, value) in contributions {
        if value.abs() > CONTRIBUTION_MATERIALITY {
            reasons.push(format!("{}: {:+.2}", feature, value));
        }
    }

    if prediction.features.technical > TECHNICAL_CONFLUENCE {
        reasons.push("strong technical confluence".to_string());
    } else if prediction.features.technical < -TECHNICAL_CONFLUENCE {
        reasons.push("bearish technical signals".to_string());
    }

    if indicators.vwap > 0.0 && indicators.bollinger_middle > 0.0 {
        let deviation_pct =
            (indicators.bollinger_middle - indicators.vwap) / indicators.vwap * 100.0;
        if deviation_pct.abs() > VWAP_DEVIATION_PCT {
            reasons.push(format!(
                "{} VWAP by {:.2}%",
                if deviation_pct > 0.0 { "above" } else { "below" },
                deviation_pct.abs()
            ));
        }
    }

    if let Some(pressure) = indicators.orderbook_pressure {
        if pressure.abs() > ORDER_FLOW_PRESSURE {
            reasons.push(format!(
                "{} order flow",
                if pressure > 0.0 { "bullish" } else { "bearish" }
            ));
        }
    }

    reasons.push(format!("liquidity: {:.2}", market.liquidity_score));
    reasons.push(format!("Kelly: {:.3}", prediction.kelly_fraction));
    reasons.push(format!("MAE: {:.2}%", prediction.max_adverse_excursion));

    reasons.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{FeatureScores, MarketRegime, TrendDirection, VolatilityRegime};
    use std::collections::HashMap;

    fn prediction(contributions: HashMap<String, f64>, technical: f64) -> Prediction {
        Prediction {
            probability: 0.55,
            confidence: 0.6,
            risk_score: 0.3,
            expected_return: 0.8,
            time_horizon_secs: 60.0,
            kelly_fraction: 0.12,
            max_adverse_excursion: 0.4,
            feature_contributions: contributions,
            features: FeatureScores {
                technical,
                ..FeatureScores::default()
            },
        }
    }

    fn indicators() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 55.0,
            macd: 0.2,
            macd_signal: 0.1,
            vwap: 100.0,
            bollinger_middle: 100.2,
            atr: Some(0.4),
            volume_ratio: 1.1,
            orderbook_pressure: Some(0.3),
        }
    }

    fn market() -> MarketSnapshot {
        MarketSnapshot {
            market_regime: MarketRegime::WeakBull,
            volatility_regime: VolatilityRegime::Normal,
            liquidity_score: 0.7,
            spread_quality: 0.8,
            trend: TrendDirection::Up,
            volatility: 0.01,
        }
    }

    #[test]
    fn includes_only_material_contributions() {
        let mut contributions = HashMap::new();
        contributions.insert("technical".to_string(), 0.12);
        contributions.insert("momentum".to_string(), 0.01);
        let text = describe(&prediction(contributions, 0.0), &indicators(), &market());

        assert!(text.contains("technical: +0.12"));
        assert!(!text.contains("momentum:"));
    }

    #[test]
    fn always_carries_fixed_annotations() {
        let text = describe(&prediction(HashMap::new(), 0.0), &indicators(), &market());
        assert!(text.contains("liquidity: 0.70"));
        assert!(text.contains("Kelly: 0.120"));
        assert!(text.contains("MAE: 0.40%"));
    }

    #[test]
    fn comments_on_confluence_and_order_flow() {
        let text = describe(&prediction(HashMap::new(), 0.6), &indicators(), &market());
        assert!(text.contains("strong technical confluence"));
        assert!(text.contains("bullish order flow"));
        assert!(text.contains("above VWAP"));
    }
}
