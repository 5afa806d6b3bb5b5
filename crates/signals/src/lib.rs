use chrono::Utc;
use core_types::{
    IndicatorSnapshot, MarketSnapshot, Portfolio, Prediction, Symbol, SignalAction, TradingConfig,
    TradingSignal, VolatilityRegime,
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::{Duration, Instant};
use tracing::debug;

pub mod reasoning;
pub mod thresholds;

pub use thresholds::Thresholds;

/// Probability must exceed this for the primary BUY rule (and fall below the
/// mirrored value for SELL).
const PRIMARY_PROBABILITY_EDGE: f64 = 0.501;
/// Combined-bias magnitude required by the primary direction rule.
const PRIMARY_BIAS_EDGE: f64 = 0.02;
/// Confidence above which the high-confidence fallback applies.
const FALLBACK_CONFIDENCE: f64 = 0.7;
/// Probability bound for the high-confidence fallback (0.52 BUY / 0.48 SELL).
const FALLBACK_PROBABILITY_EDGE: f64 = 0.52;
/// Bias magnitude for the high-volatility fallback.
const VOLATILITY_BIAS_EDGE: f64 = 0.015;
/// Fraction of the available balance a signal may commit, leaving headroom
/// for fees and slippage.
const BALANCE_USAGE_CAP: Decimal = dec!(0.99);

/// Everything the synthesizer needs for one decision cycle. All references;
/// the synthesizer never holds market state between calls except the
/// rate-limit clock.
pub struct SignalContext<'a> {
    pub symbol: &'a Symbol,
    pub price: Decimal,
    pub indicators: &'a IndicatorSnapshot,
    pub market: &'a MarketSnapshot,
    pub prediction: &'a Prediction,
    /// Top-of-book order-book imbalance, used when the indicator snapshot
    /// carries no order-book pressure of its own.
    pub book_imbalance: f64,
    pub portfolio: &'a Portfolio,
    /// Model-supplied threshold override, honored when the config enables
    /// dynamic or adaptive thresholds.
    pub model_thresholds: Option<Thresholds>,
}

/// Why no signal was emitted this cycle. A suppressed cycle is an expected
/// outcome, surfaced as an observable event, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Suppression {
    RateLimited { remaining_ms: u64 },
    LimitsNotMet { failed: Vec<String> },
    NoDirection { probability: f64, bias: f64, confidence: f64 },
    InvalidPrice,
    InsufficientEquity,
}

impl std::fmt::Display for Suppression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Suppression::RateLimited { remaining_ms } => {
                write!(f, "rate limited, {remaining_ms}ms remaining")
            }
            Suppression::LimitsNotMet { failed } => {
                write!(f, "limits not met: {}", failed.join(", "))
            }
            Suppression::NoDirection { probability, bias, confidence } => write!(
                f,
                "no clear direction (probability {probability:.3}, bias {bias:.3}, confidence {confidence:.3})"
            ),
            Suppression::InvalidPrice => write!(f, "invalid mark price"),
            Suppression::InsufficientEquity => write!(f, "insufficient equity to size a position"),
        }
    }
}

/// The outcome of a synthesis cycle.
#[derive(Debug, Clone)]
pub enum Synthesis {
    Signal(TradingSignal),
    Suppressed(Suppression),
}

/// Turns a prediction plus indicator/market snapshots into at most one sized,
/// directional signal per rate-limit window.
///
/// The rate limiter advances only on emission: a suppressed cycle leaves the
/// window open for the next tick.
#[derive(Debug, Default)]
pub struct SignalSynthesizer {
    last_emission: Option<Instant>,
}

impl SignalSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthesize(&mut self, ctx: &SignalContext<'_>, config: &TradingConfig) -> Synthesis {
        // --- 1. Rate limit on a monotonic clock ---
        let window = Duration::from_millis(config.signal_interval_ms);
        if let Some(last) = self.last_emission {
            let elapsed = last.elapsed();
            if elapsed < window {
                let remaining = window - elapsed;
                return Synthesis::Suppressed(Suppression::RateLimited {
                    remaining_ms: remaining.as_millis() as u64,
                });
            }
        }

        if ctx.price <= Decimal::ZERO {
            return Synthesis::Suppressed(Suppression::InvalidPrice);
        }

        // --- 2. Regime/liquidity-adjusted thresholds ---
        let base = match ctx.model_thresholds {
            Some(model) if config.use_dynamic_thresholds || config.use_adaptive_thresholds => model,
            _ => Thresholds::from_config(config),
        };
        let limits = thresholds::adjusted(base, ctx.market);

        // --- 3. Entry gating ---
        if let Some(failed) = self.failed_limits(ctx, &limits, config) {
            return Synthesis::Suppressed(Suppression::LimitsNotMet { failed });
        }

        // --- 4. Direction classification ---
        let bias = self.combined_bias(ctx);
        let Some(action) = self.classify(ctx.prediction, ctx.market, bias) else {
            return Synthesis::Suppressed(Suppression::NoDirection {
                probability: ctx.prediction.probability,
                bias,
                confidence: ctx.prediction.confidence,
            });
        };

        // --- 5. Sizing ---
        let Some(quantity) = self.size(ctx.price, ctx.portfolio, config) else {
            return Synthesis::Suppressed(Suppression::InsufficientEquity);
        };

        // --- 6. Protective prices and reasoning ---
        let (take_profit, stop_loss) = self.protective_prices(ctx.price, action, config);
        let reasoning = reasoning::describe(ctx.prediction, ctx.indicators, ctx.market);

        let signal = TradingSignal {
            symbol: ctx.symbol.clone(),
            action,
            confidence: ctx.prediction.confidence,
            price: ctx.price,
            quantity,
            take_profit,
            stop_loss,
            expected_return: ctx.prediction.expected_return,
            risk_score: ctx.prediction.risk_score,
            time_horizon_secs: ctx.prediction.time_horizon_secs,
            timestamp: Utc::now(),
            reasoning,
            indicators: ctx.indicators.clone(),
            market: ctx.market.clone(),
        };

        self.last_emission = Some(Instant::now());
        Synthesis::Signal(signal)
    }

    fn failed_limits(
        &self,
        ctx: &SignalContext<'_>,
        limits: &Thresholds,
        config: &TradingConfig,
    ) -> Option<Vec<String>> {
        let prediction = ctx.prediction;
        let market = ctx.market;
        let open_for_symbol = ctx.portfolio.open_position_count_for(ctx.symbol);
        let mut failed = Vec::new();

        if prediction.probability < limits.min_probability {
            failed.push(format!(
                "probability {:.3} < {:.3}",
                prediction.probability, limits.min_probability
            ));
        }
        if prediction.confidence < limits.min_confidence {
            failed.push(format!(
                "confidence {:.3} < {:.3}",
                prediction.confidence, limits.min_confidence
            ));
        }
        if prediction.risk_score > limits.max_risk_score {
            failed.push(format!(
                "risk {:.3} > {:.3}",
                prediction.risk_score, limits.max_risk_score
            ));
        }
        if open_for_symbol >= config.max_positions_per_symbol {
            failed.push(format!(
                "symbol positions {} >= {}",
                open_for_symbol, config.max_positions_per_symbol
            ));
        }
        if market.liquidity_score < config.min_liquidity_score {
            failed.push(format!(
                "liquidity {:.3} < {:.3}",
                market.liquidity_score, config.min_liquidity_score
            ));
        }
        if market.spread_quality < config.min_spread_quality {
            failed.push(format!(
                "spread quality {:.3} < {:.3}",
                market.spread_quality, config.min_spread_quality
            ));
        }

        if config.debug_mode && !failed.is_empty() {
            debug!(symbol = %ctx.symbol, ?failed, "Signal gating failed");
        }

        if failed.is_empty() { None } else { Some(failed) }
    }

    /// Combined directional bias: technical and momentum contributions, the
    /// deviation from the VWAP fair-value line (half weight) and order-book
    /// pressure (0.3 weight). Falls back to the live book imbalance when the
    /// indicator engine supplies no pressure reading.
    fn combined_bias(&self, ctx: &SignalContext<'_>) -> f64 {
        let price = ctx.price.to_f64().unwrap_or(0.0);
        let indicators = ctx.indicators;

        let vwap_signal = if indicators.vwap > 0.0 {
            (price - indicators.vwap) / indicators.vwap
        } else {
            0.0
        };
        let book_pressure = indicators.orderbook_pressure.unwrap_or(ctx.book_imbalance);

        let contributions = &ctx.prediction.feature_contributions;
        let technical = contributions.get("technical").copied().unwrap_or(0.0);
        let momentum = contributions.get("momentum").copied().unwrap_or(0.0);

        technical + momentum + vwap_signal * 0.5 + book_pressure * 0.3
    }

    /// Primary rule, then the high-confidence fallback, then the
    /// high-volatility fallback; anything else is HOLD (no signal).
    fn classify(
        &self,
        prediction: &Prediction,
        market: &MarketSnapshot,
        bias: f64,
    ) -> Option<SignalAction> {
        if prediction.probability > PRIMARY_PROBABILITY_EDGE && bias > PRIMARY_BIAS_EDGE {
            return Some(SignalAction::Buy);
        }
        if prediction.probability < 1.0 - PRIMARY_PROBABILITY_EDGE && bias < -PRIMARY_BIAS_EDGE {
            return Some(SignalAction::Sell);
        }
        if prediction.confidence > FALLBACK_CONFIDENCE {
            if prediction.probability >= FALLBACK_PROBABILITY_EDGE {
                return Some(SignalAction::Buy);
            }
            if prediction.probability <= 1.0 - FALLBACK_PROBABILITY_EDGE {
                return Some(SignalAction::Sell);
            }
        }
        if market.volatility_regime == VolatilityRegime::High && bias.abs() > VOLATILITY_BIAS_EDGE {
            return Some(if bias > 0.0 { SignalAction::Buy } else { SignalAction::Sell });
        }
        None
    }

    /// Sizes the order as a fixed percentage of total equity, capped by the
    /// configured maximum position size and by 99% of the available balance.
    fn size(&self, price: Decimal, portfolio: &Portfolio, config: &TradingConfig) -> Option<Decimal> {
        let size_fraction = Decimal::from_f64(config.position_size_percentage / 100.0)
            .unwrap_or(Decimal::ZERO);
        let mut notional = portfolio.equity * size_fraction;
        if notional > config.max_position_size {
            notional = config.max_position_size;
        }

        let quantity = notional / price;
        let balance_cap = portfolio.available_balance * BALANCE_USAGE_CAP / price;
        let quantity = quantity.min(balance_cap).round_dp(8);

        if quantity > Decimal::ZERO { Some(quantity) } else { None }
    }

    fn protective_prices(
        &self,
        price: Decimal,
        action: SignalAction,
        config: &TradingConfig,
    ) -> (Decimal, Decimal) {
        let tp_fraction =
            Decimal::from_f64(config.take_profit_percentage / 100.0).unwrap_or(Decimal::ZERO);
        let sl_fraction =
            Decimal::from_f64(config.stop_loss_percentage / 100.0).unwrap_or(Decimal::ZERO);

        match action {
            SignalAction::Buy => (
                price * (Decimal::ONE + tp_fraction),
                price * (Decimal::ONE - sl_fraction),
            ),
            SignalAction::Sell => (
                price * (Decimal::ONE - tp_fraction),
                price * (Decimal::ONE + sl_fraction),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{FeatureScores, MarketRegime, TrendDirection};
    use std::collections::HashMap;

    fn symbol() -> Symbol {
        Symbol("BTCUSDT".to_string())
    }

    fn indicators() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 55.0,
            macd: 0.2,
            macd_signal: 0.1,
            vwap: 100.0,
            bollinger_middle: 100.0,
            atr: Some(0.4),
            volume_ratio: 1.2,
            orderbook_pressure: Some(0.1),
        }
    }

    fn market() -> MarketSnapshot {
        MarketSnapshot {
            market_regime: MarketRegime::WeakBull,
            volatility_regime: VolatilityRegime::Normal,
            liquidity_score: 0.6,
            spread_quality: 0.7,
            trend: TrendDirection::Up,
            volatility: 0.01,
        }
    }

    fn bullish_prediction() -> Prediction {
        let mut contributions = HashMap::new();
        contributions.insert("technical".to_string(), 0.05);
        contributions.insert("momentum".to_string(), 0.03);
        Prediction {
            probability: 0.58,
            confidence: 0.5,
            risk_score: 0.3,
            expected_return: 0.9,
            time_horizon_secs: 60.0,
            kelly_fraction: 0.1,
            max_adverse_excursion: 0.5,
            feature_contributions: contributions,
            features: FeatureScores::default(),
        }
    }

    fn context<'a>(
        sym: &'a Symbol,
        prediction: &'a Prediction,
        ind: &'a IndicatorSnapshot,
        mkt: &'a MarketSnapshot,
        portfolio: &'a Portfolio,
    ) -> SignalContext<'a> {
        SignalContext {
            symbol: sym,
            price: dec!(100),
            indicators: ind,
            market: mkt,
            prediction,
            book_imbalance: 0.0,
            portfolio,
            model_thresholds: None,
        }
    }

    #[test]
    fn emits_buy_signal_for_bullish_prediction() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let prediction = bullish_prediction();
        let ind = indicators();
        let mkt = market();
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        match synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config) {
            Synthesis::Signal(signal) => {
                assert_eq!(signal.action, SignalAction::Buy);
                // 5% of 10k equity at price 100.
                assert_eq!(signal.quantity, dec!(5));
                assert_eq!(signal.take_profit, dec!(101.5));
                assert_eq!(signal.stop_loss, dec!(99.4));
                assert!(!signal.reasoning.is_empty());
            }
            Synthesis::Suppressed(s) => panic!("expected signal, got {s}"),
        }
    }

    #[test]
    fn two_ticks_inside_window_emit_once() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let prediction = bullish_prediction();
        let ind = indicators();
        let mkt = market();
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        let first =
            synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config);
        assert!(matches!(first, Synthesis::Signal(_)));

        let second =
            synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config);
        assert!(matches!(
            second,
            Synthesis::Suppressed(Suppression::RateLimited { .. })
        ));
    }

    #[test]
    fn suppressed_cycle_does_not_advance_the_rate_limiter() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let mut prediction = bullish_prediction();
        prediction.confidence = 0.0; // Fails the confidence floor.
        let ind = indicators();
        let mkt = market();
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        let first =
            synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config);
        assert!(matches!(
            first,
            Synthesis::Suppressed(Suppression::LimitsNotMet { .. })
        ));

        // A valid prediction right after must not be rate limited.
        let prediction = bullish_prediction();
        let second =
            synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config);
        assert!(matches!(second, Synthesis::Signal(_)));
    }

    #[test]
    fn low_liquidity_suppresses_emission() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let prediction = bullish_prediction();
        let ind = indicators();
        let mut mkt = market();
        mkt.liquidity_score = 0.001;
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        match synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config) {
            Synthesis::Suppressed(Suppression::LimitsNotMet { failed }) => {
                assert!(failed.iter().any(|f| f.contains("liquidity")));
            }
            other => panic!("expected liquidity suppression, got {other:?}"),
        }
    }

    #[test]
    fn neutral_prediction_holds() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let mut prediction = bullish_prediction();
        prediction.probability = 0.5;
        prediction.confidence = 0.5;
        prediction.feature_contributions.clear();
        let mut ind = indicators();
        ind.orderbook_pressure = None;
        let mkt = market();
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        assert!(matches!(
            synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config),
            Synthesis::Suppressed(Suppression::NoDirection { .. })
        ));
    }

    #[test]
    fn high_confidence_fallback_sells_below_edge() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let mut prediction = bullish_prediction();
        prediction.probability = 0.47;
        prediction.confidence = 0.8;
        prediction.feature_contributions.clear();
        let mut ind = indicators();
        ind.orderbook_pressure = None;
        let mkt = market();
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        match synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config) {
            Synthesis::Signal(signal) => assert_eq!(signal.action, SignalAction::Sell),
            other => panic!("expected sell fallback, got {other:?}"),
        }
    }

    #[test]
    fn volatility_fallback_follows_bias() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let mut prediction = bullish_prediction();
        prediction.probability = 0.5;
        prediction.confidence = 0.5;
        prediction
            .feature_contributions
            .insert("technical".to_string(), -0.02);
        prediction
            .feature_contributions
            .insert("momentum".to_string(), 0.0);
        let mut ind = indicators();
        ind.orderbook_pressure = None;
        let mut mkt = market();
        mkt.volatility_regime = VolatilityRegime::High;
        let portfolio = Portfolio::new(dec!(10_000));
        let config = TradingConfig::default();

        match synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config) {
            Synthesis::Signal(signal) => assert_eq!(signal.action, SignalAction::Sell),
            other => panic!("expected volatility fallback, got {other:?}"),
        }
    }

    #[test]
    fn neutral_pressure_reading_is_not_treated_as_missing() {
        let synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let mut prediction = bullish_prediction();
        prediction.feature_contributions.clear();
        let mkt = market();
        let portfolio = Portfolio::new(dec!(10_000));

        // Absent pressure falls back to the live book imbalance.
        let mut absent = indicators();
        absent.orderbook_pressure = None;
        let mut ctx = context(&sym, &prediction, &absent, &mkt, &portfolio);
        ctx.book_imbalance = 0.4;
        assert!((synthesizer.combined_bias(&ctx) - 0.12).abs() < 1e-9);

        // A present 0.0 is a real neutral reading and is used as-is.
        let mut neutral = indicators();
        neutral.orderbook_pressure = Some(0.0);
        let mut ctx = context(&sym, &prediction, &neutral, &mkt, &portfolio);
        ctx.book_imbalance = 0.4;
        assert!(synthesizer.combined_bias(&ctx).abs() < 1e-9);
    }

    #[test]
    fn quantity_capped_by_available_balance() {
        let mut synthesizer = SignalSynthesizer::new();
        let sym = symbol();
        let prediction = bullish_prediction();
        let ind = indicators();
        let mkt = market();
        // Equity far above available balance: most capital locked elsewhere.
        let mut portfolio = Portfolio::new(dec!(10_000));
        portfolio.available_balance = dec!(100);
        portfolio.equity = dec!(10_000);
        let config = TradingConfig::default();

        match synthesizer.synthesize(&context(&sym, &prediction, &ind, &mkt, &portfolio), &config) {
            Synthesis::Signal(signal) => {
                // 5% of equity would be 5 units; 99% of balance allows 0.99.
                assert_eq!(signal.quantity, dec!(0.99));
                assert!(signal.notional() <= portfolio.available_balance);
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }
}
