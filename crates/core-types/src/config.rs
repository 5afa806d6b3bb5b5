use crate::error::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The full configuration surface of the decision core.
///
/// Immutable within a decision cycle; replaced as a whole through
/// `TradingEngine::update_config`. Fields named `*_percentage` are percent
/// values (0.6 means 0.6%) except `profit_lock_percentage`, which is a
/// fraction of realized profit (0.6 means 60%), matching the conventions the
/// rest of the pipeline assumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Probability floor a prediction must clear before a signal is considered.
    pub min_probability: f64,
    pub min_confidence: f64,
    pub max_risk_score: f64,
    pub max_positions_per_symbol: usize,
    pub max_open_positions: usize,
    /// Hard cap on the notional of a single position, in quote currency.
    pub max_position_size: Decimal,
    /// Daily-loss circuit breaker: trading stops once |day P&L| reaches this.
    pub max_daily_loss: Decimal,
    pub stop_loss_percentage: f64,
    pub take_profit_percentage: f64,
    /// Percentage of total equity committed per position.
    pub position_size_percentage: f64,
    pub enable_profit_lock: bool,
    /// Fraction of realized profit moved into locked profits on a winning close.
    pub profit_lock_percentage: f64,
    /// Profits below this absolute threshold are not locked.
    pub min_profit_lock_threshold: Option<Decimal>,
    pub enable_trailing_stop: bool,
    pub trailing_stop_atr_multiplier: f64,
    pub enable_partial_profits: bool,
    /// Ordered profit percentages at which partial exits trigger.
    pub partial_profit_levels: Vec<f64>,
    pub min_liquidity_score: f64,
    pub min_spread_quality: f64,
    pub use_adaptive_thresholds: bool,
    pub use_dynamic_thresholds: bool,
    /// Minimum time between emitted signals; ticks arriving inside the window
    /// still update tracking and exits but never synthesize a new signal.
    pub signal_interval_ms: u64,
    pub debug_mode: bool,
    pub learning_enabled: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            min_probability: 0.40,
            min_confidence: 0.20,
            max_risk_score: 0.90,
            max_positions_per_symbol: 100,
            max_open_positions: 100,
            max_position_size: dec!(10_000),
            max_daily_loss: dec!(50),
            stop_loss_percentage: 0.6,
            take_profit_percentage: 1.5,
            position_size_percentage: 5.0,
            enable_profit_lock: true,
            profit_lock_percentage: 0.6,
            min_profit_lock_threshold: Some(dec!(0.2)),
            enable_trailing_stop: true,
            trailing_stop_atr_multiplier: 1.5,
            enable_partial_profits: true,
            partial_profit_levels: vec![0.6, 1.2],
            min_liquidity_score: 0.005,
            min_spread_quality: 0.02,
            use_adaptive_thresholds: true,
            use_dynamic_thresholds: true,
            signal_interval_ms: 500,
            debug_mode: false,
            learning_enabled: true,
        }
    }
}

impl TradingConfig {
    /// Sanity-checks the configuration before it is handed to the engine.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_probability) {
            return Err(Error::InvalidConfig(format!(
                "min_probability must be within [0, 1], got {}",
                self.min_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.profit_lock_percentage) {
            return Err(Error::InvalidConfig(format!(
                "profit_lock_percentage is a fraction and must be within [0, 1], got {}",
                self.profit_lock_percentage
            )));
        }
        if self.max_position_size <= Decimal::ZERO {
            return Err(Error::InvalidConfig(
                "max_position_size must be positive".to_string(),
            ));
        }
        if self.position_size_percentage <= 0.0 || self.position_size_percentage > 100.0 {
            return Err(Error::InvalidConfig(format!(
                "position_size_percentage must be within (0, 100], got {}",
                self.position_size_percentage
            )));
        }
        if self
            .partial_profit_levels
            .windows(2)
            .any(|pair| pair[1] <= pair[0])
        {
            return Err(Error::InvalidConfig(
                "partial_profit_levels must be strictly ascending".to_string(),
            ));
        }
        if self.partial_profit_levels.iter().any(|level| *level <= 0.0) {
            return Err(Error::InvalidConfig(
                "partial_profit_levels must be positive percentages".to_string(),
            ));
        }
        if self.signal_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "signal_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TradingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unordered_partial_levels() {
        let config = TradingConfig {
            partial_profit_levels: vec![1.2, 0.6],
            ..TradingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let config = TradingConfig {
            min_probability: 1.5,
            ..TradingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
