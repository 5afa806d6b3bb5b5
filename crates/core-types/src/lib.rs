pub mod config;
pub mod error;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use config::TradingConfig;
pub use error::{Error, Result};
pub use types::{
    BookLevel, BookTick, FeatureScores, IndicatorSnapshot, MarketRegime, MarketSnapshot, Position,
    PositionId, PositionStatus, Portfolio, Prediction, Side, SignalAction, Symbol, TradingSignal,
    TrendDirection, VolatilityRegime,
};
