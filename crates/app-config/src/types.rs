use core_types::TradingConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    #[serde(default)]
    pub app: AppSettings,
    /// The engine's run parameters.
    #[serde(default)]
    pub engine: EngineSettings,
    /// The live trading limits and toggles.
    #[serde(default)]
    pub trading: TradingConfig,
    /// Persistence locations for the trade ledger.
    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings::default(),
            engine: EngineSettings::default(),
            trading: TradingConfig::default(),
            ledger: LedgerSettings::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineSettings {
    /// The symbol the engine trades.
    pub symbol: String,
    /// Starting capital for the portfolio.
    pub initial_capital: Decimal,
    /// Seed for the synthetic feed, so runs are reproducible.
    pub feed_seed: u64,
    /// Starting price for the synthetic feed.
    pub start_price: Decimal,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            initial_capital: dec!(10_000),
            feed_seed: 42,
            start_price: dec!(65_000),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LedgerSettings {
    /// Whether the ledger persists to disk at all.
    pub persist: bool,
    pub trades_path: String,
    pub market_data_path: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            persist: true,
            trades_path: "data/trades.json".to_string(),
            market_data_path: "data/market_data.json".to_string(),
        }
    }
}
