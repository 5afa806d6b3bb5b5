use crate::error::Result;
use crate::types::{MarketDataPoint, TradeRecord};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Persistence seam for the ledger. The ledger treats the store as a dumb
/// snapshot sink: it always writes the full retained window.
pub trait LedgerStore: Send {
    fn load_trades(&self) -> Result<Vec<TradeRecord>>;
    fn save_trades(&mut self, trades: &[TradeRecord]) -> Result<()>;
    fn load_market_data(&self) -> Result<Vec<MarketDataPoint>>;
    fn save_market_data(&mut self, points: &[MarketDataPoint]) -> Result<()>;
}

/// File-backed store: two plain JSON arrays, one per dataset. A missing file
/// reads as an empty history rather than an error, so first runs start clean.
pub struct JsonFileStore {
    trades_path: PathBuf,
    market_data_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(trades_path: impl Into<PathBuf>, market_data_path: impl Into<PathBuf>) -> Self {
        Self {
            trades_path: trades_path.into(),
            market_data_path: market_data_path.into(),
        }
    }

    fn read_array<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_array<T: serde::Serialize>(path: &PathBuf, items: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(items)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load_trades(&self) -> Result<Vec<TradeRecord>> {
        let trades = Self::read_array(&self.trades_path)?;
        info!(count = trades.len(), path = %self.trades_path.display(), "Loaded trade history");
        Ok(trades)
    }

    fn save_trades(&mut self, trades: &[TradeRecord]) -> Result<()> {
        Self::write_array(&self.trades_path, trades)
    }

    fn load_market_data(&self) -> Result<Vec<MarketDataPoint>> {
        Self::read_array(&self.market_data_path)
    }

    fn save_market_data(&mut self, points: &[MarketDataPoint]) -> Result<()> {
        Self::write_array(&self.market_data_path, points)
    }
}

/// In-memory no-op store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct NullStore;

impl LedgerStore for NullStore {
    fn load_trades(&self) -> Result<Vec<TradeRecord>> {
        Ok(Vec::new())
    }

    fn save_trades(&mut self, _trades: &[TradeRecord]) -> Result<()> {
        Ok(())
    }

    fn load_market_data(&self) -> Result<Vec<MarketDataPoint>> {
        Ok(Vec::new())
    }

    fn save_market_data(&mut self, _points: &[MarketDataPoint]) -> Result<()> {
        Ok(())
    }
}
