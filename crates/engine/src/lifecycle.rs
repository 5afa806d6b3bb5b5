use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use core_types::{
    IndicatorSnapshot, MarketSnapshot, Portfolio, Position, PositionId, PositionStatus,
    Prediction, Side, Symbol, TradingConfig, TradingSignal,
};
use risk::{OrderCandidate, RiskCheck, RiskDecision, RiskPolicy};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, info};

/// Favorable price change (as a fraction of entry) that arms the trailing
/// stop.
pub(crate) const TRAILING_ACTIVATION: f64 = 0.002;
/// Trailing distance as a fraction of price when no ATR reading exists.
const TRAILING_FALLBACK_DISTANCE: Decimal = dec!(0.003);
/// The stop is never placed worse than this buffer beyond entry, so an armed
/// trail always locks in at least a token profit.
const TRAILING_ENTRY_BUFFER: Decimal = dec!(0.001);

/// Per-position state that is not part of the position itself: the entry-time
/// snapshots frozen for the eventual trade record, excursion extremes, the
/// trailing stop and the partial-exit ladder progress.
#[derive(Debug, Clone)]
pub struct PositionTracking {
    pub prediction: Prediction,
    pub indicators_at_entry: IndicatorSnapshot,
    pub market_at_entry: MarketSnapshot,
    pub opened_at: DateTime<Utc>,
    /// Best favorable excursion seen so far, as a fraction of entry (>= 0).
    pub mfe: f64,
    /// Worst adverse excursion seen so far, as a fraction of entry (<= 0).
    pub mae: f64,
    pub trailing_stop: Option<Decimal>,
    pub partial_exits_taken: usize,
}

impl PositionTracking {
    fn at_entry(signal: &TradingSignal, prediction: Prediction) -> Self {
        Self {
            prediction,
            indicators_at_entry: signal.indicators.clone(),
            market_at_entry: signal.market.clone(),
            opened_at: Utc::now(),
            mfe: 0.0,
            mae: 0.0,
            trailing_stop: None,
            partial_exits_taken: 0,
        }
    }
}

/// The result of asking the book to open a position.
#[derive(Debug)]
pub enum OpenOutcome {
    Opened(Position),
    Rejected(Vec<RiskCheck>),
}

/// A fully closed position together with the tracking state it accumulated,
/// handed back for recording.
#[derive(Debug)]
pub struct ClosedTrade {
    pub position: Position,
    pub tracking: PositionTracking,
    pub realized_pnl: Decimal,
}

/// Owns the portfolio and all open-position state. Every mutation goes
/// through here so the portfolio's derived fields are recomputed exactly
/// once per change.
pub struct PositionBook {
    portfolio: Portfolio,
    tracking: HashMap<PositionId, PositionTracking>,
    next_id: PositionId,
    gate: Box<dyn RiskPolicy>,
}

impl PositionBook {
    pub fn new(base_capital: Decimal, gate: Box<dyn RiskPolicy>) -> Self {
        Self {
            portfolio: Portfolio::new(base_capital),
            tracking: HashMap::new(),
            next_id: 1,
            gate,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn open_ids(&self, symbol: &Symbol) -> Vec<PositionId> {
        self.portfolio
            .positions
            .iter()
            .filter(|p| p.is_open() && &p.symbol == symbol)
            .map(|p| p.id)
            .collect()
    }

    pub fn position_with_tracking(&self, id: PositionId) -> Result<(&Position, &PositionTracking)> {
        let position = self
            .portfolio
            .positions
            .iter()
            .find(|p| p.id == id && p.is_open())
            .ok_or(Error::UnknownPosition(id))?;
        let tracking = self.tracking.get(&id).ok_or(Error::UnknownPosition(id))?;
        Ok((position, tracking))
    }

    /// Runs the signal through the risk gate and, if admitted, opens the
    /// position at the signal's price.
    pub fn open(
        &mut self,
        signal: &TradingSignal,
        prediction: Prediction,
        config: &TradingConfig,
    ) -> OpenOutcome {
        let candidate = OrderCandidate {
            symbol: signal.symbol.clone(),
            notional: signal.notional(),
        };
        if let RiskDecision::Rejected(checks) = self.gate.assess(&candidate, &self.portfolio, config)
        {
            return OpenOutcome::Rejected(checks);
        }

        let id = self.next_id;
        self.next_id += 1;

        let position = Position {
            id,
            symbol: signal.symbol.clone(),
            side: signal.action.side(),
            quantity: signal.quantity,
            entry_price: signal.price,
            current_price: signal.price,
            status: PositionStatus::Open,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            opened_at: Utc::now(),
            closed_at: None,
        };
        info!(
            id,
            symbol = %position.symbol,
            side = %position.side,
            quantity = %position.quantity,
            entry = %position.entry_price,
            "Opened position"
        );

        self.tracking.insert(id, PositionTracking::at_entry(signal, prediction));
        self.portfolio.positions.push(position.clone());
        self.portfolio.revalue();
        OpenOutcome::Opened(position)
    }

    /// Marks every open position of `symbol` to `price` and refreshes the
    /// portfolio's derived fields.
    pub fn update_prices(&mut self, symbol: &Symbol, price: Decimal) {
        for position in self.portfolio.positions.iter_mut() {
            if position.is_open() && &position.symbol == symbol {
                position.current_price = price;
            }
        }
        self.portfolio.revalue();
    }

    /// Advances a position's excursion extremes and trailing stop for the
    /// current price. `atr` is the latest absolute ATR reading, if any.
    pub fn refresh_tracking(
        &mut self,
        id: PositionId,
        price: Decimal,
        atr: Option<f64>,
        config: &TradingConfig,
    ) -> Result<()> {
        let position = self
            .portfolio
            .positions
            .iter()
            .find(|p| p.id == id && p.is_open())
            .ok_or(Error::UnknownPosition(id))?;
        let tracking = self.tracking.get_mut(&id).ok_or(Error::UnknownPosition(id))?;

        let change = position.price_change(price).to_f64().unwrap_or(0.0);
        tracking.mfe = tracking.mfe.max(change.max(0.0));
        tracking.mae = tracking.mae.min(change.min(0.0));

        if !config.enable_trailing_stop || change.abs() <= TRAILING_ACTIVATION {
            return Ok(());
        }

        let distance = match atr {
            Some(atr) if atr > 0.0 => {
                Decimal::from_f64(atr * config.trailing_stop_atr_multiplier)
                    .unwrap_or(Decimal::ZERO)
            }
            _ => price * TRAILING_FALLBACK_DISTANCE,
        };
        let buffer = position.entry_price * TRAILING_ENTRY_BUFFER;

        // The stop only ever ratchets in the favorable direction.
        let stop = match position.side {
            Side::Long => {
                let candidate = (price - distance).max(position.entry_price + buffer);
                tracking.trailing_stop.map_or(candidate, |s| s.max(candidate))
            }
            Side::Short => {
                let candidate = (price + distance).min(position.entry_price - buffer);
                tracking.trailing_stop.map_or(candidate, |s| s.min(candidate))
            }
        };
        tracking.trailing_stop = Some(stop);
        Ok(())
    }

    /// Shrinks an open position by `quantity` without booking realized P&L;
    /// the freed notional flows back to the available balance on revaluation.
    pub fn partial_exit(&mut self, id: PositionId, quantity: Decimal, price: Decimal) -> Result<()> {
        let position = self
            .portfolio
            .positions
            .iter_mut()
            .find(|p| p.id == id && p.is_open())
            .ok_or(Error::UnknownPosition(id))?;
        let tracking = self.tracking.get_mut(&id).ok_or(Error::UnknownPosition(id))?;

        position.quantity = (position.quantity - quantity).max(Decimal::ZERO);
        position.current_price = price;
        tracking.partial_exits_taken += 1;
        debug!(id, quantity = %quantity, remaining = %position.quantity, "Partial exit");

        self.portfolio.revalue();
        Ok(())
    }

    /// Closes a position at `price`, books realized P&L into the portfolio
    /// (locking a slice of profits when configured) and returns the closed
    /// snapshot for recording.
    pub fn full_exit(
        &mut self,
        id: PositionId,
        price: Decimal,
        config: &TradingConfig,
    ) -> Result<ClosedTrade> {
        let index = self
            .portfolio
            .positions
            .iter()
            .position(|p| p.id == id && p.is_open())
            .ok_or(Error::UnknownPosition(id))?;
        let tracking = self.tracking.remove(&id).ok_or(Error::UnknownPosition(id))?;

        let mut position = self.portfolio.positions.remove(index);
        let realized = position.side.sign() * (price - position.entry_price) * position.quantity;

        position.current_price = price;
        position.realized_pnl = realized;
        position.unrealized_pnl = Decimal::ZERO;
        position.status = PositionStatus::Closed;
        position.closed_at = Some(Utc::now());

        if config.enable_profit_lock && realized > Decimal::ZERO {
            let above_threshold = config
                .min_profit_lock_threshold
                .map_or(true, |t| realized >= t);
            if above_threshold {
                let fraction =
                    Decimal::from_f64(config.profit_lock_percentage).unwrap_or(Decimal::ZERO);
                self.portfolio.locked_profits += realized * fraction;
            }
        }

        self.portfolio.total_pnl += realized;
        self.portfolio.day_pnl += realized;
        self.portfolio.revalue();
        info!(
            id,
            symbol = %position.symbol,
            exit = %price,
            realized = %realized,
            "Closed position"
        );

        Ok(ClosedTrade { position, tracking, realized_pnl: realized })
    }
}
