use chrono::Utc;
use core_types::{
    BookTick, IndicatorSnapshot, MarketSnapshot, Portfolio, Prediction, Symbol, TradingConfig,
    TradingSignal,
};
use events::{EngineEvent, PartialExitEvent, PositionClosedEvent};
use ledger::{CorruptionReport, MarketDataPoint, TradeFill, TradeLedger};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod error;
pub mod exits;
pub mod lifecycle;

pub use error::{Error, Result};
pub use exits::{ExitDecision, ExitKind};
pub use lifecycle::{ClosedTrade, OpenOutcome, PositionBook, PositionTracking};

use signals::{SignalContext, SignalSynthesizer, Synthesis, Thresholds};

/// How many recently emitted signals the engine keeps for inspection.
const RECENT_SIGNAL_WINDOW: usize = 10;
/// How many book levels feed the recorded bid/ask depth.
const RECORDED_DEPTH: usize = 15;

/// A completed round trip as seen by a learning layer.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub profit_loss: Decimal,
    pub holding_secs: f64,
    pub prediction: Prediction,
    pub actual_return_pct: f64,
    pub success: bool,
    pub mfe_pct: f64,
    pub mae_pct: f64,
}

/// Receives every completed trade, e.g. to refine a prediction model.
pub trait OutcomeSink: Send {
    fn on_trade_outcome(&mut self, outcome: &TradeOutcome);
}

/// One analysis cycle's inputs: the indicator and market snapshots and the
/// model's prediction, all current as of `price`.
pub struct AnalysisUpdate {
    pub price: Decimal,
    pub book_imbalance: f64,
    pub indicators: IndicatorSnapshot,
    pub market: MarketSnapshot,
    pub prediction: Prediction,
    pub model_thresholds: Option<Thresholds>,
}

/// The decision core for one symbol: synthesizes signals from analysis
/// updates, opens positions through the risk gate, walks open positions
/// through the exit rules on every tick, and records completed trades.
pub struct TradingEngine {
    symbol: Symbol,
    config: TradingConfig,
    book: PositionBook,
    synthesizer: SignalSynthesizer,
    ledger: TradeLedger,
    events: broadcast::Sender<EngineEvent>,
    learning: Option<Box<dyn OutcomeSink>>,
    recent_signals: VecDeque<TradingSignal>,
    last_indicators: Option<IndicatorSnapshot>,
    last_market: Option<MarketSnapshot>,
}

impl TradingEngine {
    pub fn new(
        symbol: Symbol,
        config: TradingConfig,
        book: PositionBook,
        ledger: TradeLedger,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            symbol,
            config,
            book,
            synthesizer: SignalSynthesizer::new(),
            ledger,
            events,
            learning: None,
            recent_signals: VecDeque::new(),
            last_indicators: None,
            last_market: None,
        }
    }

    pub fn with_learning(mut self, sink: Box<dyn OutcomeSink>) -> Self {
        self.learning = Some(sink);
        self
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.book.portfolio()
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TradeLedger {
        &mut self.ledger
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn recent_signals(&self) -> impl Iterator<Item = &TradingSignal> {
        self.recent_signals.iter()
    }

    /// Swaps the live trading configuration. Takes effect from the next
    /// cycle; open positions keep their entry-time protective levels.
    pub fn update_config(&mut self, config: TradingConfig) {
        self.config = config;
        info!("Trading configuration updated");
        let _ = self.events.send(EngineEvent::ConfigUpdated);
    }

    /// Scans the ledger for integrity defects and broadcasts the report
    /// when any are found.
    pub fn audit_ledger(&self) -> CorruptionReport {
        let report = self.ledger.detect_corruption();
        if !report.is_clean() {
            warn!(issues = report.issues.len(), "Ledger corruption detected");
            let _ = self.events.send(EngineEvent::CorruptionDetected(report.clone()));
        }
        report
    }

    /// Processes one raw order-book tick: marks open positions to the new
    /// price, evaluates exits, and appends a market-data observation.
    /// Malformed ticks (no usable price) are dropped silently.
    pub fn on_tick(&mut self, tick: &BookTick) -> Result<()> {
        let tick = tick.normalized();
        let Some(price) = tick.mark_price() else {
            return Ok(());
        };
        if price <= Decimal::ZERO {
            return Ok(());
        }

        self.book.update_prices(&self.symbol, price);
        self.evaluate_exits(price)?;
        self.record_tick(&tick, price);
        Ok(())
    }

    /// Processes one analysis cycle: stores the snapshots, runs the signal
    /// synthesizer and, on an emitted signal, attempts to open a position
    /// through the risk gate.
    pub fn on_analysis(&mut self, update: AnalysisUpdate) {
        self.last_indicators = Some(update.indicators.clone());
        self.last_market = Some(update.market.clone());

        let ctx = SignalContext {
            symbol: &self.symbol,
            price: update.price,
            indicators: &update.indicators,
            market: &update.market,
            prediction: &update.prediction,
            book_imbalance: update.book_imbalance,
            portfolio: self.book.portfolio(),
            model_thresholds: update.model_thresholds,
        };

        let signal = match self.synthesizer.synthesize(&ctx, &self.config) {
            Synthesis::Signal(signal) => signal,
            Synthesis::Suppressed(suppression) => {
                let _ = self.events.send(EngineEvent::SignalSuppressed {
                    symbol: self.symbol.clone(),
                    reason: suppression.to_string(),
                });
                return;
            }
        };

        self.recent_signals.push_back(signal.clone());
        while self.recent_signals.len() > RECENT_SIGNAL_WINDOW {
            self.recent_signals.pop_front();
        }
        let _ = self.events.send(EngineEvent::SignalGenerated(signal.clone()));

        match self.book.open(&signal, update.prediction, &self.config) {
            OpenOutcome::Opened(position) => {
                let _ = self.events.send(EngineEvent::PositionOpened(position));
            }
            OpenOutcome::Rejected(checks) => {
                warn!(symbol = %self.symbol, ?checks, "Order rejected by risk gate");
                let _ = self.events.send(EngineEvent::OrderRejected {
                    symbol: self.symbol.clone(),
                    notional: signal.notional(),
                    failed_checks: checks.iter().map(|c| c.to_string()).collect(),
                });
            }
        }
    }

    fn evaluate_exits(&mut self, price: Decimal) -> Result<()> {
        let atr = self.last_indicators.as_ref().and_then(|i| i.atr);
        let now = Utc::now();

        for id in self.book.open_ids(&self.symbol) {
            self.book.refresh_tracking(id, price, atr, &self.config)?;
            let decision = {
                let (position, tracking) = self.book.position_with_tracking(id)?;
                exits::evaluate(position, tracking, price, now, &self.config)
            };
            let Some(decision) = decision else { continue };

            match decision.kind {
                ExitKind::Partial { quantity } => {
                    self.book.partial_exit(id, quantity, price)?;
                    let _ = self.events.send(EngineEvent::PartialExit(PartialExitEvent {
                        position_id: id,
                        symbol: self.symbol.clone(),
                        quantity,
                        exit_price: price,
                        reason: decision.reason,
                        timestamp: now,
                    }));
                }
                ExitKind::Full => {
                    let closed = self.book.full_exit(id, price, &self.config)?;
                    self.record_closed_trade(closed, price, decision.reason);
                }
            }
        }
        Ok(())
    }

    fn record_closed_trade(&mut self, closed: ClosedTrade, price: Decimal, reason: String) {
        let ClosedTrade { position, tracking, realized_pnl } = closed;
        let exit_time = position.closed_at.unwrap_or_else(Utc::now);

        let record = self.ledger.record_trade(TradeFill {
            symbol: position.symbol.clone(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price: price,
            quantity: position.quantity,
            entry_time: tracking.opened_at,
            exit_time,
            mfe_pct: tracking.mfe * 100.0,
            mae_pct: tracking.mae * 100.0,
            market: tracking.market_at_entry.clone(),
            indicators: tracking.indicators_at_entry.clone(),
            prediction: tracking.prediction.clone(),
            exit_reason: reason.clone(),
        });

        if self.config.learning_enabled {
            if let Some(sink) = self.learning.as_mut() {
                sink.on_trade_outcome(&TradeOutcome {
                    entry_price: position.entry_price,
                    exit_price: price,
                    profit_loss: realized_pnl,
                    holding_secs: record.holding_secs,
                    prediction: tracking.prediction,
                    actual_return_pct: record.return_percentage,
                    success: realized_pnl > Decimal::ZERO,
                    mfe_pct: record.mfe_pct,
                    mae_pct: record.mae_pct,
                });
            }
        }

        let _ = self.events.send(EngineEvent::TradeRecorded(record));
        let _ = self.events.send(EngineEvent::PositionClosed(PositionClosedEvent {
            position,
            reason,
            realized_pnl,
        }));
    }

    fn record_tick(&mut self, tick: &BookTick, price: Decimal) {
        let bid_quantity: Decimal = tick
            .bids
            .iter()
            .take(RECORDED_DEPTH)
            .map(|l| l.quantity)
            .sum();
        let ask_quantity: Decimal = tick
            .asks
            .iter()
            .take(RECORDED_DEPTH)
            .map(|l| l.quantity)
            .sum();

        self.ledger.record_market_data(MarketDataPoint {
            timestamp: tick.timestamp,
            price,
            volume: bid_quantity + ask_quantity,
            spread: tick.spread().unwrap_or(Decimal::ZERO),
            bid_quantity,
            ask_quantity,
            order_book_imbalance: tick.imbalance(),
            indicators: self.last_indicators.clone(),
            market: self.last_market.clone(),
        });
    }
}
