use anyhow::Result;
use app_config::Settings;
use clap::{Parser, Subcommand};
use core_types::Symbol;
use engine::{AnalysisUpdate, OutcomeSink, PositionBook, TradeOutcome, TradingEngine};
use events::EngineEvent;
use ledger::{JsonFileStore, LedgerStore, NullStore, TradeLedger};
use risk::NotionalRiskGate;
use rust_decimal::prelude::ToPrimitive;
use sim::{HeuristicModel, NaiveAnalysis, SyntheticFeed};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A simulated trading decision engine.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the engine against the synthetic feed.
    Run {
        /// How many ticks to process before stopping.
        #[arg(short, long, default_value_t = 10_000)]
        ticks: u64,

        /// Delay between ticks, in milliseconds.
        #[arg(long, default_value_t = 10)]
        tick_interval_ms: u64,
    },

    /// Prints trade statistics and data quality from the stored ledger.
    Stats,

    /// Scans the stored ledger for corruption and repairs what it finds.
    Repair,

    /// Dumps the full ledger as JSON to stdout.
    Export,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.app.log_level)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { ticks, tick_interval_ms } => {
            run_engine(settings, ticks, tick_interval_ms).await?;
        }
        Commands::Stats => {
            print_stats(&settings)?;
        }
        Commands::Repair => {
            repair_ledger(&settings);
        }
        Commands::Export => {
            export_ledger(&settings)?;
        }
    }

    Ok(())
}

fn open_store(settings: &Settings) -> Box<dyn LedgerStore> {
    if settings.ledger.persist {
        Box::new(JsonFileStore::new(
            settings.ledger.trades_path.clone(),
            settings.ledger.market_data_path.clone(),
        ))
    } else {
        Box::new(NullStore)
    }
}

/// Forwards the shared model's outcome handling into the engine's learning
/// hook while the app keeps the model for predictions.
struct ModelSink(Arc<Mutex<HeuristicModel>>);

impl OutcomeSink for ModelSink {
    fn on_trade_outcome(&mut self, outcome: &TradeOutcome) {
        if let Ok(mut model) = self.0.lock() {
            model.on_trade_outcome(outcome);
        }
    }
}

// --- "Run" Subcommand Logic ---

async fn run_engine(settings: Settings, ticks: u64, tick_interval_ms: u64) -> Result<()> {
    let symbol = Symbol(settings.engine.symbol.clone());
    info!(symbol = %symbol, ticks, "Starting engine run");

    let (event_tx, event_rx) = broadcast::channel::<EngineEvent>(1024);
    tokio::spawn(log_events(event_rx));

    let ledger = TradeLedger::new(open_store(&settings));
    let book = PositionBook::new(settings.engine.initial_capital, Box::new(NotionalRiskGate));
    let model = Arc::new(Mutex::new(HeuristicModel::new()));

    let mut engine = TradingEngine::new(
        symbol,
        settings.trading.clone(),
        book,
        ledger,
        event_tx,
    )
    .with_learning(Box::new(ModelSink(model.clone())));

    let mut feed = SyntheticFeed::new(settings.engine.start_price, settings.engine.feed_seed);
    let mut analysis = NaiveAnalysis::new();

    for _ in 0..ticks {
        let tick = feed.next_tick();
        engine.on_tick(&tick)?;

        if let Some((indicators, market)) = analysis.observe(&tick) {
            if let Some(price) = tick.mark_price() {
                let prediction = {
                    let model = model.lock().map_err(|_| anyhow::anyhow!("model lock poisoned"))?;
                    model.predict(price.to_f64().unwrap_or(0.0), &indicators, &market)
                };
                engine.on_analysis(AnalysisUpdate {
                    price,
                    book_imbalance: analysis.book_imbalance(),
                    indicators,
                    market,
                    prediction,
                    model_thresholds: None,
                });
            }
        }

        if tick_interval_ms > 0 {
            sleep(Duration::from_millis(tick_interval_ms)).await;
        }
    }

    engine.audit_ledger();
    engine.ledger_mut().flush();

    let stats = engine.ledger().statistics();
    info!(
        trades = stats.total_trades,
        win_rate = %format!("{:.1}%", stats.win_rate),
        total_pnl = %stats.total_pnl,
        equity = %engine.portfolio().equity,
        "Run complete"
    );
    if let Ok(model) = model.lock() {
        if let Some(hit_rate) = model.hit_rate() {
            info!(hit_rate = %format!("{:.1}%", hit_rate * 100.0), "Model hit rate");
        }
    }

    Ok(())
}

async fn log_events(mut rx: broadcast::Receiver<EngineEvent>) {
    loop {
        match rx.recv().await {
            Ok(EngineEvent::SignalGenerated(signal)) => {
                info!(symbol = %signal.symbol, action = %signal.action, price = %signal.price,
                    quantity = %signal.quantity, "Signal generated");
            }
            Ok(EngineEvent::PositionOpened(position)) => {
                info!(id = position.id, side = %position.side, entry = %position.entry_price,
                    "Position opened");
            }
            Ok(EngineEvent::PartialExit(exit)) => {
                info!(id = exit.position_id, quantity = %exit.quantity, reason = %exit.reason,
                    "Partial exit");
            }
            Ok(EngineEvent::PositionClosed(closed)) => {
                info!(id = closed.position.id, realized = %closed.realized_pnl,
                    reason = %closed.reason, "Position closed");
            }
            Ok(EngineEvent::OrderRejected { symbol, notional, failed_checks }) => {
                warn!(%symbol, %notional, ?failed_checks, "Order rejected");
            }
            Ok(EngineEvent::CorruptionDetected(report)) => {
                warn!(issues = report.issues.len(), "Ledger corruption detected");
            }
            // Suppressions and trade records are high-volume; keep them quiet.
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// --- Ledger Subcommands ---

fn print_stats(settings: &Settings) -> Result<()> {
    let ledger = TradeLedger::new(open_store(settings));

    println!("{}", serde_json::to_string_pretty(&ledger.statistics())?);
    println!("{}", serde_json::to_string_pretty(&ledger.data_quality())?);
    if let Some(patterns) = ledger.market_patterns() {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
    }
    Ok(())
}

fn repair_ledger(settings: &Settings) {
    let mut ledger = TradeLedger::new(open_store(settings));

    let report = ledger.detect_corruption();
    if report.is_clean() {
        info!("Ledger is clean, nothing to repair");
        return;
    }
    for issue in &report.issues {
        warn!(%issue, "Corruption found");
    }

    let summary = ledger.repair();
    info!(
        duplicates_removed = summary.duplicates_removed,
        pnl_recomputed = summary.pnl_recomputed,
        "Repair finished"
    );
}

fn export_ledger(settings: &Settings) -> Result<()> {
    let ledger = TradeLedger::new(open_store(settings));
    println!("{}", serde_json::to_string_pretty(&ledger.export())?);
    Ok(())
}
