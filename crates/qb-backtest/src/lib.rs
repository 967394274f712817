//! qb-backtest
//!
//! Pipeline: CSV -> SNAPSHOT -> STRATEGY ENGINE -> BOOK MATCH -> LEDGER
//!
//! - Deterministic replay (same snapshots + config => identical report)
//! - Resting intents fill at their limit against the next book only
//! - Crossing intents fill at book prices, volume-capped per snapshot
//! - Limit-breaching fills are rejected by the ledger and counted

mod engine;
pub mod loader;
mod matching;
pub mod types;

pub use engine::{BacktestEngine, BacktestError};
pub use loader::{load_csv_file, parse_price_table, LoadError};
pub use matching::{Execution, FillPrice, Liquidity};
pub use types::{BacktestConfig, BacktestReport, InstrumentSummary, PnlPoint, DEFAULT_RUN_NAME};
