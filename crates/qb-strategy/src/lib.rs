//! qb-strategy
//!
//! Decision logic for quotebench.
//! - Rolling mid-price windows (`PriceHistory`, `DualHistory`)
//! - Three strategy variants behind a closed enum: market making,
//!   mean reversion, trend following
//! - Order gate: pricing policy, then position-limit policy
//! - `StrategyEngine`: one instrument, one variant, one ledger per run
//! - `StrategyHost`: instrument -> engine routing, one binding per instrument
//!
//! Deterministic: the same snapshots into a freshly built engine always yield
//! the same intents.

mod config;
mod engine;
mod gate;
mod history;
mod host;
mod intent;
mod market_maker;
mod mean_reversion;
mod strategy;
mod trend;

pub use config::{
    EngineConfig, ParamError, StrategyParams, DEFAULT_FALLBACK_ASK_MICROS,
    DEFAULT_FALLBACK_BID_MICROS, DEFAULT_MEAN_REVERSION_THRESHOLD_MICROS,
    DEFAULT_MEAN_REVERSION_WINDOW, DEFAULT_ORDER_QUANTITY, DEFAULT_SPREAD_OFFSET_MICROS,
    DEFAULT_TREND_LONG_WINDOW, DEFAULT_TREND_SHORT_WINDOW,
};
pub use engine::{EngineCounters, EngineError, StrategyEngine};
pub use gate::{gate_quote, GateConfig, GateDecision, LimitPolicy, PricingPolicy};
pub use history::{DualHistory, HistoryError, PriceHistory};
pub use host::{HostError, StrategyHost};
pub use intent::{OrderIntent, Quote};
pub use market_maker::MarketMaker;
pub use mean_reversion::MeanReversion;
pub use strategy::{Strategy, StrategyKind};
pub use trend::TrendFollower;
