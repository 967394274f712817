use anyhow::{bail, Result};
use qb_portfolio::Fill;
use qb_strategy::{OrderIntent, StrategyKind};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_RUN_NAME: &str = "quotebench";

/// Backtest configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktestConfig {
    /// Label carried into the report and the run manifest.
    pub run_name: String,
    /// Unfilled intent remainders stay matchable against the instrument's
    /// next snapshot. Off: remainders are cancelled on emission.
    pub rest_orders: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            run_name: DEFAULT_RUN_NAME.to_string(),
            rest_orders: true,
        }
    }
}

impl BacktestConfig {
    /// Reads `/run/name` and `/backtest/rest_orders`; both optional.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut out = Self::default();
        match cfg.pointer("/run/name") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if !s.trim().is_empty() => out.run_name = s.trim().to_string(),
            Some(other) => bail!("run.name must be a non-empty string, got {other}"),
        }
        match cfg.pointer("/backtest/rest_orders") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(b)) => out.rest_orders = *b,
            Some(other) => bail!("backtest.rest_orders must be a bool, got {other}"),
        }
        Ok(out)
    }

    /// JSON-pointer leaves read by [`BacktestConfig::from_config_json`].
    pub fn consumed_pointers() -> Vec<String> {
        vec!["/run/name".to_string(), "/backtest/rest_orders".to_string()]
    }
}

/// Mark-to-market point recorded after each accepted snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PnlPoint {
    pub timestamp: i64,
    pub instrument: String,
    pub position: i64,
    /// Snapshot mid used as the mark.
    pub mark_micros: i64,
    pub realized_pnl_micros: i64,
    pub unrealized_pnl_micros: i64,
    pub total_pnl_micros: i64,
}

/// Per-instrument outcome of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstrumentSummary {
    pub instrument: String,
    pub strategy: &'static str,
    pub snapshots_seen: u64,
    pub snapshots_accepted: u64,
    pub snapshots_skipped: u64,
    pub intents_emitted: u64,
    pub intents_suppressed: u64,
    pub intents_clamped: u64,
    /// Sum of emitted intent quantities.
    pub intended_qty: i64,
    pub filled_qty: i64,
    /// filled / intended in basis points; 0 when nothing was intended.
    pub fill_rate_bps: i64,
    pub fills: u64,
    pub rejected_fills: u64,
    pub final_position: i64,
    pub max_abs_position: i64,
    pub realized_pnl_micros: i64,
    pub unrealized_pnl_micros: i64,
    pub total_pnl_micros: i64,
}

impl InstrumentSummary {
    pub(crate) fn empty(instrument: &str, kind: StrategyKind) -> Self {
        Self {
            instrument: instrument.to_string(),
            strategy: kind.as_str(),
            snapshots_seen: 0,
            snapshots_accepted: 0,
            snapshots_skipped: 0,
            intents_emitted: 0,
            intents_suppressed: 0,
            intents_clamped: 0,
            intended_qty: 0,
            filled_qty: 0,
            fill_rate_bps: 0,
            fills: 0,
            rejected_fills: 0,
            final_position: 0,
            max_abs_position: 0,
            realized_pnl_micros: 0,
            unrealized_pnl_micros: 0,
            total_pnl_micros: 0,
        }
    }
}

pub(crate) fn fill_rate_bps(filled: i64, intended: i64) -> i64 {
    if intended <= 0 {
        return 0;
    }
    ((filled as i128 * 10_000) / intended as i128) as i64
}

/// Backtest output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktestReport {
    pub run_name: String,
    /// Every intent in emission order.
    pub intents: Vec<OrderIntent>,
    /// Every fill accepted by a ledger, in application order.
    pub fills: Vec<Fill>,
    pub pnl_curve: Vec<PnlPoint>,
    /// One entry per bound instrument, in instrument order.
    pub summaries: Vec<InstrumentSummary>,
    pub rejected_fills: u64,
    /// Snapshots for instruments with no bound engine.
    pub unbound_snapshots: u64,
}

impl BacktestReport {
    pub fn summary(&self, instrument: &str) -> Option<&InstrumentSummary> {
        self.summaries.iter().find(|s| s.instrument == instrument)
    }

    pub fn total_pnl_micros(&self) -> i64 {
        self.summaries.iter().map(|s| s.total_pnl_micros).sum()
    }
}
