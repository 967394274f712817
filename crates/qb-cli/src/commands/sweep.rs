//! `qb sweep`: replay once per value of a single parameter.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use qb_backtest::BacktestEngine;
use qb_book::{format_micros, price_to_micros};
use qb_strategy::{EngineConfig, StrategyParams};
use std::path::{Path, PathBuf};

use super::{load_run_setup, load_snapshots};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SweepParam {
    SpreadOffset,
    Window,
    Threshold,
    ShortWindow,
    LongWindow,
    OrderQuantity,
    PositionLimit,
}

impl SweepParam {
    pub fn as_str(self) -> &'static str {
        match self {
            SweepParam::SpreadOffset => "spread-offset",
            SweepParam::Window => "window",
            SweepParam::Threshold => "threshold",
            SweepParam::ShortWindow => "short-window",
            SweepParam::LongWindow => "long-window",
            SweepParam::OrderQuantity => "order-quantity",
            SweepParam::PositionLimit => "position-limit",
        }
    }

    /// Overwrite this parameter on `cfg` with `raw`.
    pub fn apply(self, cfg: &mut EngineConfig, raw: &str) -> Result<()> {
        let raw = raw.trim();
        let kind = cfg.params.kind();
        match (self, &mut cfg.params) {
            (SweepParam::OrderQuantity, _) => cfg.order_quantity = parse_int(raw)?,
            (SweepParam::PositionLimit, _) => cfg.position_limit = parse_int(raw)?,
            (
                SweepParam::SpreadOffset,
                StrategyParams::MarketMaker {
                    spread_offset_micros,
                },
            ) => *spread_offset_micros = price_to_micros(raw, "spread_offset")?,
            (SweepParam::Window, StrategyParams::MeanReversion { window, .. }) => {
                *window = parse_window(raw)?
            }
            (
                SweepParam::Threshold,
                StrategyParams::MeanReversion {
                    threshold_micros, ..
                },
            ) => *threshold_micros = price_to_micros(raw, "threshold")?,
            (SweepParam::ShortWindow, StrategyParams::TrendFollower { short_window, .. }) => {
                *short_window = parse_window(raw)?
            }
            (SweepParam::LongWindow, StrategyParams::TrendFollower { long_window, .. }) => {
                *long_window = parse_window(raw)?
            }
            _ => bail!(
                "parameter {} does not apply to strategy {}",
                self.as_str(),
                kind
            ),
        }
        Ok(())
    }
}

fn parse_int(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("expected an integer, got '{raw}'"))
}

fn parse_window(raw: &str) -> Result<usize> {
    raw.parse::<usize>()
        .with_context(|| format!("expected a window length, got '{raw}'"))
}

pub fn run_sweep(
    config_paths: &[PathBuf],
    data: &Path,
    instrument: &str,
    param: SweepParam,
    values: &[String],
) -> Result<()> {
    let setup = load_run_setup(config_paths, false)?;
    let snapshots = load_snapshots(data)?;

    let target = setup
        .engines
        .iter()
        .position(|c| c.instrument == instrument)
        .with_context(|| format!("instrument {instrument} is not configured"))?;

    println!("config_hash={}", setup.loaded.config_hash);
    for value in values {
        let mut engines = setup.engines.clone();
        param
            .apply(&mut engines[target], value)
            .with_context(|| format!("invalid {} value '{value}'", param.as_str()))?;

        let mut bt = BacktestEngine::from_engine_configs(setup.backtest.clone(), &engines)
            .with_context(|| format!("invalid {} value '{value}'", param.as_str()))?;
        let report = bt.run(&snapshots)?;
        let s = report
            .summary(instrument)
            .with_context(|| format!("no summary for {instrument}"))?;

        println!(
            "instrument={} param={} value={} intents={} fills={} filled_qty={} fill_rate_bps={} \
             final_position={} max_abs_position={} total_pnl={}",
            instrument,
            param.as_str(),
            value.trim(),
            s.intents_emitted,
            s.fills,
            s.filled_qty,
            s.fill_rate_bps,
            s.final_position,
            s.max_abs_position,
            format_micros(s.total_pnl_micros),
        );
    }
    Ok(())
}
