//! `qb backtest`: one replay, key=value summary, optional artifacts.

use anyhow::Result;
use qb_artifacts::{write_backtest_artifacts, ManifestArgs};
use qb_backtest::{BacktestEngine, BacktestReport, InstrumentSummary};
use qb_book::format_micros;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{load_run_setup, load_snapshots};

pub fn run_backtest(
    config_paths: &[PathBuf],
    data: &Path,
    out: Option<&Path>,
    strict_config: bool,
) -> Result<()> {
    let setup = load_run_setup(config_paths, strict_config)?;
    let snapshots = load_snapshots(data)?;

    let mut bt = BacktestEngine::from_engine_configs(setup.backtest, &setup.engines)?;
    let report = bt.run(&snapshots)?;

    println!("run_name={}", report.run_name);
    println!("config_hash={}", setup.loaded.config_hash);
    println!("snapshots={}", snapshots.len());
    for s in &report.summaries {
        println!("{}", summary_line(s));
    }
    println!("{}", totals_line(&report));

    if let Some(exports_root) = out {
        let run_id = Uuid::new_v4();
        let written = write_backtest_artifacts(
            exports_root,
            &report,
            &ManifestArgs {
                run_id,
                config_hash: &setup.loaded.config_hash,
            },
        )?;
        println!("run_id={run_id}");
        println!("artifacts_dir={}", written.run_dir.display());
    }
    Ok(())
}

fn summary_line(s: &InstrumentSummary) -> String {
    format!(
        "instrument={} strategy={} accepted={} skipped={} intents={} suppressed={} clamped={} \
         fills={} rejected_fills={} filled_qty={} fill_rate_bps={} final_position={} \
         max_abs_position={} realized_pnl={} unrealized_pnl={} total_pnl={}",
        s.instrument,
        s.strategy,
        s.snapshots_accepted,
        s.snapshots_skipped,
        s.intents_emitted,
        s.intents_suppressed,
        s.intents_clamped,
        s.fills,
        s.rejected_fills,
        s.filled_qty,
        s.fill_rate_bps,
        s.final_position,
        s.max_abs_position,
        format_micros(s.realized_pnl_micros),
        format_micros(s.unrealized_pnl_micros),
        format_micros(s.total_pnl_micros),
    )
}

fn totals_line(report: &BacktestReport) -> String {
    format!(
        "total_pnl={} intents={} fills={} rejected_fills={} unbound_snapshots={}",
        format_micros(report.total_pnl_micros()),
        report.intents.len(),
        report.fills.len(),
        report.rejected_fills,
        report.unbound_snapshots,
    )
}
