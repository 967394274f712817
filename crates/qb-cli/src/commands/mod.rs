//! Command handler modules for the `qb` binary.
//!
//! Shared config + data loading lives here; each subcommand owns its
//! reporting.

pub mod backtest;
pub mod sweep;

use anyhow::{Context, Result};
use qb_backtest::{load_csv_file, BacktestConfig};
use qb_book::Snapshot;
use qb_config::{report_unused_keys, LoadedConfig, UnusedKeyPolicy};
use qb_strategy::EngineConfig;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything a replay needs, parsed from layered YAML.
pub struct RunSetup {
    pub loaded: LoadedConfig,
    pub backtest: BacktestConfig,
    pub engines: Vec<EngineConfig>,
}

pub fn load_run_setup(config_paths: &[PathBuf], strict: bool) -> Result<RunSetup> {
    let loaded = qb_config::load_layered_yaml(config_paths)?;
    let backtest = BacktestConfig::from_config_json(&loaded.config_json)?;
    let engines = EngineConfig::from_config_json(&loaded.config_json)?;

    let mut consumed = EngineConfig::consumed_pointers(&loaded.config_json);
    consumed.extend(BacktestConfig::consumed_pointers());
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, &consumed, policy)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not read by anything");
    }

    Ok(RunSetup {
        loaded,
        backtest,
        engines,
    })
}

pub fn load_snapshots(data: &Path) -> Result<Vec<Snapshot>> {
    load_csv_file(data).with_context(|| format!("load price table failed: {}", data.display()))
}
