//! Backtest replay determinism.
//!
//! GREEN when:
//! - the same CSV + config, replayed through freshly built engines, yields an
//!   identical report (intents, fills, PnL curve, summaries)
//! - the fixture's crossed and one-sided rows are skipped, not fatal

use std::path::PathBuf;

use qb_backtest::{load_csv_file, BacktestConfig, BacktestEngine, BacktestReport};
use qb_strategy::EngineConfig;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn run_once() -> BacktestReport {
    let loaded = qb_config::load_layered_yaml(&[fixture("tutorial.yaml")]).unwrap();
    let bt_cfg = BacktestConfig::from_config_json(&loaded.config_json).unwrap();
    let engines = EngineConfig::from_config_json(&loaded.config_json).unwrap();
    let snapshots = load_csv_file(fixture("prices_tutorial.csv")).unwrap();

    let mut bt = BacktestEngine::from_engine_configs(bt_cfg, &engines).unwrap();
    bt.run(&snapshots).unwrap()
}

#[test]
fn scenario_identical_replay_yields_identical_report() {
    let a = run_once();
    let b = run_once();

    assert_eq!(a, b);
    assert_eq!(a.run_name, "tutorial");
    assert!(!a.intents.is_empty());
    assert!(!a.fills.is_empty(), "market maker should trade on a noisy book");
}

#[test]
fn scenario_bad_rows_are_skipped_and_counted() {
    let report = run_once();

    let p1 = report.summary("PRODUCT1").unwrap();
    assert_eq!(p1.snapshots_seen, 80);
    assert_eq!(p1.snapshots_skipped, 1, "one crossed row");
    assert_eq!(p1.strategy, "market_maker");

    let p2 = report.summary("PRODUCT2").unwrap();
    assert_eq!(p2.snapshots_skipped, 1, "one row with no asks");
    assert_eq!(p2.strategy, "trend_follower");

    assert_eq!(report.unbound_snapshots, 0);
    // One mark per accepted snapshot.
    assert_eq!(report.pnl_curve.len(), 158);
}

#[test]
fn scenario_positions_stay_inside_the_limit() {
    let report = run_once();
    for s in &report.summaries {
        assert!(s.max_abs_position <= 50, "{} reached {}", s.instrument, s.max_abs_position);
        assert_eq!(s.rejected_fills, 0);
        assert_eq!(s.total_pnl_micros, s.realized_pnl_micros + s.unrealized_pnl_micros);
    }
    for p in &report.pnl_curve {
        assert!(p.position.abs() <= 50);
    }
}
