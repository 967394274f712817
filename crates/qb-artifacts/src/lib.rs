use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use qb_backtest::{BacktestReport, InstrumentSummary};
use qb_book::format_micros;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub run_name: String,
    pub config_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub artifacts: ArtifactList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub manifest_json: String,
    pub intents_csv: String,
    pub fills_csv: String,
    pub pnl_curve_csv: String,
    pub metrics_json: String,
}

impl Default for ArtifactList {
    fn default() -> Self {
        Self {
            manifest_json: "manifest.json".to_string(),
            intents_csv: "intents.csv".to_string(),
            fills_csv: "fills.csv".to_string(),
            pnl_curve_csv: "pnl_curve.csv".to_string(),
            metrics_json: "metrics.json".to_string(),
        }
    }
}

pub struct ManifestArgs<'a> {
    pub run_id: Uuid,
    pub config_hash: &'a str,
}

pub struct WrittenArtifacts {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
}

const ORDER_HEADER: &[&str] = &["timestamp", "instrument", "side", "price", "qty"];
const PNL_HEADER: &[&str] = &[
    "timestamp",
    "instrument",
    "position",
    "mark",
    "realized_pnl",
    "unrealized_pnl",
    "total_pnl",
];

#[derive(Serialize)]
struct OrderRow<'a> {
    timestamp: i64,
    instrument: &'a str,
    side: &'static str,
    price: String,
    qty: i64,
}

#[derive(Serialize)]
struct PnlRow<'a> {
    timestamp: i64,
    instrument: &'a str,
    position: i64,
    mark: String,
    realized_pnl: String,
    unrealized_pnl: String,
    total_pnl: String,
}

#[derive(Serialize)]
struct MetricsDoc<'a> {
    run_name: &'a str,
    total_pnl: String,
    rejected_fills: u64,
    unbound_snapshots: u64,
    instruments: Vec<MetricsEntry<'a>>,
}

#[derive(Serialize)]
struct MetricsEntry<'a> {
    #[serde(flatten)]
    summary: &'a InstrumentSummary,
    realized_pnl: String,
    unrealized_pnl: String,
    total_pnl: String,
}

/// Write one run's artifacts under `<exports_root>/<run_id>/`.
pub fn write_backtest_artifacts(
    exports_root: &Path,
    report: &BacktestReport,
    args: &ManifestArgs<'_>,
) -> Result<WrittenArtifacts> {
    let run_dir = exports_root.join(args.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

    let files = ArtifactList::default();

    write_csv(
        &run_dir.join(&files.intents_csv),
        ORDER_HEADER,
        report.intents.iter().map(|i| OrderRow {
            timestamp: i.timestamp,
            instrument: &i.instrument,
            side: i.side.as_str(),
            price: format_micros(i.price_micros),
            qty: i.qty,
        }),
    )?;
    write_csv(
        &run_dir.join(&files.fills_csv),
        ORDER_HEADER,
        report.fills.iter().map(|f| OrderRow {
            timestamp: f.timestamp,
            instrument: &f.instrument,
            side: f.side.as_str(),
            price: format_micros(f.price_micros),
            qty: f.qty,
        }),
    )?;
    write_csv(
        &run_dir.join(&files.pnl_curve_csv),
        PNL_HEADER,
        report.pnl_curve.iter().map(|p| PnlRow {
            timestamp: p.timestamp,
            instrument: &p.instrument,
            position: p.position,
            mark: format_micros(p.mark_micros),
            realized_pnl: format_micros(p.realized_pnl_micros),
            unrealized_pnl: format_micros(p.unrealized_pnl_micros),
            total_pnl: format_micros(p.total_pnl_micros),
        }),
    )?;

    let metrics = MetricsDoc {
        run_name: &report.run_name,
        total_pnl: format_micros(report.total_pnl_micros()),
        rejected_fills: report.rejected_fills,
        unbound_snapshots: report.unbound_snapshots,
        instruments: report
            .summaries
            .iter()
            .map(|s| MetricsEntry {
                summary: s,
                realized_pnl: format_micros(s.realized_pnl_micros),
                unrealized_pnl: format_micros(s.unrealized_pnl_micros),
                total_pnl: format_micros(s.total_pnl_micros),
            })
            .collect(),
    };
    write_json(&run_dir.join(&files.metrics_json), &metrics)?;

    // Manifest last: its presence marks a complete run directory.
    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: args.run_id,
        run_name: report.run_name.clone(),
        config_hash: args.config_hash.to_string(),
        created_at_utc: Utc::now(),
        artifacts: files,
    };
    let manifest_path = run_dir.join(&manifest.artifacts.manifest_json);
    write_json(&manifest_path, &manifest)?;

    Ok(WrittenArtifacts {
        run_dir,
        manifest_path,
    })
}

/// Header is written explicitly so an empty table still has one.
fn write_csv<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create csv failed: {}", path.display()))?;
    w.write_record(header)
        .with_context(|| format!("write csv header failed: {}", path.display()))?;
    for row in rows {
        w.serialize(row)
            .with_context(|| format!("write csv row failed: {}", path.display()))?;
    }
    w.flush()
        .with_context(|| format!("flush csv failed: {}", path.display()))?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json failed")?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("write json failed: {}", path.display()))?;
    Ok(())
}
