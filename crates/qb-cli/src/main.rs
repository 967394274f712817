use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::sweep::SweepParam;

#[derive(Parser)]
#[command(name = "qb")]
#[command(about = "quotebench: order-book strategy backtester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a price table through the configured strategies
    Backtest {
        /// Layered config paths in merge order (base -> overlay...)
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,

        /// Price-table CSV (`;` or `,` separated)
        #[arg(long)]
        data: PathBuf,

        /// Exports root; artifacts land in <out>/<run_id>/
        #[arg(long)]
        out: Option<PathBuf>,

        /// Fail when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Replay once per value of one parameter on one instrument
    Sweep {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,

        /// Price-table CSV
        #[arg(long)]
        data: PathBuf,

        /// Instrument whose parameter is swept
        #[arg(long)]
        instrument: String,

        #[arg(long, value_enum)]
        param: SweepParam,

        /// Comma-separated values, e.g. 0,1,2
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Backtest {
            config_paths,
            data,
            out,
            strict_config,
        } => commands::backtest::run_backtest(&config_paths, &data, out.as_deref(), strict_config),

        Commands::Sweep {
            config_paths,
            data,
            instrument,
            param,
            values,
        } => commands::sweep::run_sweep(&config_paths, &data, &instrument, param, &values),

        Commands::ConfigHash { paths } => {
            let loaded = qb_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries the key=value report.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
