//! qb-portfolio
//!
//! Position bookkeeping for quotebench.
//! - Fill-driven: positions move only on confirmed fills
//! - Hard ±limit on the signed position per instrument
//! - FIFO lot accounting, realized vs unrealized PnL
//! - Pure deterministic logic (no IO, no time)

mod accounting;
mod ledger;
mod metrics;
mod types;

pub use accounting::{apply_fill, recompute_from_fills, AccountState};
pub use ledger::{LedgerError, LedgerSnapshot, PositionLedger, DEFAULT_POSITION_LIMIT};
pub use metrics::{compute_equity_micros, compute_unrealized_pnl_micros};
pub use types::{Fill, Lot, PositionState};

pub use qb_book::{Side, MICROS_SCALE};

use std::collections::BTreeMap;

/// Canonical mark map type (instrument -> price_micros).
pub type MarkMap = BTreeMap<String, i64>;

/// Helper to build a MarkMap with minimal boilerplate.
pub fn marks<I, S>(items: I) -> MarkMap
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    items.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
