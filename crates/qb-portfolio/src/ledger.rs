//! `PositionLedger`: the single owner of signed positions.
//!
//! [`accounting`](crate::accounting) holds the raw FIFO/PnL mechanics. This
//! module wraps them behind an append-only fill log that:
//!
//! - rejects malformed fills (zero/negative qty or price, empty instrument);
//! - rejects any fill whose post-state breaches `[-limit, +limit]`;
//! - leaves state untouched on every error.
//!
//! Two ledgers fed the same fills always hold identical state.

use std::collections::BTreeMap;

use qb_book::Side;
use thiserror::Error;

use crate::{
    accounting::{apply_fill, recompute_from_fills, AccountState},
    metrics::{compute_equity_micros, compute_unrealized_pnl_micros},
    types::{Fill, PositionState},
    MarkMap,
};

/// Default absolute position bound per instrument.
pub const DEFAULT_POSITION_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger invariant: qty must be > 0, got {qty}")]
    NonPositiveQty { qty: i64 },
    #[error("ledger invariant: price_micros must be > 0, got {price_micros}")]
    NonPositivePrice { price_micros: i64 },
    #[error("ledger invariant: instrument must not be empty")]
    EmptyInstrument,
    /// The fill would move the position outside `[-limit, +limit]`.
    #[error("position limit exceeded on {instrument}: {position} {delta:+} breaches ±{limit}")]
    LimitExceeded {
        instrument: String,
        position: i64,
        delta: i64,
        limit: i64,
    },
}

/// Point-in-time read-only view of the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub position_limit: i64,
    pub cash_micros: i64,
    pub realized_pnl_micros: i64,
    pub positions: BTreeMap<String, PositionState>,
    pub fill_count: usize,
}

impl LedgerSnapshot {
    /// Signed net quantity for an instrument (0 if not held).
    pub fn qty_signed(&self, instrument: &str) -> i64 {
        self.positions
            .get(instrument)
            .map(|p| p.qty_signed())
            .unwrap_or(0)
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Signed positions bounded by a fixed limit, mutated only by confirmed fills.
#[derive(Clone, Debug)]
pub struct PositionLedger {
    position_limit: i64,
    state: AccountState,
    fills: Vec<Fill>,
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION_LIMIT)
    }
}

impl PositionLedger {
    /// A negative limit is treated as 0 (flat only).
    pub fn new(position_limit: i64) -> Self {
        Self {
            position_limit: position_limit.max(0),
            state: AccountState::default(),
            fills: Vec::new(),
        }
    }

    pub fn position_limit(&self) -> i64 {
        self.position_limit
    }

    /// Signed position for `instrument`; 0 when never traded.
    pub fn current_position(&self, instrument: &str) -> i64 {
        self.state
            .positions
            .get(instrument)
            .map(|p| p.qty_signed())
            .unwrap_or(0)
    }

    /// `true` iff `|current + delta| > limit`.
    pub fn would_exceed_limit(&self, instrument: &str, delta: i64) -> bool {
        let post = self.current_position(instrument).saturating_add(delta);
        post.saturating_abs() > self.position_limit
    }

    /// Largest qty on `side` that keeps the position inside the bound.
    pub fn remaining_capacity(&self, instrument: &str, side: Side) -> i64 {
        let pos = self.current_position(instrument);
        let room = match side {
            Side::Buy => self.position_limit - pos,
            Side::Sell => self.position_limit + pos,
        };
        room.max(0)
    }

    /// Apply a confirmed fill.
    ///
    /// # Errors
    /// Any [`LedgerError`]; the ledger is **not** mutated on error.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), LedgerError> {
        Self::validate_fill(fill)?;
        let delta = fill.signed_qty();
        if self.would_exceed_limit(&fill.instrument, delta) {
            return Err(LedgerError::LimitExceeded {
                instrument: fill.instrument.clone(),
                position: self.current_position(&fill.instrument),
                delta,
                limit: self.position_limit,
            });
        }
        apply_fill(&mut self.state, fill);
        self.fills.push(fill.clone());
        Ok(())
    }

    pub fn cash_micros(&self) -> i64 {
        self.state.cash_micros
    }

    pub fn realized_pnl_micros(&self) -> i64 {
        self.state.realized_pnl_micros
    }

    pub fn realized_pnl_for(&self, instrument: &str) -> i64 {
        self.state
            .realized_by_instrument
            .get(instrument)
            .copied()
            .unwrap_or(0)
    }

    /// Unrealized PnL of one instrument's open lots at `mark_micros`.
    pub fn unrealized_pnl_micros(&self, instrument: &str, mark_micros: i64) -> i64 {
        let Some(pos) = self.state.positions.get(instrument) else {
            return 0;
        };
        let single: BTreeMap<String, PositionState> =
            [(instrument.to_string(), pos.clone())].into();
        compute_unrealized_pnl_micros(&single, &crate::marks([(instrument, mark_micros)]))
    }

    /// Mark-to-market equity: `cash + Σ(qty × mark)`.
    pub fn equity_micros(&self, marks: &MarkMap) -> i64 {
        compute_equity_micros(self.state.cash_micros, &self.state.positions, marks)
    }

    /// Fills applied so far, in order.
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            position_limit: self.position_limit,
            cash_micros: self.state.cash_micros,
            realized_pnl_micros: self.state.realized_pnl_micros,
            positions: self.state.positions.clone(),
            fill_count: self.fills.len(),
        }
    }

    /// Replay the fill log and compare with the incremental state.
    ///
    /// O(n); meant for tests and end-of-run checks.
    pub fn verify_integrity(&self) -> bool {
        recompute_from_fills(&self.fills) == self.state
    }

    fn validate_fill(fill: &Fill) -> Result<(), LedgerError> {
        if fill.instrument.trim().is_empty() {
            return Err(LedgerError::EmptyInstrument);
        }
        if fill.qty <= 0 {
            return Err(LedgerError::NonPositiveQty { qty: fill.qty });
        }
        if fill.price_micros <= 0 {
            return Err(LedgerError::NonPositivePrice {
                price_micros: fill.price_micros,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MICROS_SCALE;

    const M: i64 = MICROS_SCALE;

    fn fill(side: Side, qty: i64, price: i64) -> Fill {
        Fill::new("P", side, qty, price * M, 0)
    }

    #[test]
    fn fill_taking_45_to_55_is_rejected() {
        let mut l = PositionLedger::new(50);
        l.apply_fill(&fill(Side::Buy, 45, 100)).unwrap();
        let err = l.apply_fill(&fill(Side::Buy, 10, 100));
        assert_eq!(
            err,
            Err(LedgerError::LimitExceeded {
                instrument: "P".to_string(),
                position: 45,
                delta: 10,
                limit: 50
            })
        );
        assert_eq!(l.current_position("P"), 45);
        assert_eq!(l.fills().len(), 1);
    }

    #[test]
    fn bound_is_inclusive() {
        let l = PositionLedger::new(50);
        assert!(!l.would_exceed_limit("P", 50));
        assert!(!l.would_exceed_limit("P", -50));
        assert!(l.would_exceed_limit("P", 51));
        assert!(l.would_exceed_limit("P", -51));

        let mut l = PositionLedger::new(50);
        l.apply_fill(&fill(Side::Sell, 50, 100)).unwrap();
        assert_eq!(l.current_position("P"), -50);
        assert!(l.apply_fill(&fill(Side::Sell, 1, 100)).is_err());
        assert_eq!(l.remaining_capacity("P", Side::Sell), 0);
        assert_eq!(l.remaining_capacity("P", Side::Buy), 100);
    }

    #[test]
    fn unseen_instrument_is_flat() {
        let l = PositionLedger::default();
        assert_eq!(l.position_limit(), DEFAULT_POSITION_LIMIT);
        assert_eq!(l.current_position("NOPE"), 0);
        assert_eq!(l.remaining_capacity("NOPE", Side::Buy), 50);
        assert!(l.snapshot().is_flat());
    }

    #[test]
    fn rejects_malformed_fills_without_mutation() {
        let mut l = PositionLedger::new(50);
        assert_eq!(
            l.apply_fill(&fill(Side::Buy, 0, 100)),
            Err(LedgerError::NonPositiveQty { qty: 0 })
        );
        assert_eq!(
            l.apply_fill(&Fill::new("P", Side::Buy, 1, 0, 0)),
            Err(LedgerError::NonPositivePrice { price_micros: 0 })
        );
        assert_eq!(
            l.apply_fill(&Fill::new(" ", Side::Buy, 1, M, 0)),
            Err(LedgerError::EmptyInstrument)
        );
        assert_eq!(l.snapshot().fill_count, 0);
        assert_eq!(l.cash_micros(), 0);
    }

    #[test]
    fn round_trip_pnl_and_integrity() {
        let mut l = PositionLedger::new(50);
        l.apply_fill(&fill(Side::Buy, 10, 9_999)).unwrap();
        l.apply_fill(&fill(Side::Buy, 10, 10_000)).unwrap();
        l.apply_fill(&fill(Side::Sell, 15, 10_001)).unwrap();

        // FIFO: 10 @ 9999 -> +20, 5 @ 10000 -> +5
        assert_eq!(l.realized_pnl_micros(), 25 * M);
        assert_eq!(l.realized_pnl_for("P"), 25 * M);
        assert_eq!(l.current_position("P"), 5);
        // 5 left @ 10000, mark 10003 -> +15
        assert_eq!(l.unrealized_pnl_micros("P", 10_003 * M), 15 * M);
        assert_eq!(l.unrealized_pnl_micros("Q", 10_003 * M), 0);
        // equity == realized + unrealized since cash starts at 0
        let mk = crate::marks([("P", 10_003 * M)]);
        assert_eq!(l.equity_micros(&mk), 40 * M);
        assert!(l.verify_integrity());
    }

    #[test]
    fn short_unrealized_is_negative_when_mark_rises() {
        let mut l = PositionLedger::new(50);
        l.apply_fill(&fill(Side::Sell, 10, 100)).unwrap();
        assert_eq!(l.unrealized_pnl_micros("P", 105 * M), -50 * M);
    }
}
