use std::collections::BTreeMap;

use qb_book::Side;

use crate::types::{Fill, Lot, PositionState};

fn i128_to_i64_clamp(x: i128) -> i64 {
    x.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Derived account state: cash, realized PnL and open lots per instrument.
///
/// Cash starts at 0, so `cash + Σ(qty × mark)` is the total PnL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub cash_micros: i64,
    pub realized_pnl_micros: i64,
    pub positions: BTreeMap<String, PositionState>,
    /// Realized PnL broken out per instrument.
    pub realized_by_instrument: BTreeMap<String, i64>,
}

/// Apply a fill with FIFO lots.
///
/// - Buy covers short lots FIFO first, remainder opens a long lot; cash -= qty*price
/// - Sell reduces long lots FIFO first, remainder opens a short lot; cash += qty*price
///
/// No validation here; [`crate::PositionLedger`] owns the invariant boundary.
pub fn apply_fill(st: &mut AccountState, f: &Fill) {
    let notional = i128_to_i64_clamp(f.qty as i128 * f.price_micros as i128);
    match f.side {
        Side::Buy => st.cash_micros = st.cash_micros.saturating_sub(notional),
        Side::Sell => st.cash_micros = st.cash_micros.saturating_add(notional),
    }

    let pos = st
        .positions
        .entry(f.instrument.clone())
        .or_insert_with(|| PositionState::new(f.instrument.clone()));

    let realized = match f.side {
        Side::Buy => buy_fifo(pos, f.qty, f.price_micros),
        Side::Sell => sell_fifo(pos, f.qty, f.price_micros),
    };

    if pos.is_flat() {
        st.positions.remove(&f.instrument);
    }

    st.realized_pnl_micros = st.realized_pnl_micros.saturating_add(realized);
    let per = st
        .realized_by_instrument
        .entry(f.instrument.clone())
        .or_insert(0);
    *per = per.saturating_add(realized);
}

/// Buy FIFO: covers shorts first, then opens long lot. Returns realized PnL.
fn buy_fifo(pos: &mut PositionState, mut qty: i64, buy_px: i64) -> i64 {
    let mut realized: i128 = 0;
    let mut i = 0usize;
    while qty > 0 && i < pos.lots.len() {
        if !pos.lots[i].is_short() {
            i += 1;
            continue;
        }

        let coverable = pos.lots[i].abs_qty().min(qty);
        let entry_px = pos.lots[i].entry_price_micros;
        realized += (entry_px as i128 - buy_px as i128) * coverable as i128;

        let remaining_abs = pos.lots[i].abs_qty() - coverable;
        if remaining_abs == 0 {
            pos.lots.remove(i);
        } else {
            pos.lots[i].qty_signed = -remaining_abs;
            i += 1;
        }
        qty -= coverable;
    }

    if qty > 0 {
        pos.lots.push(Lot::long(qty, buy_px));
    }
    i128_to_i64_clamp(realized)
}

/// Sell FIFO: reduces longs first, then opens short lot. Returns realized PnL.
fn sell_fifo(pos: &mut PositionState, mut qty: i64, sell_px: i64) -> i64 {
    let mut realized: i128 = 0;
    let mut i = 0usize;
    while qty > 0 && i < pos.lots.len() {
        if !pos.lots[i].is_long() {
            i += 1;
            continue;
        }

        let sellable = pos.lots[i].abs_qty().min(qty);
        let entry_px = pos.lots[i].entry_price_micros;
        realized += (sell_px as i128 - entry_px as i128) * sellable as i128;

        let remaining_abs = pos.lots[i].abs_qty() - sellable;
        if remaining_abs == 0 {
            pos.lots.remove(i);
        } else {
            pos.lots[i].qty_signed = remaining_abs;
            i += 1;
        }
        qty -= sellable;
    }

    if qty > 0 {
        pos.lots.push(Lot::short(qty, sell_px));
    }
    i128_to_i64_clamp(realized)
}

/// Rebuild account state from the fill log.
///
/// Incremental `apply_fill` over the same log must produce the same state.
pub fn recompute_from_fills(fills: &[Fill]) -> AccountState {
    let mut st = AccountState::default();
    for f in fills {
        apply_fill(&mut st, f);
    }
    st
}
