use std::collections::BTreeMap;

use crate::types::PositionState;
use crate::MarkMap;

fn i128_to_i64_clamp(x: i128) -> i64 {
    x.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Compute unrealized PnL from FIFO lots and marks.
/// long lot: (mark - entry) * qty
/// short lot: (entry - mark) * abs(qty)
///
/// Instruments without a mark contribute nothing.
pub fn compute_unrealized_pnl_micros(
    positions: &BTreeMap<String, PositionState>,
    marks: &MarkMap,
) -> i64 {
    let mut pnl: i128 = 0;

    for (sym, pos) in positions {
        let Some(&mark) = marks.get(sym) else {
            continue;
        };
        for lot in &pos.lots {
            // (mark - entry) * signed qty covers both directions
            pnl += (mark as i128 - lot.entry_price_micros as i128) * lot.qty_signed as i128;
        }
    }

    i128_to_i64_clamp(pnl)
}

/// Compute equity = cash + Σ(qty * mark).
pub fn compute_equity_micros(
    cash_micros: i64,
    positions: &BTreeMap<String, PositionState>,
    marks: &MarkMap,
) -> i64 {
    let mut mv: i128 = cash_micros as i128;

    for (sym, pos) in positions {
        let mark = *marks.get(sym).unwrap_or(&0);
        mv += pos.qty_signed() as i128 * mark as i128;
    }

    i128_to_i64_clamp(mv)
}
