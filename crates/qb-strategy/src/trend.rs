use std::cmp::Ordering;

use qb_book::Touch;

use crate::history::{DualHistory, HistoryError};
use crate::intent::Quote;

/// Moving-average crossover: short above long buys, below sells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrendFollower {
    windows: DualHistory,
    order_quantity: i64,
}

impl TrendFollower {
    pub fn new(
        short_window: usize,
        long_window: usize,
        order_quantity: i64,
    ) -> Result<Self, HistoryError> {
        Ok(Self {
            windows: DualHistory::new(short_window, long_window)?,
            order_quantity,
        })
    }

    pub fn windows(&self) -> &DualHistory {
        &self.windows
    }

    /// Exact comparison of short vs long average.
    ///
    /// `short_sum / S` vs `long_sum / L` is decided as
    /// `short_sum * L` vs `long_sum * S`.
    pub fn crossover(&self) -> Option<Ordering> {
        if !self.windows.is_warm() {
            return None;
        }
        let s = self.windows.short.len() as i128;
        let l = self.windows.long.len() as i128;
        let lhs = self.windows.short.sum() * l;
        let rhs = self.windows.long.sum() * s;
        Some(lhs.cmp(&rhs))
    }

    pub fn on_touch(&mut self, touch: &Touch) -> Option<Quote> {
        let mid = touch.mid_micros;
        self.windows.push(mid);
        match self.crossover()? {
            Ordering::Greater => Some(Quote::buy(mid, self.order_quantity)),
            Ordering::Less => Some(Quote::sell(mid, self.order_quantity)),
            Ordering::Equal => None,
        }
    }
}
