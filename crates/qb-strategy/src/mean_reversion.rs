use qb_book::Touch;

use crate::history::{HistoryError, PriceHistory};
use crate::intent::Quote;

/// Fade deviations of the mid from its rolling average.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeanReversion {
    history: PriceHistory,
    threshold_micros: i64,
    order_quantity: i64,
}

impl MeanReversion {
    pub fn new(
        window: usize,
        threshold_micros: i64,
        order_quantity: i64,
    ) -> Result<Self, HistoryError> {
        Ok(Self {
            history: PriceHistory::new(window)?,
            threshold_micros,
            order_quantity,
        })
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// Push the mid, then compare it to the window average.
    ///
    /// Nothing is proposed until the window is full. The comparison
    /// `mid < avg - threshold` is evaluated on window sums
    /// (`mid*W < sum - threshold*W`) so there is no rounding.
    pub fn on_touch(&mut self, touch: &Touch) -> Option<Quote> {
        let mid = touch.mid_micros;
        self.history.push(mid);
        if !self.history.is_full() {
            return None;
        }

        let w = self.history.len() as i128;
        let scaled_mid = mid as i128 * w;
        let band = self.threshold_micros as i128 * w;
        let sum = self.history.sum();

        if scaled_mid < sum - band {
            Some(Quote::buy(mid, self.order_quantity))
        } else if scaled_mid > sum + band {
            Some(Quote::sell(mid, self.order_quantity))
        } else {
            None
        }
    }
}
