use qb_book::Touch;

use crate::intent::Quote;

/// Two-sided quoting around the mid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketMaker {
    spread_offset_micros: i64,
    order_quantity: i64,
}

impl MarketMaker {
    pub fn new(spread_offset_micros: i64, order_quantity: i64) -> Self {
        Self {
            spread_offset_micros,
            order_quantity,
        }
    }

    pub fn spread_offset_micros(&self) -> i64 {
        self.spread_offset_micros
    }

    /// Buy at `mid - offset`, sell at `mid + offset`. A side whose price
    /// would overflow i64 is not quoted.
    pub fn on_touch(&mut self, touch: &Touch) -> Vec<Quote> {
        let mid = touch.mid_micros;
        let offset = self.spread_offset_micros;
        [
            mid.checked_sub(offset)
                .map(|px| Quote::buy(px, self.order_quantity)),
            mid.checked_add(offset)
                .map(|px| Quote::sell(px, self.order_quantity)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
