use qb_book::Side;

/// Raw proposal from a strategy variant, before pricing and limit policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quote {
    pub side: Side,
    pub price_micros: i64,
    pub qty: i64,
}

impl Quote {
    pub fn new(side: Side, price_micros: i64, qty: i64) -> Self {
        Self {
            side,
            price_micros,
            qty,
        }
    }

    pub fn buy(price_micros: i64, qty: i64) -> Self {
        Self::new(Side::Buy, price_micros, qty)
    }

    pub fn sell(price_micros: i64, qty: i64) -> Self {
        Self::new(Side::Sell, price_micros, qty)
    }
}

/// An order the engine wants placed. Immutable once emitted; qty > 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderIntent {
    pub instrument: String,
    pub side: Side,
    pub price_micros: i64,
    pub qty: i64,
    /// Timestamp of the snapshot that produced the intent.
    pub timestamp: i64,
}

impl OrderIntent {
    /// Whether a resting order at this price trades against `level_price`.
    pub fn is_marketable_at(&self, level_price_micros: i64) -> bool {
        match self.side {
            Side::Buy => level_price_micros <= self.price_micros,
            Side::Sell => level_price_micros >= self.price_micros,
        }
    }
}
