use qb_book::Side;

/// A confirmed execution against an order intent (the accounting atom).
///
/// qty is always positive; the direction lives in `side`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub instrument: String,
    pub side: Side,
    pub qty: i64,
    pub price_micros: i64,
    pub timestamp: i64,
}

impl Fill {
    pub fn new<S: Into<String>>(
        instrument: S,
        side: Side,
        qty: i64,
        price_micros: i64,
        timestamp: i64,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            qty,
            price_micros,
            timestamp,
        }
    }

    /// Signed position change this fill produces.
    pub fn signed_qty(&self) -> i64 {
        self.side.signed_qty(self.qty)
    }
}

/// A FIFO lot. qty_signed carries direction:
/// +qty = long lot, -qty = short lot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lot {
    pub qty_signed: i64,
    pub entry_price_micros: i64,
}

impl Lot {
    pub fn long(qty: i64, entry_price_micros: i64) -> Self {
        Self {
            qty_signed: qty,
            entry_price_micros,
        }
    }

    pub fn short(qty: i64, entry_price_micros: i64) -> Self {
        Self {
            qty_signed: -qty,
            entry_price_micros,
        }
    }

    pub fn is_long(&self) -> bool {
        self.qty_signed > 0
    }

    pub fn is_short(&self) -> bool {
        self.qty_signed < 0
    }

    pub fn abs_qty(&self) -> i64 {
        self.qty_signed.abs()
    }
}

/// Open lots for one instrument, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionState {
    pub instrument: String,
    pub lots: Vec<Lot>,
}

impl PositionState {
    pub fn new<S: Into<String>>(instrument: S) -> Self {
        Self {
            instrument: instrument.into(),
            lots: Vec::new(),
        }
    }

    /// Signed position quantity (+long, -short, 0 flat).
    pub fn qty_signed(&self) -> i64 {
        self.lots.iter().map(|l| l.qty_signed).sum()
    }

    pub fn is_flat(&self) -> bool {
        self.qty_signed() == 0
    }
}
