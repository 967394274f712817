use crate::snapshot::{BookError, Side, Snapshot};

/// What to do when one side of the book has no levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EmptySidePolicy {
    /// Skip the snapshot with [`BookError::EmptySide`].
    #[default]
    Skip,
    /// Substitute a fixed price for whichever side is missing.
    Fallback { bid_micros: i64, ask_micros: i64 },
}

/// Best bid, best ask and mid of a tradeable snapshot (all micros).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Touch {
    pub best_bid_micros: i64,
    pub best_ask_micros: i64,
    pub mid_micros: i64,
}

impl Touch {
    /// Builds a touch from explicit prices; fails on a crossed or locked book.
    pub fn new(best_bid_micros: i64, best_ask_micros: i64) -> Result<Self, BookError> {
        if best_bid_micros >= best_ask_micros {
            return Err(BookError::CrossedBook {
                best_bid_micros,
                best_ask_micros,
            });
        }
        // Floor division in i128; the mean of two i64 values fits back in i64.
        let mid_micros = ((best_bid_micros as i128 + best_ask_micros as i128).div_euclid(2)) as i64;
        Ok(Self {
            best_bid_micros,
            best_ask_micros,
            mid_micros,
        })
    }

    pub fn spread_micros(&self) -> i64 {
        self.best_ask_micros.saturating_sub(self.best_bid_micros)
    }

    /// Clamp a limit price into `[best_bid, best_ask]`.
    pub fn clamp(&self, price_micros: i64) -> i64 {
        price_micros.clamp(self.best_bid_micros, self.best_ask_micros)
    }

    /// Price that trades immediately for `side`: best ask for a buy, best bid for a sell.
    pub fn crossing_price(&self, side: Side) -> i64 {
        match side {
            Side::Buy => self.best_ask_micros,
            Side::Sell => self.best_bid_micros,
        }
    }
}

/// Validate a snapshot and derive its touch.
///
/// Order of checks: level structure, then empty sides (subject to `policy`),
/// then the non-crossed invariant. A fallback price never replaces a side that
/// is present and never rescues a crossed book.
pub fn resolve_touch(snapshot: &Snapshot, policy: EmptySidePolicy) -> Result<Touch, BookError> {
    snapshot.validate_levels()?;

    let bid = snapshot.best_bid().map(|l| l.price_micros);
    let ask = snapshot.best_ask().map(|l| l.price_micros);

    let (bid, ask) = match (policy, bid, ask) {
        (_, Some(b), Some(a)) => (b, a),
        (EmptySidePolicy::Skip, None, _) => return Err(BookError::EmptySide { side: Side::Buy }),
        (EmptySidePolicy::Skip, _, None) => return Err(BookError::EmptySide { side: Side::Sell }),
        (
            EmptySidePolicy::Fallback {
                bid_micros,
                ask_micros,
            },
            b,
            a,
        ) => (b.unwrap_or(bid_micros), a.unwrap_or(ask_micros)),
    };

    Touch::new(bid, ask)
}
