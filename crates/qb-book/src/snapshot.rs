use std::fmt;

use thiserror::Error;

/// Maximum number of price levels carried per side.
pub const MAX_LEVELS: usize = 3;

/// BUY or SELL, shared by intents and fills.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for Buy, -1 for Sell.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    /// Signed position delta produced by filling `qty` on this side.
    pub fn signed_qty(self, qty: i64) -> i64 {
        self.sign() * qty
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price level: price in micros, resting volume in units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Level {
    pub price_micros: i64,
    pub volume: i64,
}

impl Level {
    pub fn new(price_micros: i64, volume: i64) -> Self {
        Self {
            price_micros,
            volume,
        }
    }
}

/// Why a snapshot cannot be traded on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BookError {
    /// Best bid at or above best ask.
    #[error("crossed book: best bid {best_bid_micros} >= best ask {best_ask_micros}")]
    CrossedBook {
        best_bid_micros: i64,
        best_ask_micros: i64,
    },
    /// One side of the book carries no levels (and no fallback applies).
    #[error("empty {side} side")]
    EmptySide { side: Side },
    #[error("{side} side carries {count} levels (max {MAX_LEVELS})")]
    TooManyLevels { side: Side, count: usize },
    /// Bids must be strictly descending, asks strictly ascending.
    #[error("{side} levels are not strictly sorted away from the touch")]
    UnsortedLevels { side: Side },
    #[error("{side} level has non-positive price {price_micros}")]
    NonPositivePrice { side: Side, price_micros: i64 },
    #[error("{side} level has non-positive volume {volume}")]
    NonPositiveVolume { side: Side, volume: i64 },
}

/// An order-book snapshot for one instrument.
///
/// `bids` are best-first (descending price), `asks` best-first (ascending).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub instrument: String,
    pub timestamp: i64,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl Snapshot {
    pub fn new(
        instrument: impl Into<String>,
        timestamp: i64,
        bids: Vec<Level>,
        asks: Vec<Level>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            timestamp,
            bids,
            asks,
        }
    }

    /// Convenience: a one-level-per-side book with `volume` on each side.
    pub fn top_of_book(
        instrument: impl Into<String>,
        timestamp: i64,
        bid_micros: i64,
        ask_micros: i64,
        volume: i64,
    ) -> Self {
        Self::new(
            instrument,
            timestamp,
            vec![Level::new(bid_micros, volume)],
            vec![Level::new(ask_micros, volume)],
        )
    }

    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    /// Levels on the side a resting order of `side` would trade against.
    pub fn opposite_levels(&self, side: Side) -> &[Level] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// Structural checks on each side independently: level count, positive
    /// prices and volumes, strict ordering away from the touch.
    ///
    /// Does not check for a crossed book or an empty side; see [`crate::resolve_touch`].
    pub fn validate_levels(&self) -> Result<(), BookError> {
        validate_side(Side::Buy, &self.bids)?;
        validate_side(Side::Sell, &self.asks)
    }
}

fn validate_side(side: Side, levels: &[Level]) -> Result<(), BookError> {
    if levels.len() > MAX_LEVELS {
        return Err(BookError::TooManyLevels {
            side,
            count: levels.len(),
        });
    }
    for lvl in levels {
        if lvl.price_micros <= 0 {
            return Err(BookError::NonPositivePrice {
                side,
                price_micros: lvl.price_micros,
            });
        }
        if lvl.volume <= 0 {
            return Err(BookError::NonPositiveVolume {
                side,
                volume: lvl.volume,
            });
        }
    }
    let sorted = levels.windows(2).all(|w| match side {
        Side::Buy => w[0].price_micros > w[1].price_micros,
        Side::Sell => w[0].price_micros < w[1].price_micros,
    });
    if !sorted {
        return Err(BookError::UnsortedLevels { side });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const M: i64 = crate::MICROS_SCALE;

    #[test]
    fn three_level_book_validates() {
        let s = Snapshot::new(
            "P",
            0,
            vec![
                Level::new(9_999 * M, 5),
                Level::new(9_998 * M, 10),
                Level::new(9_997 * M, 20),
            ],
            vec![
                Level::new(10_001 * M, 5),
                Level::new(10_002 * M, 10),
            ],
        );
        assert_eq!(s.validate_levels(), Ok(()));
        assert_eq!(s.best_bid().map(|l| l.price_micros), Some(9_999 * M));
        assert_eq!(s.best_ask().map(|l| l.price_micros), Some(10_001 * M));
    }

    #[test]
    fn unsorted_bids_rejected() {
        let s = Snapshot::new(
            "P",
            0,
            vec![Level::new(9_998 * M, 5), Level::new(9_999 * M, 5)],
            vec![Level::new(10_001 * M, 5)],
        );
        assert_eq!(
            s.validate_levels(),
            Err(BookError::UnsortedLevels { side: Side::Buy })
        );
    }

    #[test]
    fn four_levels_rejected() {
        let asks = (1..=4).map(|i| Level::new((10_000 + i) * M, 1)).collect();
        let s = Snapshot::new("P", 0, vec![Level::new(9_999 * M, 1)], asks);
        assert_eq!(
            s.validate_levels(),
            Err(BookError::TooManyLevels {
                side: Side::Sell,
                count: 4
            })
        );
    }

    #[test]
    fn zero_volume_rejected() {
        let s = Snapshot::top_of_book("P", 0, 9_999 * M, 10_001 * M, 0);
        assert_eq!(
            s.validate_levels(),
            Err(BookError::NonPositiveVolume {
                side: Side::Buy,
                volume: 0
            })
        );
    }

    #[test]
    fn side_helpers() {
        assert_eq!(Side::Buy.signed_qty(10), 10);
        assert_eq!(Side::Sell.signed_qty(10), -10);
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}
