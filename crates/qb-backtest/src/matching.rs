//! Book-matching fill model.
//!
//! Liquidity is the visible volume of one snapshot. Every execution against
//! it consumes volume, so two orders on the same snapshot cannot both take
//! the same level.

use qb_book::{Level, Side, Snapshot};
use qb_strategy::OrderIntent;

/// Which price an execution prints at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillPrice {
    /// The order's own limit. Used for resting orders hit by a later book.
    Limit,
    /// The book level's price. Used for orders crossing on emission.
    Level,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub price_micros: i64,
    pub qty: i64,
    /// (level index, qty taken) on the opposite side.
    takes: Vec<(usize, i64)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Liquidity {
    bids: Vec<Level>,
    asks: Vec<Level>,
}

impl Liquidity {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            bids: snapshot.bids.clone(),
            asks: snapshot.asks.clone(),
        }
    }

    fn levels(&self, order_side: Side) -> &[Level] {
        match order_side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    fn levels_mut(&mut self, order_side: Side) -> &mut [Level] {
        match order_side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        }
    }

    /// Remaining volume the order could take within its limit.
    pub fn available(&self, intent: &OrderIntent) -> i64 {
        self.levels(intent.side)
            .iter()
            .filter(|l| intent.is_marketable_at(l.price_micros))
            .map(|l| l.volume)
            .sum()
    }

    /// Plan executions for up to `qty` of `intent`, walking levels from the
    /// touch outward. Nothing is consumed until [`Liquidity::consume`].
    ///
    /// `FillPrice::Limit` yields at most one execution; `FillPrice::Level`
    /// yields one per level touched.
    pub fn plan(&self, intent: &OrderIntent, qty: i64, price: FillPrice) -> Vec<Execution> {
        let mut remaining = qty;
        let mut per_level: Vec<Execution> = Vec::new();
        for (i, level) in self.levels(intent.side).iter().enumerate() {
            if remaining <= 0 {
                break;
            }
            // Levels are sorted away from the touch.
            if !intent.is_marketable_at(level.price_micros) {
                break;
            }
            let take = remaining.min(level.volume);
            if take <= 0 {
                continue;
            }
            remaining -= take;
            per_level.push(Execution {
                price_micros: level.price_micros,
                qty: take,
                takes: vec![(i, take)],
            });
        }

        match price {
            FillPrice::Level => per_level,
            FillPrice::Limit => {
                if per_level.is_empty() {
                    return Vec::new();
                }
                let qty = per_level.iter().map(|e| e.qty).sum();
                let takes = per_level.into_iter().flat_map(|e| e.takes).collect();
                vec![Execution {
                    price_micros: intent.price_micros,
                    qty,
                    takes,
                }]
            }
        }
    }

    /// Remove an accepted execution's volume from the book.
    pub fn consume(&mut self, order_side: Side, execution: &Execution) {
        let levels = self.levels_mut(order_side);
        for &(i, take) in &execution.takes {
            if let Some(level) = levels.get_mut(i) {
                level.volume = (level.volume - take).max(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_book::MICROS_SCALE;

    const M: i64 = MICROS_SCALE;

    fn snap() -> Snapshot {
        Snapshot::new(
            "P",
            1,
            vec![Level::new(99 * M, 5), Level::new(98 * M, 10)],
            vec![Level::new(101 * M, 4), Level::new(102 * M, 6), Level::new(104 * M, 50)],
        )
    }

    fn intent(side: Side, price: i64, qty: i64) -> OrderIntent {
        OrderIntent {
            instrument: "P".into(),
            side,
            price_micros: price * M,
            qty,
            timestamp: 0,
        }
    }

    #[test]
    fn level_pricing_walks_marketable_levels() {
        let liq = Liquidity::from_snapshot(&snap());
        let ex = liq.plan(&intent(Side::Buy, 102, 20), 20, FillPrice::Level);
        let got: Vec<(i64, i64)> = ex.iter().map(|e| (e.price_micros, e.qty)).collect();
        assert_eq!(got, vec![(101 * M, 4), (102 * M, 6)]);
    }

    #[test]
    fn limit_pricing_aggregates_at_order_price() {
        let liq = Liquidity::from_snapshot(&snap());
        let ex = liq.plan(&intent(Side::Sell, 98, 12), 12, FillPrice::Limit);
        assert_eq!(ex.len(), 1);
        assert_eq!(ex[0].price_micros, 98 * M);
        assert_eq!(ex[0].qty, 12);
    }

    #[test]
    fn non_marketable_order_gets_nothing() {
        let liq = Liquidity::from_snapshot(&snap());
        assert!(liq.plan(&intent(Side::Buy, 100, 5), 5, FillPrice::Level).is_empty());
        assert!(liq.plan(&intent(Side::Sell, 100, 5), 5, FillPrice::Limit).is_empty());
        assert_eq!(liq.available(&intent(Side::Buy, 100, 5)), 0);
    }

    #[test]
    fn consumed_volume_is_not_reused() {
        let mut liq = Liquidity::from_snapshot(&snap());
        let buy = intent(Side::Buy, 101, 3);
        let ex = liq.plan(&buy, 3, FillPrice::Level);
        liq.consume(Side::Buy, &ex[0]);
        assert_eq!(liq.available(&buy), 1);

        let ex = liq.plan(&buy, 3, FillPrice::Level);
        assert_eq!(ex[0].qty, 1);
        liq.consume(Side::Buy, &ex[0]);
        assert!(liq.plan(&buy, 3, FillPrice::Level).is_empty());
    }
}
