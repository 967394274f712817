//! Order gate: turns a raw quote into an intent, or drops it.
//!
//! Applied per quote in two steps: pricing policy, then limit policy.
//! Each side of a two-sided quote is gated on its own against the current
//! position; pending intents do not count toward the limit.

use qb_book::Touch;
use qb_portfolio::PositionLedger;

use crate::intent::Quote;

/// How a quote's price is set relative to the book.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PricingPolicy {
    /// Price exactly as the strategy proposed it.
    #[default]
    Unclamped,
    /// Clamp into `[best_bid, best_ask]`.
    ClampToBook,
    /// Buy at best ask, sell at best bid.
    CrossSpread,
}

impl PricingPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unclamped" => Some(Self::Unclamped),
            "clamp_to_book" => Some(Self::ClampToBook),
            "cross_spread" => Some(Self::CrossSpread),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclamped => "unclamped",
            Self::ClampToBook => "clamp_to_book",
            Self::CrossSpread => "cross_spread",
        }
    }

    pub fn price(&self, quote: &Quote, touch: &Touch) -> i64 {
        match self {
            Self::Unclamped => quote.price_micros,
            Self::ClampToBook => touch.clamp(quote.price_micros),
            Self::CrossSpread => touch.crossing_price(quote.side),
        }
    }
}

/// What to do with a quote that would breach the position limit if filled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LimitPolicy {
    /// Drop the side.
    #[default]
    Suppress,
    /// Shrink qty to the remaining capacity; drop only at zero.
    Clamp,
}

impl LimitPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suppress" => Some(Self::Suppress),
            "clamp" => Some(Self::Clamp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suppress => "suppress",
            Self::Clamp => "clamp",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct GateConfig {
    pub pricing: PricingPolicy,
    pub limit: LimitPolicy,
}

/// Result of gating one quote.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Pass through with the final price and qty.
    Allow { price_micros: i64, qty: i64 },
    /// Passed with a reduced qty under [`LimitPolicy::Clamp`].
    Clamped {
        price_micros: i64,
        qty: i64,
        requested_qty: i64,
    },
    /// Dropped: filling it would breach the limit.
    LimitSuppressed,
    /// Dropped: the priced result is not a valid order price.
    NonPositivePrice { price_micros: i64 },
}

pub fn gate_quote(
    cfg: &GateConfig,
    quote: &Quote,
    touch: &Touch,
    ledger: &PositionLedger,
    instrument: &str,
) -> GateDecision {
    let price_micros = cfg.pricing.price(quote, touch);
    if price_micros <= 0 {
        return GateDecision::NonPositivePrice { price_micros };
    }

    match cfg.limit {
        LimitPolicy::Suppress => {
            if ledger.would_exceed_limit(instrument, quote.side.signed_qty(quote.qty)) {
                GateDecision::LimitSuppressed
            } else {
                GateDecision::Allow {
                    price_micros,
                    qty: quote.qty,
                }
            }
        }
        LimitPolicy::Clamp => {
            let room = ledger.remaining_capacity(instrument, quote.side);
            let qty = quote.qty.min(room);
            if qty <= 0 {
                GateDecision::LimitSuppressed
            } else if qty < quote.qty {
                GateDecision::Clamped {
                    price_micros,
                    qty,
                    requested_qty: quote.qty,
                }
            } else {
                GateDecision::Allow { price_micros, qty }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_book::{Side, MICROS_SCALE};
    use qb_portfolio::Fill;

    const M: i64 = MICROS_SCALE;

    fn touch() -> Touch {
        Touch::new(9_999 * M, 10_001 * M).unwrap()
    }

    fn long_45() -> PositionLedger {
        let mut l = PositionLedger::new(50);
        l.apply_fill(&Fill::new("P", Side::Buy, 45, 10_000 * M, 0))
            .unwrap();
        l
    }

    #[test]
    fn suppress_drops_breaching_side_only() {
        let l = long_45();
        let cfg = GateConfig::default();
        let buy = Quote::buy(9_999 * M, 10);
        let sell = Quote::sell(10_001 * M, 10);
        assert_eq!(
            gate_quote(&cfg, &buy, &touch(), &l, "P"),
            GateDecision::LimitSuppressed
        );
        assert_eq!(
            gate_quote(&cfg, &sell, &touch(), &l, "P"),
            GateDecision::Allow {
                price_micros: 10_001 * M,
                qty: 10
            }
        );
    }

    #[test]
    fn clamp_shrinks_to_capacity() {
        let l = long_45();
        let cfg = GateConfig {
            limit: LimitPolicy::Clamp,
            ..GateConfig::default()
        };
        assert_eq!(
            gate_quote(&cfg, &Quote::buy(9_999 * M, 10), &touch(), &l, "P"),
            GateDecision::Clamped {
                price_micros: 9_999 * M,
                qty: 5,
                requested_qty: 10
            }
        );
    }

    #[test]
    fn pricing_modes() {
        let l = PositionLedger::new(50);
        let t = touch();
        let deep_buy = Quote::buy(9_990 * M, 10);
        let price = |pricing| match gate_quote(
            &GateConfig {
                pricing,
                ..GateConfig::default()
            },
            &deep_buy,
            &t,
            &l,
            "P",
        ) {
            GateDecision::Allow { price_micros, .. } => price_micros,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(price(PricingPolicy::Unclamped), 9_990 * M);
        assert_eq!(price(PricingPolicy::ClampToBook), 9_999 * M);
        assert_eq!(price(PricingPolicy::CrossSpread), 10_001 * M);
    }

    #[test]
    fn non_positive_price_dropped() {
        let l = PositionLedger::new(50);
        let t = Touch::new(1, 3).unwrap();
        assert_eq!(
            gate_quote(&GateConfig::default(), &Quote::buy(-5, 10), &t, &l, "P"),
            GateDecision::NonPositivePrice { price_micros: -5 }
        );
    }

    #[test]
    fn policy_names_round_trip() {
        for p in [
            PricingPolicy::Unclamped,
            PricingPolicy::ClampToBook,
            PricingPolicy::CrossSpread,
        ] {
            assert_eq!(PricingPolicy::parse(p.as_str()), Some(p));
        }
        assert_eq!(LimitPolicy::parse("CLAMP"), Some(LimitPolicy::Clamp));
        assert_eq!(LimitPolicy::parse("nope"), None);
    }
}
