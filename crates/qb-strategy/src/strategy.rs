use std::fmt;

use qb_book::Touch;

use crate::intent::Quote;
use crate::market_maker::MarketMaker;
use crate::mean_reversion::MeanReversion;
use crate::trend::TrendFollower;

/// Strategy variant identity, as named in config.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrategyKind {
    MarketMaker,
    MeanReversion,
    TrendFollower,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::MarketMaker => "market_maker",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::TrendFollower => "trend_follower",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market_maker" => Some(StrategyKind::MarketMaker),
            "mean_reversion" => Some(StrategyKind::MeanReversion),
            "trend_follower" => Some(StrategyKind::TrendFollower),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of decision rules. Dispatch is a match, not a vtable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    MarketMaker(MarketMaker),
    MeanReversion(MeanReversion),
    TrendFollower(TrendFollower),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::MarketMaker(_) => StrategyKind::MarketMaker,
            Strategy::MeanReversion(_) => StrategyKind::MeanReversion,
            Strategy::TrendFollower(_) => StrategyKind::TrendFollower,
        }
    }

    /// Feed one validated touch; returns 0..=2 raw quotes.
    pub fn on_touch(&mut self, touch: &Touch) -> Vec<Quote> {
        match self {
            Strategy::MarketMaker(s) => s.on_touch(touch),
            Strategy::MeanReversion(s) => s.on_touch(touch).into_iter().collect(),
            Strategy::TrendFollower(s) => s.on_touch(touch).into_iter().collect(),
        }
    }
}

impl From<MarketMaker> for Strategy {
    fn from(s: MarketMaker) -> Self {
        Strategy::MarketMaker(s)
    }
}

impl From<MeanReversion> for Strategy {
    fn from(s: MeanReversion) -> Self {
        Strategy::MeanReversion(s)
    }
}

impl From<TrendFollower> for Strategy {
    fn from(s: TrendFollower) -> Self {
        Strategy::TrendFollower(s)
    }
}
