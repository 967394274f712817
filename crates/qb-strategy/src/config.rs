//! Engine configuration read from the canonical config JSON (see qb-config).
//!
//! ```yaml
//! defaults:
//!   position_limit: 50
//!   order_quantity: 10
//!   pricing: unclamped          # clamp_to_book | cross_spread
//!   limit_policy: suppress      # clamp
//!   empty_side: skip            # fallback | { fallback: { bid: 9995, ask: 10005 } }
//! instruments:
//!   PRODUCT1: { strategy: market_maker, spread_offset: 1 }
//!   PRODUCT2: { strategy: mean_reversion, window: 10, threshold: 1 }
//!   PRODUCT3: { strategy: trend_follower, short_window: 5, long_window: 20 }
//! ```
//!
//! Any `defaults` key may be overridden inside an instrument entry.

use anyhow::{anyhow, bail, Context, Result};
use qb_book::{price_to_micros, EmptySidePolicy, MICROS_SCALE};
use qb_portfolio::DEFAULT_POSITION_LIMIT;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::StrategyEngine;
use crate::gate::{GateConfig, LimitPolicy, PricingPolicy};
use crate::history::HistoryError;
use crate::market_maker::MarketMaker;
use crate::mean_reversion::MeanReversion;
use crate::strategy::{Strategy, StrategyKind};
use crate::trend::TrendFollower;

pub const DEFAULT_ORDER_QUANTITY: i64 = 10;
pub const DEFAULT_SPREAD_OFFSET_MICROS: i64 = MICROS_SCALE;
pub const DEFAULT_MEAN_REVERSION_WINDOW: usize = 10;
pub const DEFAULT_MEAN_REVERSION_THRESHOLD_MICROS: i64 = MICROS_SCALE;
pub const DEFAULT_TREND_SHORT_WINDOW: usize = 5;
pub const DEFAULT_TREND_LONG_WINDOW: usize = 20;
pub const DEFAULT_FALLBACK_BID_MICROS: i64 = 9_995 * MICROS_SCALE;
pub const DEFAULT_FALLBACK_ASK_MICROS: i64 = 10_005 * MICROS_SCALE;

/// Keys shared by `defaults` and every instrument entry.
const SHARED_KEYS: &[&str] = &[
    "position_limit",
    "order_quantity",
    "pricing",
    "limit_policy",
    "empty_side",
];

/// Invalid strategy parameters, caught before an engine exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("order_quantity must be > 0, got {0}")]
    NonPositiveQuantity(i64),
    #[error("spread_offset must be >= 0, got {0} micros")]
    NegativeSpreadOffset(i64),
    #[error("threshold must be >= 0, got {0} micros")]
    NegativeThreshold(i64),
    #[error("position_limit must be >= 0, got {0}")]
    NegativePositionLimit(i64),
    #[error("short_window ({short}) must be < long_window ({long})")]
    WindowOrder { short: usize, long: usize },
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Variant-specific tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyParams {
    MarketMaker {
        spread_offset_micros: i64,
    },
    MeanReversion {
        window: usize,
        threshold_micros: i64,
    },
    TrendFollower {
        short_window: usize,
        long_window: usize,
    },
}

impl StrategyParams {
    pub fn defaults_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::MarketMaker => StrategyParams::MarketMaker {
                spread_offset_micros: DEFAULT_SPREAD_OFFSET_MICROS,
            },
            StrategyKind::MeanReversion => StrategyParams::MeanReversion {
                window: DEFAULT_MEAN_REVERSION_WINDOW,
                threshold_micros: DEFAULT_MEAN_REVERSION_THRESHOLD_MICROS,
            },
            StrategyKind::TrendFollower => StrategyParams::TrendFollower {
                short_window: DEFAULT_TREND_SHORT_WINDOW,
                long_window: DEFAULT_TREND_LONG_WINDOW,
            },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyParams::MarketMaker { .. } => StrategyKind::MarketMaker,
            StrategyParams::MeanReversion { .. } => StrategyKind::MeanReversion,
            StrategyParams::TrendFollower { .. } => StrategyKind::TrendFollower,
        }
    }

    fn keys(kind: StrategyKind) -> &'static [&'static str] {
        match kind {
            StrategyKind::MarketMaker => &["spread_offset"],
            StrategyKind::MeanReversion => &["window", "threshold"],
            StrategyKind::TrendFollower => &["short_window", "long_window"],
        }
    }
}

/// Everything needed to build one [`StrategyEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub instrument: String,
    pub params: StrategyParams,
    pub order_quantity: i64,
    pub position_limit: i64,
    pub gate: GateConfig,
    pub empty_side: EmptySidePolicy,
}

impl EngineConfig {
    /// Built-in defaults for `kind` on `instrument`.
    pub fn new(instrument: impl Into<String>, kind: StrategyKind) -> Self {
        Self {
            instrument: instrument.into(),
            params: StrategyParams::defaults_for(kind),
            order_quantity: DEFAULT_ORDER_QUANTITY,
            position_limit: DEFAULT_POSITION_LIMIT,
            gate: GateConfig::default(),
            empty_side: EmptySidePolicy::default(),
        }
    }

    /// Build one config per entry under `/instruments`, in instrument order.
    pub fn from_config_json(cfg: &Value) -> Result<Vec<Self>> {
        let empty = Map::new();
        let defaults = match cfg.pointer("/defaults") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(m)) => m,
            Some(_) => bail!("defaults must be a mapping"),
        };

        let instruments = cfg
            .pointer("/instruments")
            .and_then(Value::as_object)
            .context("config missing instruments mapping")?;
        if instruments.is_empty() {
            bail!("instruments mapping is empty");
        }

        instruments
            .iter()
            .map(|(name, entry)| {
                let entry = entry
                    .as_object()
                    .with_context(|| format!("instruments.{name} must be a mapping"))?;
                Self::from_entry(name, entry, defaults)
                    .with_context(|| format!("invalid config for instrument {name}"))
            })
            .collect()
    }

    /// JSON-pointer leaves read by [`EngineConfig::from_config_json`] for `cfg`.
    pub fn consumed_pointers(cfg: &Value) -> Vec<String> {
        let mut out: Vec<String> = SHARED_KEYS
            .iter()
            .map(|k| format!("/defaults/{k}"))
            .collect();
        let Some(instruments) = cfg.pointer("/instruments").and_then(Value::as_object) else {
            return out;
        };
        for (name, entry) in instruments {
            let token = name.replace('~', "~0").replace('/', "~1");
            out.push(format!("/instruments/{token}/strategy"));
            for k in SHARED_KEYS {
                out.push(format!("/instruments/{token}/{k}"));
            }
            let kind = entry
                .get("strategy")
                .and_then(Value::as_str)
                .and_then(StrategyKind::parse);
            if let Some(kind) = kind {
                for k in StrategyParams::keys(kind) {
                    out.push(format!("/instruments/{token}/{k}"));
                }
            }
        }
        out
    }

    fn from_entry(name: &str, entry: &Map<String, Value>, defaults: &Map<String, Value>) -> Result<Self> {
        let kind_raw = entry
            .get("strategy")
            .and_then(Value::as_str)
            .context("missing strategy")?;
        let kind = StrategyKind::parse(kind_raw)
            .ok_or_else(|| anyhow!("unknown strategy '{kind_raw}'"))?;

        let mut c = Self::new(name, kind);
        let shared = |key: &str| entry.get(key).or_else(|| defaults.get(key));

        if let Some(v) = shared("position_limit") {
            c.position_limit = parse_int(v).context("position_limit")?;
        }
        if let Some(v) = shared("order_quantity") {
            c.order_quantity = parse_int(v).context("order_quantity")?;
        }
        if let Some(v) = shared("pricing") {
            let s = v.as_str().context("pricing must be a string")?;
            c.gate.pricing =
                PricingPolicy::parse(s).ok_or_else(|| anyhow!("unknown pricing '{s}'"))?;
        }
        if let Some(v) = shared("limit_policy") {
            let s = v.as_str().context("limit_policy must be a string")?;
            c.gate.limit =
                LimitPolicy::parse(s).ok_or_else(|| anyhow!("unknown limit_policy '{s}'"))?;
        }
        if let Some(v) = shared("empty_side") {
            c.empty_side = parse_empty_side(v).context("empty_side")?;
        }

        match &mut c.params {
            StrategyParams::MarketMaker {
                spread_offset_micros,
            } => {
                if let Some(v) = entry.get("spread_offset") {
                    *spread_offset_micros = parse_price(v, "spread_offset")?;
                }
            }
            StrategyParams::MeanReversion {
                window,
                threshold_micros,
            } => {
                if let Some(v) = entry.get("window") {
                    *window = parse_window(v).context("window")?;
                }
                if let Some(v) = entry.get("threshold") {
                    *threshold_micros = parse_price(v, "threshold")?;
                }
            }
            StrategyParams::TrendFollower {
                short_window,
                long_window,
            } => {
                if let Some(v) = entry.get("short_window") {
                    *short_window = parse_window(v).context("short_window")?;
                }
                if let Some(v) = entry.get("long_window") {
                    *long_window = parse_window(v).context("long_window")?;
                }
            }
        }

        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.order_quantity <= 0 {
            return Err(ParamError::NonPositiveQuantity(self.order_quantity));
        }
        if self.position_limit < 0 {
            return Err(ParamError::NegativePositionLimit(self.position_limit));
        }
        match self.params {
            StrategyParams::MarketMaker {
                spread_offset_micros,
            } if spread_offset_micros < 0 => {
                Err(ParamError::NegativeSpreadOffset(spread_offset_micros))
            }
            StrategyParams::MeanReversion { window: 0, .. } => Err(HistoryError::ZeroCapacity.into()),
            StrategyParams::MeanReversion {
                threshold_micros, ..
            } if threshold_micros < 0 => Err(ParamError::NegativeThreshold(threshold_micros)),
            StrategyParams::TrendFollower { short_window: 0, .. } => {
                Err(HistoryError::ZeroCapacity.into())
            }
            StrategyParams::TrendFollower {
                short_window,
                long_window,
            } if short_window >= long_window => Err(ParamError::WindowOrder {
                short: short_window,
                long: long_window,
            }),
            _ => Ok(()),
        }
    }

    /// Construct the engine this config describes.
    pub fn build(&self) -> Result<StrategyEngine, ParamError> {
        self.validate()?;
        let q = self.order_quantity;
        let strategy: Strategy = match self.params {
            StrategyParams::MarketMaker {
                spread_offset_micros,
            } => MarketMaker::new(spread_offset_micros, q).into(),
            StrategyParams::MeanReversion {
                window,
                threshold_micros,
            } => MeanReversion::new(window, threshold_micros, q)?.into(),
            StrategyParams::TrendFollower {
                short_window,
                long_window,
            } => TrendFollower::new(short_window, long_window, q)?.into(),
        };
        Ok(
            StrategyEngine::new(self.instrument.clone(), strategy, self.position_limit)
                .with_gate(self.gate)
                .with_empty_side(self.empty_side),
        )
    }
}

/// Integer from a JSON number or numeric string.
fn parse_int(v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => n.as_i64().ok_or_else(|| anyhow!("expected an integer, got {n}")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .with_context(|| format!("expected an integer, got '{s}'")),
        other => bail!("expected an integer, got {other}"),
    }
}

fn parse_window(v: &Value) -> Result<usize> {
    let n = parse_int(v)?;
    usize::try_from(n).map_err(|_| anyhow!("window must be >= 0, got {n}"))
}

/// Price in micros from a JSON number or decimal string.
fn parse_price(v: &Value, field: &'static str) -> Result<i64> {
    match v {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i
                .checked_mul(MICROS_SCALE)
                .ok_or_else(|| anyhow!("{field} out of range: {i}")),
            None => Ok(price_to_micros(&n.to_string(), field)?),
        },
        Value::String(s) => Ok(price_to_micros(s, field)?),
        other => bail!("{field} must be a number or decimal string, got {other}"),
    }
}

fn parse_empty_side(v: &Value) -> Result<EmptySidePolicy> {
    let fallback = |bid, ask| EmptySidePolicy::Fallback {
        bid_micros: bid,
        ask_micros: ask,
    };
    match v {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(EmptySidePolicy::Skip),
            "fallback" => Ok(fallback(DEFAULT_FALLBACK_BID_MICROS, DEFAULT_FALLBACK_ASK_MICROS)),
            other => bail!("unknown empty_side '{other}'"),
        },
        Value::Object(m) => {
            let fb = m
                .get("fallback")
                .and_then(Value::as_object)
                .context("expected { fallback: { bid, ask } }")?;
            let bid = match fb.get("bid") {
                Some(b) => parse_price(b, "fallback.bid")?,
                None => DEFAULT_FALLBACK_BID_MICROS,
            };
            let ask = match fb.get("ask") {
                Some(a) => parse_price(a, "fallback.ask")?,
                None => DEFAULT_FALLBACK_ASK_MICROS,
            };
            if bid >= ask {
                bail!("fallback bid must be below fallback ask");
            }
            Ok(fallback(bid, ask))
        }
        other => bail!("unsupported empty_side value {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const M: i64 = MICROS_SCALE;

    #[test]
    fn defaults_apply_and_instruments_override() {
        let cfg = json!({
            "defaults": { "position_limit": 40, "limit_policy": "clamp" },
            "instruments": {
                "PRODUCT1": { "strategy": "market_maker", "spread_offset": "0.5" },
                "PRODUCT2": { "strategy": "mean_reversion", "position_limit": 20 }
            }
        });
        let cs = EngineConfig::from_config_json(&cfg).unwrap();
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].instrument, "PRODUCT1");
        assert_eq!(
            cs[0].params,
            StrategyParams::MarketMaker {
                spread_offset_micros: M / 2
            }
        );
        assert_eq!(cs[0].position_limit, 40);
        assert_eq!(cs[0].gate.limit, LimitPolicy::Clamp);
        assert_eq!(cs[1].position_limit, 20);
        assert_eq!(
            cs[1].params,
            StrategyParams::MeanReversion {
                window: 10,
                threshold_micros: M
            }
        );
        assert_eq!(cs[1].order_quantity, 10);
    }

    #[test]
    fn fallback_forms() {
        assert_eq!(
            parse_empty_side(&json!("fallback")).unwrap(),
            EmptySidePolicy::Fallback {
                bid_micros: 9_995 * M,
                ask_micros: 10_005 * M
            }
        );
        assert_eq!(
            parse_empty_side(&json!({ "fallback": { "bid": 99.5, "ask": "100.5" } })).unwrap(),
            EmptySidePolicy::Fallback {
                bid_micros: 99_500_000,
                ask_micros: 100_500_000
            }
        );
        assert!(parse_empty_side(&json!("maybe")).is_err());
    }

    #[test]
    fn bad_parameters_rejected() {
        let bad_windows = json!({ "instruments": {
            "P": { "strategy": "trend_follower", "short_window": 20, "long_window": 5 }
        }});
        assert!(EngineConfig::from_config_json(&bad_windows).is_err());

        let unknown = json!({ "instruments": { "P": { "strategy": "arbitrage" } } });
        assert!(EngineConfig::from_config_json(&unknown).is_err());

        let zero_qty = json!({ "instruments": {
            "P": { "strategy": "market_maker", "order_quantity": 0 }
        }});
        assert!(EngineConfig::from_config_json(&zero_qty).is_err());

        assert!(EngineConfig::from_config_json(&json!({})).is_err());
    }

    #[test]
    fn consumed_pointers_follow_strategy_kind() {
        let cfg = json!({ "instruments": {
            "PRODUCT3": { "strategy": "trend_follower" }
        }});
        let ptrs = EngineConfig::consumed_pointers(&cfg);
        assert!(ptrs.contains(&"/instruments/PRODUCT3/long_window".to_string()));
        assert!(!ptrs.contains(&"/instruments/PRODUCT3/spread_offset".to_string()));
        assert!(ptrs.contains(&"/defaults/pricing".to_string()));
    }

    #[test]
    fn build_wires_gate_and_kind() {
        let mut c = EngineConfig::new("P", StrategyKind::TrendFollower);
        c.gate.pricing = PricingPolicy::CrossSpread;
        let e = c.build().unwrap();
        assert_eq!(e.kind(), StrategyKind::TrendFollower);
        assert_eq!(e.gate().pricing, PricingPolicy::CrossSpread);
        assert_eq!(e.ledger().position_limit(), 50);
    }
}
