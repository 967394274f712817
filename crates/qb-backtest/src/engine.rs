use std::collections::BTreeMap;

use qb_book::Snapshot;
use qb_portfolio::Fill;
use qb_strategy::{
    EngineConfig, HostError, OrderIntent, ParamError, StrategyEngine, StrategyHost,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::matching::{FillPrice, Liquidity};
use crate::types::{fill_rate_bps, BacktestConfig, BacktestReport, InstrumentSummary, PnlPoint};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BacktestError {
    /// Engine state is consumed by a run; build a fresh engine to replay.
    #[error("backtest engine already ran")]
    AlreadyRan,
    #[error("no strategy engines bound")]
    NoEngines,
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Param(#[from] ParamError),
}

#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    intended_qty: i64,
    filled_qty: i64,
    max_abs_position: i64,
}

#[derive(Clone, Copy, Debug)]
struct OrderOutcome {
    filled: i64,
    rejected: bool,
}

/// Replays snapshots through bound strategy engines, matches their intents
/// against the book and feeds fills back into each engine's ledger.
///
/// Pipeline per snapshot: VALIDATE -> RESTING MATCH -> STRATEGY -> IMMEDIATE MATCH -> MARK
#[derive(Debug)]
pub struct BacktestEngine {
    config: BacktestConfig,
    host: StrategyHost,
    resting: BTreeMap<String, Vec<OrderIntent>>,
    tallies: BTreeMap<String, Tally>,
    ran: bool,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            host: StrategyHost::new(),
            resting: BTreeMap::new(),
            tallies: BTreeMap::new(),
            ran: false,
        }
    }

    /// Build and bind one engine per config entry.
    pub fn from_engine_configs(
        config: BacktestConfig,
        engines: &[EngineConfig],
    ) -> Result<Self, BacktestError> {
        let mut bt = Self::new(config);
        for cfg in engines {
            bt.bind(cfg.build()?)?;
        }
        Ok(bt)
    }

    pub fn bind(&mut self, engine: StrategyEngine) -> Result<(), BacktestError> {
        self.host.bind(engine)?;
        Ok(())
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn host(&self) -> &StrategyHost {
        &self.host
    }

    /// Run the backtest over `snapshots`, expected in (timestamp, instrument)
    /// order as produced by the loader.
    ///
    /// Bad snapshots and limit-breaching fills are skipped and counted, never
    /// fatal.
    pub fn run(&mut self, snapshots: &[Snapshot]) -> Result<BacktestReport, BacktestError> {
        if self.ran {
            return Err(BacktestError::AlreadyRan);
        }
        if self.host.instruments().next().is_none() {
            return Err(BacktestError::NoEngines);
        }
        self.ran = true;

        info!(
            run = %self.config.run_name,
            snapshots = snapshots.len(),
            instruments = ?self.host.instruments().collect::<Vec<_>>(),
            rest_orders = self.config.rest_orders,
            "backtest start"
        );

        let mut report = BacktestReport {
            run_name: self.config.run_name.clone(),
            intents: Vec::new(),
            fills: Vec::new(),
            pnl_curve: Vec::new(),
            summaries: Vec::new(),
            rejected_fills: 0,
            unbound_snapshots: 0,
        };

        for snapshot in snapshots {
            self.step(snapshot, &mut report)?;
        }

        let left_resting: usize = self.resting.values().map(Vec::len).sum();
        if left_resting > 0 {
            debug!(orders = left_resting, "resting orders dropped at end of stream");
        }
        self.resting.clear();

        report.summaries = self.summaries();
        for s in &report.summaries {
            info!(
                instrument = %s.instrument,
                strategy = s.strategy,
                accepted = s.snapshots_accepted,
                skipped = s.snapshots_skipped,
                intents = s.intents_emitted,
                fills = s.fills,
                rejected_fills = s.rejected_fills,
                fill_rate_bps = s.fill_rate_bps,
                final_position = s.final_position,
                total_pnl_micros = s.total_pnl_micros,
                "backtest summary"
            );
        }
        Ok(report)
    }

    fn step(&mut self, snapshot: &Snapshot, report: &mut BacktestReport) -> Result<(), BacktestError> {
        let instrument = snapshot.instrument.as_str();
        let checked = match self.host.engine(instrument) {
            Some(engine) => engine.check_snapshot(snapshot),
            None => {
                report.unbound_snapshots += 1;
                debug!(instrument, ts = snapshot.timestamp, "no engine bound; snapshot ignored");
                return Ok(());
            }
        };

        if let Err(err) = checked {
            let cancelled = self.resting.remove(instrument).map_or(0, |v| v.len());
            // Routed anyway so the engine counts the skip.
            let routed = self.host.on_snapshot(snapshot);
            debug_assert!(routed.is_err());
            warn!(
                instrument,
                ts = snapshot.timestamp,
                reason = err.reason(),
                cancelled,
                error = %err,
                "snapshot skipped"
            );
            return Ok(());
        }

        let mut liquidity = Liquidity::from_snapshot(snapshot);

        // Resting orders live for exactly one more snapshot.
        if let Some(resting) = self.resting.remove(instrument) {
            for order in &resting {
                self.execute(
                    order,
                    order.qty,
                    FillPrice::Limit,
                    snapshot.timestamp,
                    &mut liquidity,
                    report,
                );
            }
        }

        let intents = self.host.on_snapshot(snapshot)?;
        for intent in intents {
            self.tally(instrument).intended_qty += intent.qty;
            let exec = self.execute(
                &intent,
                intent.qty,
                FillPrice::Level,
                snapshot.timestamp,
                &mut liquidity,
                report,
            );
            let remaining = intent.qty - exec.filled;
            if self.config.rest_orders && remaining > 0 && !exec.rejected {
                self.resting
                    .entry(instrument.to_string())
                    .or_default()
                    .push(OrderIntent {
                        qty: remaining,
                        ..intent.clone()
                    });
            }
            report.intents.push(intent);
        }

        if let Some(point) = self.mark(instrument, snapshot.timestamp) {
            report.pnl_curve.push(point);
        }
        Ok(())
    }

    /// Plan against the book, then apply fill by fill. The first ledger
    /// rejection cancels the rest of the order.
    fn execute(
        &mut self,
        order: &OrderIntent,
        qty: i64,
        price: FillPrice,
        timestamp: i64,
        liquidity: &mut Liquidity,
        report: &mut BacktestReport,
    ) -> OrderOutcome {
        let mut filled = 0;
        for planned in liquidity.plan(order, qty, price) {
            let fill = Fill::new(
                order.instrument.clone(),
                order.side,
                planned.qty,
                planned.price_micros,
                timestamp,
            );
            match self.host.apply_fill(&fill) {
                Ok(()) => {
                    liquidity.consume(order.side, &planned);
                    filled += planned.qty;
                    debug!(
                        instrument = %fill.instrument,
                        ts = fill.timestamp,
                        side = %fill.side,
                        price_micros = fill.price_micros,
                        qty = fill.qty,
                        "fill"
                    );
                    let position = self.position(&fill.instrument);
                    let tally = self.tally(&fill.instrument);
                    tally.filled_qty += fill.qty;
                    tally.max_abs_position = tally.max_abs_position.max(position.abs());
                    report.fills.push(fill);
                }
                Err(err) => {
                    report.rejected_fills += 1;
                    warn!(
                        instrument = %fill.instrument,
                        ts = fill.timestamp,
                        side = %fill.side,
                        qty = fill.qty,
                        position = self.position(&fill.instrument),
                        error = %err,
                        "fill rejected"
                    );
                    return OrderOutcome {
                        filled,
                        rejected: true,
                    };
                }
            }
        }
        OrderOutcome {
            filled,
            rejected: false,
        }
    }

    fn mark(&self, instrument: &str, timestamp: i64) -> Option<PnlPoint> {
        let engine = self.host.engine(instrument)?;
        let mark_micros = engine.last_touch()?.mid_micros;
        let ledger = engine.ledger();
        let realized = ledger.realized_pnl_for(instrument);
        let unrealized = ledger.unrealized_pnl_micros(instrument, mark_micros);
        Some(PnlPoint {
            timestamp,
            instrument: instrument.to_string(),
            position: engine.current_position(),
            mark_micros,
            realized_pnl_micros: realized,
            unrealized_pnl_micros: unrealized,
            total_pnl_micros: realized + unrealized,
        })
    }

    fn summaries(&self) -> Vec<InstrumentSummary> {
        self.host
            .engines()
            .map(|engine| {
                let instrument = engine.instrument();
                let c = engine.counters();
                let tally = self.tallies.get(instrument).copied().unwrap_or_default();
                let ledger = engine.ledger();
                let realized = ledger.realized_pnl_for(instrument);
                let unrealized = engine
                    .last_touch()
                    .map_or(0, |t| ledger.unrealized_pnl_micros(instrument, t.mid_micros));

                let mut s = InstrumentSummary::empty(instrument, engine.kind());
                s.snapshots_seen = c.snapshots_seen;
                s.snapshots_accepted = c.snapshots_accepted;
                s.snapshots_skipped = c.snapshots_skipped();
                s.intents_emitted = c.intents_emitted;
                s.intents_suppressed = c.intents_suppressed;
                s.intents_clamped = c.intents_clamped;
                s.intended_qty = tally.intended_qty;
                s.filled_qty = tally.filled_qty;
                s.fill_rate_bps = fill_rate_bps(tally.filled_qty, tally.intended_qty);
                s.fills = c.fills_applied;
                s.rejected_fills = c.fills_rejected;
                s.final_position = engine.current_position();
                s.max_abs_position = tally.max_abs_position;
                s.realized_pnl_micros = realized;
                s.unrealized_pnl_micros = unrealized;
                s.total_pnl_micros = realized + unrealized;
                s
            })
            .collect()
    }

    fn position(&self, instrument: &str) -> i64 {
        self.host
            .engine(instrument)
            .map_or(0, StrategyEngine::current_position)
    }

    fn tally(&mut self, instrument: &str) -> &mut Tally {
        self.tallies.entry(instrument.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_book::{Level, Side, MICROS_SCALE};
    use qb_strategy::{GateConfig, LimitPolicy, MarketMaker, MeanReversion, PricingPolicy, Strategy};

    const M: i64 = MICROS_SCALE;

    fn book(ts: i64, bid: i64, ask: i64, vol: i64) -> Snapshot {
        Snapshot::top_of_book("P", ts, bid * M, ask * M, vol)
    }

    fn mm(offset: i64, qty: i64, limit: i64) -> BacktestEngine {
        let mut bt = BacktestEngine::new(BacktestConfig::default());
        let strategy: Strategy = MarketMaker::new(offset * M, qty).into();
        bt.bind(StrategyEngine::new("P", strategy, limit)).unwrap();
        bt
    }

    #[test]
    fn resting_quotes_fill_at_limit_on_next_book() {
        let mut bt = mm(1, 10, 50);
        // mid 100 -> buy 99 / sell 101, resting (book is 99.5 / 100.5).
        let s1 = Snapshot::top_of_book("P", 1, 99_500_000, 100_500_000, 20);
        // Book drops through the buy: ask 98.
        let s2 = book(2, 97, 98, 4);
        let report = bt.run(&[s1, s2]).unwrap();

        assert_eq!(report.fills.len(), 1);
        let first = &report.fills[0];
        assert_eq!(first.side, Side::Buy);
        assert_eq!(first.price_micros, 99 * M);
        assert_eq!(first.qty, 4, "capped by ask volume");
        assert_eq!(first.timestamp, 2);
    }

    #[test]
    fn rest_orders_off_cancels_remainders() {
        let mut bt = BacktestEngine::new(BacktestConfig {
            rest_orders: false,
            ..BacktestConfig::default()
        });
        bt.bind(StrategyEngine::new("P", MarketMaker::new(M, 10).into(), 50))
            .unwrap();
        let s1 = Snapshot::top_of_book("P", 1, 99_500_000, 100_500_000, 20);
        let s2 = book(2, 97, 98, 4);
        let report = bt.run(&[s1, s2]).unwrap();
        assert!(report.fills.is_empty());
    }

    #[test]
    fn crossing_intent_fills_immediately_at_level_prices() {
        let mut bt = BacktestEngine::new(BacktestConfig::default());
        let strategy: Strategy = MeanReversion::new(2, 0, 10).unwrap().into();
        let gate = GateConfig {
            pricing: PricingPolicy::CrossSpread,
            limit: LimitPolicy::Suppress,
        };
        bt.bind(StrategyEngine::new("P", strategy, 50).with_gate(gate))
            .unwrap();

        let snaps = vec![
            book(1, 100, 102, 5),
            // mid 96 < avg 98.5: buy at the ask (97)
            Snapshot::new(
                "P",
                2,
                vec![Level::new(95 * M, 5)],
                vec![Level::new(97 * M, 3), Level::new(98 * M, 3)],
            ),
        ];
        let report = bt.run(&snaps).unwrap();
        assert_eq!(report.intents.len(), 1);
        let fills: Vec<(i64, i64)> = report
            .fills
            .iter()
            .map(|f| (f.price_micros, f.qty))
            .collect();
        // Priced at the ask; the 98 level is beyond the limit.
        assert_eq!(fills, vec![(97 * M, 3)]);
        assert_eq!(report.summary("P").unwrap().fill_rate_bps, 3_000);
    }

    #[test]
    fn pnl_point_per_accepted_snapshot() {
        let mut bt = mm(1, 10, 50);
        let snaps = vec![book(1, 99, 101, 5), book(2, 102, 101, 5), book(3, 99, 101, 5)];
        let report = bt.run(&snaps).unwrap();
        let ts: Vec<i64> = report.pnl_curve.iter().map(|p| p.timestamp).collect();
        assert_eq!(ts, vec![1, 3], "crossed book at ts=2 leaves no mark");
        let s = report.summary("P").unwrap();
        assert_eq!(s.snapshots_seen, 3);
        assert_eq!(s.snapshots_skipped, 1);
    }

    #[test]
    fn unbound_snapshots_are_counted() {
        let mut bt = mm(1, 10, 50);
        let other = Snapshot::top_of_book("Q", 1, 99 * M, 101 * M, 5);
        let report = bt.run(&[other, book(1, 99, 101, 5)]).unwrap();
        assert_eq!(report.unbound_snapshots, 1);
        assert_eq!(report.summaries.len(), 1);
    }

    #[test]
    fn second_run_is_refused() {
        let mut bt = mm(1, 10, 50);
        bt.run(&[book(1, 99, 101, 5)]).unwrap();
        assert_eq!(bt.run(&[]), Err(BacktestError::AlreadyRan));
    }

    #[test]
    fn empty_engine_set_is_refused() {
        let mut bt = BacktestEngine::new(BacktestConfig::default());
        assert_eq!(bt.run(&[]), Err(BacktestError::NoEngines));
    }
}
