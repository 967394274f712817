use qb_book::{resolve_touch, BookError, EmptySidePolicy, Snapshot, Touch};
use qb_portfolio::{Fill, LedgerError, PositionLedger};
use thiserror::Error;
use tracing::debug;

use crate::gate::{gate_quote, GateConfig, GateDecision};
use crate::intent::OrderIntent;
use crate::strategy::{Strategy, StrategyKind};

/// Why a snapshot or fill was refused by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine bound to {expected} received {got}")]
    InstrumentMismatch { expected: String, got: String },
    /// Timestamps must strictly increase per instrument.
    #[error("out-of-order snapshot: timestamp {got} after {last}")]
    OutOfOrder { last: i64, got: i64 },
    #[error(transparent)]
    Book(#[from] BookError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// Stable short label used in counters and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::InstrumentMismatch { .. } => "instrument_mismatch",
            EngineError::OutOfOrder { .. } => "out_of_order",
            EngineError::Book(BookError::CrossedBook { .. }) => "crossed_book",
            EngineError::Book(BookError::EmptySide { .. }) => "empty_side",
            EngineError::Book(_) => "invalid_levels",
            EngineError::Ledger(LedgerError::LimitExceeded { .. }) => "limit_exceeded",
            EngineError::Ledger(_) => "invalid_fill",
        }
    }
}

/// Per-engine activity counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineCounters {
    pub snapshots_seen: u64,
    pub snapshots_accepted: u64,
    pub skipped_crossed: u64,
    pub skipped_empty_side: u64,
    pub skipped_invalid_levels: u64,
    pub skipped_out_of_order: u64,
    pub skipped_instrument_mismatch: u64,
    pub intents_emitted: u64,
    /// Quotes dropped by the limit gate or for a non-positive price.
    pub intents_suppressed: u64,
    /// Intents emitted with a qty reduced to the remaining capacity.
    pub intents_clamped: u64,
    pub fills_applied: u64,
    pub fills_rejected: u64,
}

impl EngineCounters {
    pub fn snapshots_skipped(&self) -> u64 {
        self.skipped_crossed
            + self.skipped_empty_side
            + self.skipped_invalid_levels
            + self.skipped_out_of_order
            + self.skipped_instrument_mismatch
    }

    fn record_skip(&mut self, err: &EngineError) {
        match err {
            EngineError::InstrumentMismatch { .. } => self.skipped_instrument_mismatch += 1,
            EngineError::OutOfOrder { .. } => self.skipped_out_of_order += 1,
            EngineError::Book(BookError::CrossedBook { .. }) => self.skipped_crossed += 1,
            EngineError::Book(BookError::EmptySide { .. }) => self.skipped_empty_side += 1,
            EngineError::Book(_) => self.skipped_invalid_levels += 1,
            EngineError::Ledger(_) => {}
        }
    }
}

/// One instrument, one strategy, one ledger, one gate for the whole run.
///
/// Every snapshot is validated (instrument, ordering, book) before any state
/// is touched; a refused snapshot leaves history, ledger and ordering state
/// exactly as they were.
#[derive(Clone, Debug)]
pub struct StrategyEngine {
    instrument: String,
    strategy: Strategy,
    ledger: PositionLedger,
    gate: GateConfig,
    empty_side: EmptySidePolicy,
    last_timestamp: Option<i64>,
    last_touch: Option<Touch>,
    counters: EngineCounters,
}

impl StrategyEngine {
    pub fn new(instrument: impl Into<String>, strategy: Strategy, position_limit: i64) -> Self {
        Self {
            instrument: instrument.into(),
            strategy,
            ledger: PositionLedger::new(position_limit),
            gate: GateConfig::default(),
            empty_side: EmptySidePolicy::default(),
            last_timestamp: None,
            last_touch: None,
            counters: EngineCounters::default(),
        }
    }

    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_empty_side(mut self, empty_side: EmptySidePolicy) -> Self {
        self.empty_side = empty_side;
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn gate(&self) -> GateConfig {
        self.gate
    }

    pub fn empty_side(&self) -> EmptySidePolicy {
        self.empty_side
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Touch of the most recently accepted snapshot.
    pub fn last_touch(&self) -> Option<Touch> {
        self.last_touch
    }

    pub fn current_position(&self) -> i64 {
        self.ledger.current_position(&self.instrument)
    }

    /// Evaluate one snapshot.
    ///
    /// # Errors
    /// The snapshot is skipped (and counted) on any [`EngineError`]; no
    /// engine state other than the counters changes.
    pub fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<Vec<OrderIntent>, EngineError> {
        self.counters.snapshots_seen += 1;
        let touch = match self.check_snapshot(snapshot) {
            Ok(t) => t,
            Err(e) => {
                self.counters.record_skip(&e);
                return Err(e);
            }
        };

        self.counters.snapshots_accepted += 1;
        self.last_timestamp = Some(snapshot.timestamp);
        self.last_touch = Some(touch);

        let quotes = self.strategy.on_touch(&touch);
        let mut intents = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let decision = gate_quote(&self.gate, &quote, &touch, &self.ledger, &self.instrument);
            let (price_micros, qty) = match decision {
                GateDecision::Allow { price_micros, qty } => (price_micros, qty),
                GateDecision::Clamped {
                    price_micros,
                    qty,
                    requested_qty,
                } => {
                    self.counters.intents_clamped += 1;
                    debug!(
                        instrument = %self.instrument,
                        side = %quote.side,
                        requested_qty,
                        qty,
                        "intent qty clamped to position capacity"
                    );
                    (price_micros, qty)
                }
                GateDecision::LimitSuppressed | GateDecision::NonPositivePrice { .. } => {
                    self.counters.intents_suppressed += 1;
                    debug!(
                        instrument = %self.instrument,
                        side = %quote.side,
                        position = self.current_position(),
                        ?decision,
                        "intent suppressed"
                    );
                    continue;
                }
            };

            let intent = OrderIntent {
                instrument: self.instrument.clone(),
                side: quote.side,
                price_micros,
                qty,
                timestamp: snapshot.timestamp,
            };
            debug!(
                instrument = %intent.instrument,
                ts = intent.timestamp,
                side = %intent.side,
                price_micros = intent.price_micros,
                qty = intent.qty,
                "intent"
            );
            self.counters.intents_emitted += 1;
            intents.push(intent);
        }
        Ok(intents)
    }

    /// Forward a confirmed fill to the ledger.
    ///
    /// A fill that would breach the limit is refused and counted; the
    /// position does not move.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), EngineError> {
        let res = if fill.instrument != self.instrument {
            Err(EngineError::InstrumentMismatch {
                expected: self.instrument.clone(),
                got: fill.instrument.clone(),
            })
        } else {
            self.ledger.apply_fill(fill).map_err(EngineError::from)
        };
        match res {
            Ok(()) => self.counters.fills_applied += 1,
            Err(_) => self.counters.fills_rejected += 1,
        }
        res
    }

    /// Validation half of [`StrategyEngine::on_snapshot`]: instrument,
    /// ordering, then book. Never mutates.
    pub fn check_snapshot(&self, snapshot: &Snapshot) -> Result<Touch, EngineError> {
        if snapshot.instrument != self.instrument {
            return Err(EngineError::InstrumentMismatch {
                expected: self.instrument.clone(),
                got: snapshot.instrument.clone(),
            });
        }
        if let Some(last) = self.last_timestamp {
            if snapshot.timestamp <= last {
                return Err(EngineError::OutOfOrder {
                    last,
                    got: snapshot.timestamp,
                });
            }
        }
        Ok(resolve_touch(snapshot, self.empty_side)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MarketMaker, MeanReversion};
    use qb_book::{Side, MICROS_SCALE};

    const M: i64 = MICROS_SCALE;

    fn mm_engine() -> StrategyEngine {
        StrategyEngine::new("PRODUCT1", MarketMaker::new(M, 10).into(), 50)
    }

    fn book(ts: i64, bid: i64, ask: i64) -> Snapshot {
        Snapshot::top_of_book("PRODUCT1", ts, bid * M, ask * M, 20)
    }

    #[test]
    fn market_maker_quotes_both_sides() {
        let mut e = mm_engine();
        let intents = e.on_snapshot(&book(1, 9_999, 10_001)).unwrap();
        assert_eq!(
            intents,
            vec![
                OrderIntent {
                    instrument: "PRODUCT1".into(),
                    side: Side::Buy,
                    price_micros: 9_999 * M,
                    qty: 10,
                    timestamp: 1
                },
                OrderIntent {
                    instrument: "PRODUCT1".into(),
                    side: Side::Sell,
                    price_micros: 10_001 * M,
                    qty: 10,
                    timestamp: 1
                },
            ]
        );
        assert_eq!(e.counters().intents_emitted, 2);
    }

    #[test]
    fn crossed_snapshot_leaves_state_untouched() {
        let mut e = StrategyEngine::new("PRODUCT1", MeanReversion::new(10, M, 10).unwrap().into(), 50);
        e.on_snapshot(&book(1, 9_999, 10_001)).unwrap();
        let before = e.strategy().clone();

        let err = e.on_snapshot(&book(2, 10_002, 10_001)).unwrap_err();
        assert_eq!(err.reason(), "crossed_book");
        assert_eq!(e.strategy(), &before);
        assert_eq!(e.counters().skipped_crossed, 1);
        // The crossed timestamp was not consumed.
        assert!(e.on_snapshot(&book(2, 9_999, 10_001)).is_ok());
    }

    #[test]
    fn out_of_order_and_mismatch_are_skipped() {
        let mut e = mm_engine();
        e.on_snapshot(&book(5, 9_999, 10_001)).unwrap();
        assert_eq!(
            e.on_snapshot(&book(5, 9_999, 10_001)),
            Err(EngineError::OutOfOrder { last: 5, got: 5 })
        );
        let other = Snapshot::top_of_book("PRODUCT2", 6, 9_999 * M, 10_001 * M, 1);
        assert!(matches!(
            e.on_snapshot(&other),
            Err(EngineError::InstrumentMismatch { .. })
        ));
        let c = e.counters();
        assert_eq!(c.snapshots_seen, 3);
        assert_eq!(c.snapshots_accepted, 1);
        assert_eq!(c.snapshots_skipped(), 2);
    }

    #[test]
    fn breaching_side_suppressed_other_side_quoted() {
        let mut e = mm_engine();
        e.apply_fill(&Fill::new("PRODUCT1", Side::Buy, 45, 9_999 * M, 0))
            .unwrap();
        let intents = e.on_snapshot(&book(1, 9_999, 10_001)).unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].side, Side::Sell);
        assert_eq!(e.counters().intents_suppressed, 1);
    }

    #[test]
    fn rejected_fill_counted() {
        let mut e = mm_engine();
        e.apply_fill(&Fill::new("PRODUCT1", Side::Buy, 45, 9_999 * M, 0))
            .unwrap();
        let err = e
            .apply_fill(&Fill::new("PRODUCT1", Side::Buy, 10, 9_999 * M, 1))
            .unwrap_err();
        assert_eq!(err.reason(), "limit_exceeded");
        assert_eq!(e.current_position(), 45);
        assert_eq!(e.counters().fills_rejected, 1);
        assert_eq!(e.counters().fills_applied, 1);
    }
}
