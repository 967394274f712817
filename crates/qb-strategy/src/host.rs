use std::collections::BTreeMap;

use qb_book::Snapshot;
use qb_portfolio::Fill;
use thiserror::Error;

use crate::engine::{EngineError, StrategyEngine};
use crate::intent::OrderIntent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// An instrument gets exactly one engine for the whole run.
    #[error("instrument {instrument} is already bound")]
    AlreadyBound { instrument: String },
    #[error("no engine bound for instrument {instrument}")]
    UnboundInstrument { instrument: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Routes snapshots and fills to the engine bound to their instrument.
#[derive(Clone, Debug, Default)]
pub struct StrategyHost {
    engines: BTreeMap<String, StrategyEngine>,
}

impl StrategyHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an engine to its instrument. A second binding is refused.
    pub fn bind(&mut self, engine: StrategyEngine) -> Result<(), HostError> {
        let instrument = engine.instrument().to_string();
        if self.engines.contains_key(&instrument) {
            return Err(HostError::AlreadyBound { instrument });
        }
        self.engines.insert(instrument, engine);
        Ok(())
    }

    pub fn is_bound(&self, instrument: &str) -> bool {
        self.engines.contains_key(instrument)
    }

    pub fn engine(&self, instrument: &str) -> Option<&StrategyEngine> {
        self.engines.get(instrument)
    }

    /// Engines in instrument order.
    pub fn engines(&self) -> impl Iterator<Item = &StrategyEngine> {
        self.engines.values()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    pub fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<Vec<OrderIntent>, HostError> {
        let engine = self.engine_mut(&snapshot.instrument)?;
        Ok(engine.on_snapshot(snapshot)?)
    }

    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), HostError> {
        let engine = self.engine_mut(&fill.instrument)?;
        Ok(engine.apply_fill(fill)?)
    }

    fn engine_mut(&mut self, instrument: &str) -> Result<&mut StrategyEngine, HostError> {
        self.engines
            .get_mut(instrument)
            .ok_or_else(|| HostError::UnboundInstrument {
                instrument: instrument.to_string(),
            })
    }
}
