use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Average requested before anything was pushed.
    #[error("price history is empty")]
    EmptyHistory,
    #[error("price history capacity must be >= 1")]
    ZeroCapacity,
}

/// Bounded window of the most recent mid-prices (micros), oldest first.
///
/// Pushing into a full window evicts the oldest entry. The running sum is
/// kept in i128 so averages and exact comparisons never overflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceHistory {
    capacity: usize,
    values: VecDeque<i64>,
    sum: i128,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: 0,
        })
    }

    pub fn push(&mut self, mid_micros: i64) {
        if self.values.len() == self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old as i128;
            }
        }
        self.values.push_back(mid_micros);
        self.sum += mid_micros as i128;
    }

    /// Arithmetic mean in micros, floor division.
    pub fn average(&self) -> Result<i64, HistoryError> {
        if self.values.is_empty() {
            return Err(HistoryError::EmptyHistory);
        }
        let avg = self.sum.div_euclid(self.values.len() as i128);
        Ok(avg as i64)
    }

    pub fn sum(&self) -> i128 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<i64> {
        self.values.back().copied()
    }

    /// Oldest to newest.
    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        self.values.iter().copied()
    }
}

/// Short and long windows fed by a single stream of mids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DualHistory {
    pub short: PriceHistory,
    pub long: PriceHistory,
}

impl DualHistory {
    pub fn new(short_capacity: usize, long_capacity: usize) -> Result<Self, HistoryError> {
        Ok(Self {
            short: PriceHistory::new(short_capacity)?,
            long: PriceHistory::new(long_capacity)?,
        })
    }

    pub fn push(&mut self, mid_micros: i64) {
        self.short.push(mid_micros);
        self.long.push(mid_micros);
    }

    pub fn short_average(&self) -> Result<i64, HistoryError> {
        self.short.average()
    }

    pub fn long_average(&self) -> Result<i64, HistoryError> {
        self.long.average()
    }

    /// Warm once the long window is full.
    pub fn is_warm(&self) -> bool {
        self.long.is_full()
    }
}
