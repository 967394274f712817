//! qb-book
//!
//! Order-book snapshot schema shared by every quotebench crate.
//!
//! - `Snapshot`: up to three price levels per side for one instrument at one timestamp
//! - `Touch`: best bid / best ask / mid derived from a validated snapshot
//! - Integer micros price representation (no floats on the decision surface)
//!
//! Pure deterministic logic. No IO, no clocks.

mod price;
mod snapshot;
mod touch;

pub use price::{format_micros, price_to_micros, PriceParseError, MICROS_SCALE};
pub use snapshot::{BookError, Level, Side, Snapshot, MAX_LEVELS};
pub use touch::{resolve_touch, EmptySidePolicy, Touch};
