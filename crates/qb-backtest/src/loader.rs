//! Price-table CSV loader (deterministic).
//!
//! CSV format, `;` or `,` separated (detected from the header line):
//!
//! Required columns:
//! - `timestamp`
//! - `product` (aliases: `instrument`, `symbol`)
//!
//! Optional columns:
//! - `bid_price_1..3`, `bid_volume_1..3`, `ask_price_1..3`, `ask_volume_1..3`;
//!   a missing column or an empty cell means the level is absent, and
//!   deeper levels on that side are ignored
//! - `day`; when present the timestamp becomes `day * 1_000_000 + timestamp`
//!
//! Prices are decimal strings converted to micros without floats. Volumes are
//! integers taken as absolute values (some exports sign ask volumes negative).
//! Book structure (crossed, unsorted) is not checked here.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use qb_book::{price_to_micros, Level, Snapshot, MAX_LEVELS};
use thiserror::Error;

/// Multiplier applied to `day` when building a composite timestamp.
pub const DAY_TIMESTAMP_STRIDE: i64 = 1_000_000;

const INSTRUMENT_COLUMNS: &[&str] = &["product", "instrument", "symbol"];
const BID_PRICE: [&str; MAX_LEVELS] = ["bid_price_1", "bid_price_2", "bid_price_3"];
const BID_VOLUME: [&str; MAX_LEVELS] = ["bid_volume_1", "bid_volume_2", "bid_volume_3"];
const ASK_PRICE: [&str; MAX_LEVELS] = ["ask_price_1", "ask_price_2", "ask_price_3"];
const ASK_VOLUME: [&str; MAX_LEVELS] = ["ask_volume_1", "ask_volume_2", "ask_volume_3"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("empty input")]
    EmptyInput,
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("line {line}: cannot parse {column} from '{value}'")]
    ParseField {
        line: u64,
        column: String,
        value: String,
    },
    #[error("malformed csv: {0}")]
    Csv(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

/// Load snapshots from a CSV file on disk.
pub fn load_csv_file(path: impl AsRef<Path>) -> Result<Vec<Snapshot>, LoadError> {
    let s = fs::read_to_string(path)?;
    parse_price_table(&s)
}

/// Parse snapshots from CSV content, sorted by (timestamp, instrument).
pub fn parse_price_table(text: &str) -> Result<Vec<Snapshot>, LoadError> {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(LoadError::EmptyInput)?;
    let delimiter = detect_delimiter(header_line);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let headers = rdr.headers().map_err(|e| LoadError::Csv(e.to_string()))?;
    let idx: BTreeMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_ascii_lowercase(), i))
        .collect();

    let col_ts = find_required(&idx, "timestamp")?;
    let col_inst = INSTRUMENT_COLUMNS
        .iter()
        .find_map(|c| idx.get(*c).copied())
        .ok_or(LoadError::MissingHeader("product"))?;
    let col_day = idx.get("day").copied();
    let cols = |names: &[&'static str; MAX_LEVELS]| -> [Option<usize>; MAX_LEVELS] {
        std::array::from_fn(|i| idx.get(names[i]).copied())
    };
    let bid_px = cols(&BID_PRICE);
    let bid_vol = cols(&BID_VOLUME);
    let ask_px = cols(&ASK_PRICE);
    let ask_vol = cols(&ASK_VOLUME);

    let mut out: Vec<Snapshot> = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| LoadError::Csv(e.to_string()))?;
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.iter().all(str::is_empty) {
            continue;
        }
        let cell = |c: usize| rec.get(c).unwrap_or("");

        let instrument = cell(col_inst).to_string();
        if instrument.is_empty() {
            return Err(parse_err(line, "product", ""));
        }

        let mut timestamp = parse_i64(cell(col_ts), line, "timestamp")?;
        if let Some(c) = col_day {
            let raw = cell(c);
            if !raw.is_empty() {
                let day = parse_i64(raw, line, "day")?;
                timestamp = day
                    .checked_mul(DAY_TIMESTAMP_STRIDE)
                    .and_then(|d| d.checked_add(timestamp))
                    .ok_or_else(|| parse_err(line, "day", raw))?;
            }
        }

        let bids = read_levels(&rec, line, &bid_px, &bid_vol, &BID_PRICE, &BID_VOLUME)?;
        let asks = read_levels(&rec, line, &ask_px, &ask_vol, &ASK_PRICE, &ASK_VOLUME)?;

        out.push(Snapshot::new(instrument, timestamp, bids, asks));
    }

    if out.is_empty() {
        return Err(LoadError::EmptyInput);
    }

    // Deterministic ordering: (timestamp ASC, instrument ASC); stable for equal keys.
    out.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
    Ok(out)
}

/// `;` when the header has more semicolons than commas, else `,`.
fn detect_delimiter(header_line: &str) -> u8 {
    let semis = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semis > commas {
        b';'
    } else {
        b','
    }
}

fn read_levels(
    rec: &csv::StringRecord,
    line: u64,
    px_cols: &[Option<usize>; MAX_LEVELS],
    vol_cols: &[Option<usize>; MAX_LEVELS],
    px_names: &[&'static str; MAX_LEVELS],
    vol_names: &[&'static str; MAX_LEVELS],
) -> Result<Vec<Level>, LoadError> {
    let mut levels = Vec::with_capacity(MAX_LEVELS);
    // Levels are contiguous from 1; the first absent one ends the side.
    for i in 0..MAX_LEVELS {
        let (Some(pc), Some(vc)) = (px_cols[i], vol_cols[i]) else {
            break;
        };
        let px_raw = rec.get(pc).unwrap_or("");
        let vol_raw = rec.get(vc).unwrap_or("");
        if px_raw.is_empty() || vol_raw.is_empty() {
            break;
        }
        let price_micros =
            price_to_micros(px_raw, px_names[i]).map_err(|_| parse_err(line, px_names[i], px_raw))?;
        let volume = parse_volume(vol_raw).ok_or_else(|| parse_err(line, vol_names[i], vol_raw))?;
        levels.push(Level::new(price_micros, volume));
    }
    Ok(levels)
}

/// Integer volume; a whole-valued decimal such as `30.0` is accepted.
fn parse_volume(s: &str) -> Option<i64> {
    let whole = match s.split_once('.') {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int,
        Some(_) => return None,
        None => s,
    };
    whole.parse::<i64>().ok().and_then(i64::checked_abs)
}

fn find_required(idx: &BTreeMap<String, usize>, name: &'static str) -> Result<usize, LoadError> {
    idx.get(name).copied().ok_or(LoadError::MissingHeader(name))
}

fn parse_i64(s: &str, line: u64, column: &str) -> Result<i64, LoadError> {
    s.parse::<i64>().map_err(|_| parse_err(line, column, s))
}

fn parse_err(line: u64, column: &str, value: &str) -> LoadError {
    LoadError::ParseField {
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}
