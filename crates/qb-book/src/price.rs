//! Decimal-string <-> integer-micros price conversion.
//!
//! Every price inside quotebench is an `i64` count of micros
//! (1 price unit = 1_000_000 micros). Conversion from text never touches
//! floating point; strings with more than 6 decimal places are rejected
//! rather than rounded.

use thiserror::Error;

/// Scale factor: 1 price unit = 1_000_000 micros.
pub const MICROS_SCALE: i64 = 1_000_000;

/// Errors produced when a decimal price string cannot be converted exactly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceParseError {
    #[error("price field '{field}' is empty")]
    Empty { field: &'static str },
    #[error("price field '{field}' could not be parsed: '{raw}'")]
    Invalid { field: &'static str, raw: String },
    #[error("price field '{field}' has more than 6 decimal places: '{raw}'")]
    TooManyDecimalPlaces { field: &'static str, raw: String },
}

/// Convert a decimal price string to integer micros.
///
/// Accepts an optional sign and an optional fractional part. `field` only
/// labels the error.
pub fn price_to_micros(s: &str, field: &'static str) -> Result<i64, PriceParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PriceParseError::Empty { field });
    }
    let invalid = || PriceParseError::Invalid {
        field,
        raw: s.to_string(),
    };

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }
    if frac_part.len() > 6 {
        return Err(PriceParseError::TooManyDecimalPlaces {
            field,
            raw: s.to_string(),
        });
    }

    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac_val: i64 = if frac_part.is_empty() {
        0
    } else {
        format!("{frac_part:0<6}").parse().map_err(|_| invalid())?
    };

    let micros = int_val
        .checked_mul(MICROS_SCALE)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(invalid)?;

    Ok(if negative { -micros } else { micros })
}

/// Render micros as a minimal decimal string (`9_999_500_000` -> `"9999.5"`).
pub fn format_micros(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let scale = MICROS_SCALE as u64;
    let int_part = abs / scale;
    let frac_part = abs % scale;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let frac = format!("{frac_part:06}");
    format!("{sign}{int_part}.{}", frac.trim_end_matches('0'))
}
