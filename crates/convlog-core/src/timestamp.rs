//! Conversation timestamp helpers
//!
//! The conversation API identifies messages by a string timestamp of the form
//! `"<seconds>.<micros>"`, e.g. `"1638494510.037400"`. Watermarks compare these
//! as integers of microseconds.

use crate::error::TimestampError;

const MICROS_DIGITS: usize = 6;

/// Convert an API timestamp into microseconds since the epoch.
///
/// A missing fractional part is treated as zero and a short one is
/// right-padded, so `"12.5"` is `12_500_000`.
pub fn ts_to_micros(ts: &str) -> Result<i64, TimestampError> {
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    if frac.len() > MICROS_DIGITS {
        return Err(TimestampError::TooPrecise(ts.to_string()));
    }
    let invalid = || TimestampError::Invalid(ts.to_string());
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let secs: i64 = secs.parse().map_err(|_| invalid())?;
    let micros: i64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = MICROS_DIGITS)
            .parse()
            .map_err(|_| invalid())?
    };
    secs.checked_mul(1_000_000)
        .and_then(|s| s.checked_add(micros))
        .ok_or_else(invalid)
}

/// Convert microseconds back into an API timestamp.
pub fn micros_to_ts(micros: i64) -> String {
    format!(
        "{}.{:06}",
        micros.div_euclid(1_000_000),
        micros.rem_euclid(1_000_000)
    )
}
