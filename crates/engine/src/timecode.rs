//! Time-expression grammar for comment text.
//!
//! Recognized forms, all of which may appear anywhere in free text:
//! - `12:34`, `1:02:03` (a start only)
//! - `12:34~13:10`, `12:34 - 13:10`, `12:34→13:10` (a start and an end)
//! - `12:00@1m30s`, `1:00:00 @ 2m` (a start and a length)
//!
//! Fullwidth digits, colons, letters and separators are folded to ASCII
//! before matching, so `１２：３４～１３：１０` parses like its ASCII form.
//!
//! Nothing here fails: malformed fields degrade to zero, and a range whose
//! start is zero is dropped.

use clipper_core::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{RangeEnd, RawTimeRange};

const TIME_RANGE_PATTERN: &str = concat!(
    r"[0-9]{1,2}:[0-9]{1,2}(?::[0-9]{1,2})?",
    r"(?:",
    r" *[~\-→―] *[0-9]{1,2}:[0-9]{1,2}(?::[0-9]{1,2})?",
    r"|",
    r" *@ *(?:[0-9]+[hH])?(?:[0-9]+[mM])?(?:[0-9]+[sS])?",
    r")?"
);

const RANGE_SEPARATORS: [char; 3] = ['~', '-', '→'];
const DASH_SEPARATOR: char = '―';

static TIME_RANGE_REGEX: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(TIME_RANGE_PATTERN));

/// Compile the grammar, reporting a broken pattern as a configuration error.
///
/// Call once at startup; afterwards `parse_time_ranges` can never fail.
pub fn ensure_grammar() -> AppResult<()> {
    match TIME_RANGE_REGEX.as_ref() {
        Ok(_) => Ok(()),
        Err(e) => Err(AppError::Config(format!(
            "can not compile time range grammar: {}",
            e
        ))),
    }
}

/// Extract every time range from `text`.
///
/// `max_duration` caps the length of any explicit range. Ranges starting at
/// exactly `0:00` are discarded along with unparsable ones.
pub fn parse_time_ranges(text: &str, max_duration: u64) -> Vec<RawTimeRange> {
    let regex = match TIME_RANGE_REGEX.as_ref() {
        Ok(regex) => regex,
        Err(_) => return Vec::new(),
    };

    let normalized = fold_fullwidth(text);
    regex
        .find_iter(&normalized)
        .map(|m| parse_time_range(m.as_str(), max_duration))
        .filter(|range| range.start != 0)
        .collect()
}

/// Parse one matched expression into a range.
pub fn parse_time_range(expression: &str, max_duration: u64) -> RawTimeRange {
    if let Some((start, end)) = expression.split_once(is_range_separator) {
        let start = clock_to_seconds(start);
        let end = clock_to_seconds(end);
        let end = if end < start {
            RangeEnd::Unknown
        } else if end > start.saturating_add(max_duration) {
            RangeEnd::At(start.saturating_add(max_duration))
        } else {
            RangeEnd::At(end)
        };
        return RawTimeRange { start, end };
    }

    if let Some((start, length)) = expression.split_once('@') {
        let start = clock_to_seconds(start);
        let length = duration_to_seconds(length);
        let end = if length > max_duration {
            RangeEnd::At(start.saturating_add(max_duration))
        } else if length > 0 {
            RangeEnd::At(start.saturating_add(length))
        } else {
            RangeEnd::Unknown
        };
        return RawTimeRange { start, end };
    }

    RawTimeRange {
        start: clock_to_seconds(expression),
        end: RangeEnd::Unknown,
    }
}

/// Convert `M:SS` or `H:MM:SS` into seconds; 0 when any field is not a number.
pub fn clock_to_seconds(clock: &str) -> u64 {
    let fields: Option<Vec<u64>> = clock
        .split(':')
        .map(|field| field.trim().parse::<u64>().ok())
        .collect();

    match fields.as_deref() {
        Some([minutes, seconds]) => minutes.saturating_mul(60).saturating_add(*seconds),
        Some([hours, minutes, seconds]) => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(*seconds),
        _ => {
            tracing::trace!("can not parse clock time {:?}", clock);
            0
        }
    }
}

/// Convert a compact duration (`1h2m3s`, `PT1H2M3S`, `P1DT2H`) into seconds.
///
/// Each unit is optional. Returns 0 when any component fails to parse.
pub fn duration_to_seconds(duration: &str) -> u64 {
    let rest = duration.trim();
    let rest = rest.strip_prefix('P').unwrap_or(rest);
    let rest = rest.strip_prefix('T').unwrap_or(rest);

    let components: [([char; 2], u64); 4] = [
        (['d', 'D'], 86_400),
        (['h', 'H'], 3600),
        (['m', 'M'], 60),
        (['s', 'S'], 1),
    ];

    let mut total: u64 = 0;
    let mut rest = rest;
    for (units, scale) in components {
        match peel_component(rest, units) {
            Some((value, remainder)) => {
                total = total.saturating_add(value.saturating_mul(scale));
                rest = remainder.strip_prefix('T').unwrap_or(remainder);
            }
            None => {
                tracing::trace!("can not parse duration {:?}", duration);
                return 0;
            }
        }
    }
    total
}

/// Split off the component before the first unit letter, if present.
///
/// Returns `(0, input)` when the unit does not occur, `None` when the
/// component before it is not an integer.
fn peel_component(input: &str, units: [char; 2]) -> Option<(u64, &str)> {
    match input.split_once(|c: char| units.contains(&c)) {
        Some((value, remainder)) => {
            let value = value.trim().parse::<u64>().ok()?;
            Some((value, remainder))
        }
        None => Some((0, input)),
    }
}

fn is_range_separator(c: char) -> bool {
    RANGE_SEPARATORS.contains(&c) || c == DASH_SEPARATOR
}

/// Fold fullwidth ASCII variants and the ideographic space to ASCII.
fn fold_fullwidth(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}
