//! Unit handling for rule decks and reports.
//!
//! Rule decks use conventional PCB units ("3.5mil", "0.2mm", "100um").
//! Everything is normalized to meters at load time; violation records
//! report micrometers.

use crate::engine::DrcError;

/// 1 mil = 1/1000 inch = 25.4 µm.
pub const METERS_PER_MIL: f64 = 25.4e-6;
pub const METERS_PER_MM: f64 = 1e-3;
pub const METERS_PER_UM: f64 = 1e-6;
pub const METERS_PER_INCH: f64 = 25.4e-3;

/// Convert meters to micrometers for reporting.
pub fn meters_to_um(m: f64) -> f64 {
    m * 1e6
}

/// Parse a unit-suffixed distance string into meters.
///
/// Accepted suffixes: `mil`, `mm`, `um`, `in`, `m`. A bare number is
/// taken as meters.
pub fn parse_distance(input: &str) -> Result<f64, DrcError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DrcError::Unit(format!("empty distance value: {input:?}")));
    }

    let split = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(split);

    let value: f64 = num_str
        .parse()
        .map_err(|_| DrcError::Unit(format!("invalid distance value: {input:?}")))?;

    let scale = match suffix.trim().to_ascii_lowercase().as_str() {
        "mil" => METERS_PER_MIL,
        "mm" => METERS_PER_MM,
        "um" | "µm" => METERS_PER_UM,
        "in" | "inch" => METERS_PER_INCH,
        "m" | "" => 1.0,
        other => {
            return Err(DrcError::Unit(format!(
                "unknown distance unit {other:?} in {input:?}"
            )))
        }
    };

    Ok(value * scale)
}
