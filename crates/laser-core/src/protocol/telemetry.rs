//! Inbound telemetry from the actuator board.
//!
//! The board periodically reports the distance measured by its range sensor as
//! a line of the form `DISTANCIA:<float>;`.  Anything else on the line (boot
//! banners, echo, partial writes) is noise.

use thiserror::Error;

const DISTANCE_PREFIX: &str = "DISTANCIA:";
const DISTANCE_SUFFIX: char = ';';

/// Why a telemetry line could not be parsed.
///
/// Callers on the control path discard these; they exist so tests and debug
/// logging can tell the cases apart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("line does not start with \"DISTANCIA:\"")]
    MissingPrefix,
    #[error("distance reading is missing the ';' terminator")]
    MissingTerminator,
    #[error("distance value is not a finite number: {0:?}")]
    InvalidNumber(String),
}

/// Parses one telemetry line into a distance reading.
///
/// Surrounding whitespace (including `\r`) is ignored.
///
/// # Errors
///
/// Returns a [`TelemetryError`] for any line that is not exactly
/// `DISTANCIA:<float>;`.
pub fn parse_telemetry_line(line: &str) -> Result<f32, TelemetryError> {
    let body = line
        .trim()
        .strip_prefix(DISTANCE_PREFIX)
        .ok_or(TelemetryError::MissingPrefix)?;
    let value = body
        .strip_suffix(DISTANCE_SUFFIX)
        .ok_or(TelemetryError::MissingTerminator)?
        .trim();
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(TelemetryError::InvalidNumber(value.to_string())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
