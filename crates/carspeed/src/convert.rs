//! Raw speed to display unit conversion.

use crate::error::{Error, Result};
use crate::property::RawValue;

/// Multiplier from the platform speed unit to the display unit.
///
/// Kept as the literal the platform integration has always used; it is the
/// `f32` closest to 3.6 (m/s to km/h).
#[allow(clippy::excessive_precision)]
pub const KM_MULTIPLIER: f32 = 3.599_999_87;

/// Convert a raw speed into an integer display speed.
///
/// The reading is rounded to the nearest whole unit first (halves go up,
/// so `-2.5` becomes `-2`), then scaled and truncated toward zero. The
/// arithmetic is done in `f32`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn convert(raw: f32) -> i32 {
    (round_half_up(raw) * KM_MULTIPLIER) as i32
}

// `f32::round` sends halves away from zero; readings round halves up.
fn round_half_up(raw: f32) -> f32 {
    let floor = raw.floor();
    if raw - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// Read a raw property payload as a finite speed.
///
/// # Errors
///
/// Returns [`Error::MalformedValue`] if the payload is not a finite number.
#[allow(clippy::cast_precision_loss)]
pub fn parse_raw(value: &RawValue) -> Result<f32> {
    let parsed = match value {
        RawValue::Float(v) => *v,
        RawValue::Int(v) => *v as f32,
        RawValue::Text(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| Error::malformed(s.as_str()))?,
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(Error::malformed(value.to_string()))
    }
}

/// Parse and convert a raw payload in one step.
///
/// # Errors
///
/// Returns [`Error::MalformedValue`] if the payload cannot be parsed.
pub fn display_speed(value: &RawValue) -> Result<i32> {
    parse_raw(value).map(convert)
}
