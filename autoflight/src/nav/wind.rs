//! Wind-triangle heading correction for heading-bug steering.
//!
//! When the autopilot steers by heading bug, the commanded heading must be
//! offset into the wind or the resulting ground track drifts downwind of
//! the desired course. The correction solves the crosswind component of the
//! wind triangle with the small-angle arcsine form.

use super::geo::wrap_heading;

/// Minimum reported wind speed for a correction to be applied (kt).
pub const MIN_WIND_SPEED_KT: f64 = 1.0;

/// Minimum airspeed for a correction to be applied (kt).
///
/// Below this the arcsine argument gets large and noisy; ground phases do
/// not steer by wind anyway.
pub const MIN_AIRSPEED_KT: f64 = 50.0;

/// A wind-corrected heading solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindCorrection {
    /// Heading to fly, in `[0, 360)`.
    pub heading: f64,
    /// Signed correction applied, in degrees (positive = right of track).
    pub correction_deg: f64,
}

/// Solve the wind triangle for the heading that holds `desired_track`.
///
/// Returns `None` when wind or airspeed are below the thresholds. When the
/// wind exceeds the airspeed the correction saturates at +-90 degrees
/// rather than producing NaN.
pub fn wind_corrected_heading(
    desired_track_deg: f64,
    wind_dir_deg: f64,
    wind_speed_kt: f64,
    airspeed_kt: f64,
) -> Option<WindCorrection> {
    if wind_speed_kt <= MIN_WIND_SPEED_KT || airspeed_kt <= MIN_AIRSPEED_KT {
        return None;
    }

    // Angle between where the wind blows from and the desired track
    let beta = (wind_dir_deg - desired_track_deg).to_radians();
    let crosswind = wind_speed_kt * beta.sin();

    // Small-angle domain; clamp keeps asin defined when wind > TAS
    let ratio = (crosswind / airspeed_kt).clamp(-1.0, 1.0);
    let correction_deg = ratio.asin().to_degrees();

    Some(WindCorrection {
        heading: wrap_heading(desired_track_deg + correction_deg),
        correction_deg,
    })
}
