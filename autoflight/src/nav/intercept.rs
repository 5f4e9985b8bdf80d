//! Course-intercept heading computation.
//!
//! Given a desired track and a cross-track error from the CDI, compute the
//! heading that re-intercepts the course at a proportional angle. Small
//! errors get a shallow cut, large errors are capped at a 30 degree
//! intercept so the aircraft never charges the course at right angles.
//!
//! # Intercept schedule
//!
//! ```text
//! |xtrk| < 0.1 NM        ->  0 degrees (on course)
//! 0.1 NM .. 0.3 NM       -> 10 degrees
//! 0.3 NM .. 1.0 NM       -> 10 + (|xtrk| - 0.3) / 0.7 * 20 degrees
//! |xtrk| > 1.0 NM        -> 30 degrees
//! ```
//!
//! Cross-track sign follows CDI convention: positive means right of course,
//! so the intercept angle is subtracted from the desired track (turn left
//! back toward it); negative means left of course and the angle is added.

use super::geo::wrap_heading;
use super::state::ToFrom;

/// Cross-track error below which the aircraft is considered on course (NM).
pub const ON_COURSE_XTRK_NM: f64 = 0.1;

/// Cross-track error at which the intercept angle saturates (NM).
pub const MAX_INTERCEPT_XTRK_NM: f64 = 1.0;

/// Maximum intercept angle in degrees.
pub const MAX_INTERCEPT_ANGLE_DEG: f64 = 30.0;

/// Proportional intercept angle for a cross-track error magnitude.
///
/// Returns a value in `[0, 30]` degrees. The sign convention is applied by
/// [`intercept_heading`]; this function takes the absolute error.
pub fn intercept_angle_deg(xtrk_abs_nm: f64) -> f64 {
    let x = xtrk_abs_nm.abs();
    if x < ON_COURSE_XTRK_NM {
        0.0
    } else if x <= 0.3 {
        10.0
    } else if x <= MAX_INTERCEPT_XTRK_NM {
        10.0 + (x - 0.3) / 0.7 * 20.0
    } else {
        MAX_INTERCEPT_ANGLE_DEG
    }
}

/// Compute the intercept heading for a desired track and cross-track error.
///
/// - `dtk_deg`: desired track in degrees.
/// - `xtrk_nm`: signed cross-track distance, positive right of course.
/// - `to_from`: CDI TO/FROM flag; a FROM (or flagged-off) indication yields
///   the desired track unmodified, since chasing a station passage with an
///   intercept cut diverges.
///
/// The result is wrapped to `[0, 360)`.
pub fn intercept_heading(dtk_deg: f64, xtrk_nm: f64, to_from: ToFrom) -> f64 {
    if to_from != ToFrom::To {
        return wrap_heading(dtk_deg);
    }

    let angle = intercept_angle_deg(xtrk_nm.abs());
    let heading = if xtrk_nm > 0.0 {
        // Right of course: cut left of the desired track
        dtk_deg - angle
    } else {
        dtk_deg + angle
    };

    wrap_heading(heading)
}
