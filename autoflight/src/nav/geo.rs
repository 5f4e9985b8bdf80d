//! Great-circle geometry for lateral navigation.
//!
//! All distances are in nautical miles and all angles in degrees. Headings
//! and bearings are true, normalized to `[0, 360)`.
//!
//! # Conventions
//!
//! - Bearings follow the standard initial great-circle bearing formula.
//! - Distances use the haversine formula with the Earth radius in NM.
//! - `wrap_heading` / `heading_error` are the single source of truth for
//!   heading arithmetic; phase handlers never wrap angles by hand.

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// A geographic position (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl Position {
    /// Create a position from latitude/longitude in degrees.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Normalize a heading to `[0, 360)`.
pub fn wrap_heading(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Signed shortest-turn error from `from` to `to`, in `(-180, 180]`.
///
/// Positive means a right turn is the short way round.
pub fn heading_error(from: f64, to: f64) -> f64 {
    let mut delta = wrap_heading(to) - wrap_heading(from);
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Great-circle distance between two positions in nautical miles.
///
/// Haversine formula; exact for identical points (returns 0.0).
pub fn haversine_nm(a: Position, b: Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_NM * h.sqrt().asin()
}

/// Initial great-circle bearing from `a` to `b`, in `[0, 360)`.
pub fn initial_bearing_deg(a: Position, b: Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    wrap_heading(y.atan2(x).to_degrees())
}
