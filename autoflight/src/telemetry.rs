//! Telemetry frames from the simulator bridge.
//!
//! One [`TelemetryFrame`] arrives per control tick (10-20 Hz). Every field
//! is optional on the wire; anything missing or non-finite decodes to
//! 0/false so the control loop never sees a hole.
//!
//! # onGround reliability
//!
//! The simulator's `onGround` flag is unreliable around touchdown and on
//! bumpy strips. [`TelemetryFrame::on_ground_reliable`] is the single
//! arbiter used by the phase machine and the handlers:
//!
//! - trust `onGround` only below 50 ft AGL
//! - below 15 ft AGL with near-zero vertical speed, report on-ground
//!   regardless of the flag

use serde::{Deserialize, Serialize};

/// AGL ceiling below which the raw `onGround` flag is trusted (ft).
const ON_GROUND_TRUST_AGL_FT: f64 = 50.0;

/// AGL below which the aircraft is considered on ground regardless of the
/// flag, provided vertical speed is near zero (ft).
const ON_GROUND_FORCE_AGL_FT: f64 = 15.0;

/// Vertical-speed band for the forced on-ground determination (fpm).
const ON_GROUND_FORCE_VS_FPM: f64 = 200.0;

/// One telemetry frame from the simulator.
///
/// Field names mirror the bridge wire format. All fields default so a
/// partial frame decodes cleanly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryFrame {
    /// Altitude in feet MSL.
    pub altitude: f64,
    /// Altitude above ground in feet.
    #[serde(rename = "altitudeAGL")]
    pub altitude_agl: f64,
    /// Indicated airspeed in knots.
    pub speed: f64,
    /// Ground speed in knots.
    pub ground_speed: f64,
    /// Vertical speed in feet per minute.
    pub vertical_speed: f64,
    /// True heading in degrees, 0-359.
    pub heading: f64,
    /// Ground track in degrees true.
    pub track: f64,
    /// Pitch in degrees, positive nose up.
    pub pitch: f64,
    /// Bank in degrees, positive right wing down.
    pub bank: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Raw on-ground flag; see [`TelemetryFrame::on_ground_reliable`].
    pub on_ground: bool,
    pub engine_running: bool,
    /// Throttle position, percent.
    pub throttle: f64,
    /// Flap detent, 0..4.
    pub flaps_index: u32,
    /// Landing gear extended. Not reported by fixed-gear airframes.
    pub gear_down: bool,
    /// Wind direction in degrees (blowing from).
    pub wind_direction: f64,
    /// Wind speed in knots.
    pub wind_speed: f64,
    /// Total fuel in gallons.
    pub fuel_total: f64,
    /// Fuel flow in gallons per hour.
    pub fuel_flow: f64,

    // Autopilot mirror: what the simulator says the AP panel shows.
    pub ap_master: bool,
    pub ap_hdg_lock: bool,
    pub ap_alt_lock: bool,
    pub ap_vs_lock: bool,
    pub ap_spd_lock: bool,
    pub ap_nav_lock: bool,
    pub ap_apr_lock: bool,
    pub ap_hdg_set: f64,
    pub ap_alt_set: f64,
    pub ap_vs_set: f64,
    pub ap_spd_set: f64,
}

impl TelemetryFrame {
    /// Replace any non-finite numeric field with 0.0.
    ///
    /// Bridges occasionally emit NaN during slewing or scenery reloads; the
    /// error policy is to treat those as 0, not to surface them.
    pub fn sanitize(mut self) -> Self {
        for value in [
            &mut self.altitude,
            &mut self.altitude_agl,
            &mut self.speed,
            &mut self.ground_speed,
            &mut self.vertical_speed,
            &mut self.heading,
            &mut self.track,
            &mut self.pitch,
            &mut self.bank,
            &mut self.latitude,
            &mut self.longitude,
            &mut self.throttle,
            &mut self.wind_direction,
            &mut self.wind_speed,
            &mut self.fuel_total,
            &mut self.fuel_flow,
            &mut self.ap_hdg_set,
            &mut self.ap_alt_set,
            &mut self.ap_vs_set,
            &mut self.ap_spd_set,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        self
    }

    /// On-ground determination that corrects for the unreliable flag.
    pub fn on_ground_reliable(&self) -> bool {
        if self.altitude_agl < ON_GROUND_FORCE_AGL_FT
            && self.vertical_speed.abs() < ON_GROUND_FORCE_VS_FPM
        {
            return true;
        }
        self.on_ground && self.altitude_agl < ON_GROUND_TRUST_AGL_FT
    }

    /// Position from the frame's lat/lon.
    pub fn position(&self) -> crate::nav::Position {
        crate::nav::Position::new(self.latitude, self.longitude)
    }
}
