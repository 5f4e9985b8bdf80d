//! Safety-envelope advisories.
//!
//! [`compute_envelope`] grades each telemetry frame against the profile
//! limits and returns advisory flags. The flags do not mutate commands
//! themselves; the climb handler scales its vertical-speed target from the
//! stall margin, and the rest surface in the autopilot-state snapshot for
//! the UI.

use crate::profile::AircraftProfile;
use crate::telemetry::TelemetryFrame;

/// Stall margin below which the climb handler starts shallowing (kt).
pub const STALL_MARGIN_CAUTION_KT: f64 = 15.0;

/// Bank tolerance past the profile limit before the flag trips (deg).
const BANK_TOLERANCE_DEG: f64 = 5.0;

/// Envelope flags are only meaningful airborne; below this AGL the frame
/// is graded clean (an aircraft parked on the ramp is not "stalled").
const MIN_ASSESS_AGL_FT: f64 = 50.0;

/// Advisory flags for one telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeFlags {
    /// Speed above the caution floor `Vs1 + 10`, in knots. Negative means
    /// slower than the floor.
    pub stall_margin_kt: f64,
    /// Speed at or below the caution floor.
    pub stall_warning: bool,
    /// Above Vno.
    pub overspeed: bool,
    /// Bank beyond the profile limit plus tolerance.
    pub bank_exceeded: bool,
    /// Vertical speed beyond the commandable limits.
    pub excessive_vs: bool,
}

impl EnvelopeFlags {
    /// The highest-priority active advisory, for the snapshot.
    pub fn alert(&self) -> Option<&'static str> {
        if self.stall_warning {
            Some("STALL MARGIN")
        } else if self.overspeed {
            Some("OVERSPEED")
        } else if self.bank_exceeded {
            Some("BANK LIMIT")
        } else if self.excessive_vs {
            Some("VERTICAL SPEED")
        } else {
            None
        }
    }

    /// Whether any advisory is active.
    pub fn any(&self) -> bool {
        self.alert().is_some()
    }
}

/// Grade a frame against the profile limits.
pub fn compute_envelope(frame: &TelemetryFrame, profile: &AircraftProfile) -> EnvelopeFlags {
    let stall_margin_kt = frame.speed - (profile.speeds.vs1 + 10.0);

    if frame.altitude_agl < MIN_ASSESS_AGL_FT {
        return EnvelopeFlags {
            stall_margin_kt,
            ..Default::default()
        };
    }

    EnvelopeFlags {
        stall_margin_kt,
        stall_warning: stall_margin_kt < 0.0,
        overspeed: frame.speed > profile.speeds.vno,
        bank_exceeded: frame.bank.abs() > profile.limits.max_bank + BANK_TOLERANCE_DEG,
        excessive_vs: frame.vertical_speed > profile.limits.max_vs
            || frame.vertical_speed < profile.limits.min_vs,
    }
}
