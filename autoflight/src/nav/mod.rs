//! Navigation subsystem: lateral guidance, waypoint sequencing, and nav
//! state ingestion.
//!
//! The [`NavComputer`] owns the locally-tracked [`FlightPlan`] and the
//! latest [`NavState`] received from the external GPS, and derives a
//! commanded heading for heading-bug steering.
//!
//! # Guidance source priority
//!
//! 1. **Flight plan** — great-circle bearing to the active waypoint, with a
//!    course-intercept cut from the CDI cross-track error when the CDI is
//!    tracking the same leg. Label `FPL`.
//! 2. **CDI desired track** — intercept heading from `dtk`/`xtrk`/TO-FROM;
//!    labeled with the driving receiver (GPS/NAV1/NAV2).
//! 3. **Active waypoint bearing** — bearing only, no cross-track data.
//!    Label `WPT`.
//! 4. None — the caller falls back to holding the current heading.
//!
//! Nav state older than [`NAV_STATE_STALE_AFTER`] is treated as absent.
//! Wind compensation is layered onto whichever source wins.

mod geo;
mod intercept;
mod plan;
mod state;
mod turbulence;
mod wind;

pub use geo::{haversine_nm, heading_error, initial_bearing_deg, wrap_heading, Position, EARTH_RADIUS_NM};
pub use intercept::{intercept_angle_deg, intercept_heading, MAX_INTERCEPT_ANGLE_DEG};
pub use plan::{FlightPlan, Waypoint, SEQUENCE_RADIUS_NM};
pub use state::{
    ActiveWaypoint, ApproachInfo, CdiMode, CdiSource, CdiState, FlightPlanInfo, NavState, ToFrom,
    NAV_STATE_STALE_AFTER,
};
pub use turbulence::TurbulenceMonitor;
pub use wind::{wind_corrected_heading, WindCorrection};

use std::time::Instant;

use crate::telemetry::TelemetryFrame;

/// CDI desired track must be within this many degrees of the direct
/// bearing for the CDI to be considered on the same leg as the plan.
///
/// Bound by the intercept schedule itself: on the active leg, desired
/// track and direct bearing can only disagree by cross-track geometry,
/// which the schedule caps at [`MAX_INTERCEPT_ANGLE_DEG`]. A larger
/// disagreement means the CDI is tracking a different leg.
const SAME_LEG_TOLERANCE_DEG: f64 = MAX_INTERCEPT_ANGLE_DEG;

/// Which source produced a guidance heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceSource {
    FlightPlan,
    Cdi(CdiSource),
    Waypoint,
}

impl GuidanceSource {
    /// Short label for command descriptions and the state snapshot.
    pub fn label(&self) -> &'static str {
        match self {
            GuidanceSource::FlightPlan => "FPL",
            GuidanceSource::Cdi(source) => source.label(),
            GuidanceSource::Waypoint => "WPT",
        }
    }
}

/// A commanded heading with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavGuidance {
    /// Heading to fly, `[0, 360)`.
    pub heading: f64,
    pub source: GuidanceSource,
    /// Wind-triangle correction folded into `heading`, when applied.
    pub wind_correction_deg: Option<f64>,
}

impl NavGuidance {
    /// One-line description, e.g. `FPL 251 (wind -4)`.
    pub fn describe(&self) -> String {
        match self.wind_correction_deg {
            Some(correction) => format!(
                "{} {:.0} (wind {:+.0})",
                self.source.label(),
                self.heading,
                correction
            ),
            None => format!("{} {:.0}", self.source.label(), self.heading),
        }
    }
}

/// Derives lateral guidance from the flight plan and GPS nav state.
#[derive(Debug, Default)]
pub struct NavComputer {
    plan: Option<FlightPlan>,
    nav_state: Option<NavState>,
    nav_received_at: Option<Instant>,
    turbulence: TurbulenceMonitor,
}

impl NavComputer {
    /// Create a computer with no plan and no nav state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly received nav state.
    pub fn set_nav_state(&mut self, state: NavState, now: Instant) {
        self.nav_state = Some(state);
        self.nav_received_at = Some(now);
    }

    /// The latest nav state, unless stale.
    pub fn nav_state(&self, now: Instant) -> Option<&NavState> {
        let received = self.nav_received_at?;
        if now.saturating_duration_since(received) > NAV_STATE_STALE_AFTER {
            return None;
        }
        self.nav_state.as_ref()
    }

    /// Install a flight plan, resetting the active leg to its start.
    pub fn set_flight_plan(&mut self, plan: FlightPlan) {
        self.plan = Some(plan);
    }

    /// The tracked flight plan.
    pub fn flight_plan(&self) -> Option<&FlightPlan> {
        self.plan.as_ref()
    }

    /// Whether a non-empty flight plan is loaded.
    pub fn has_flight_plan(&self) -> bool {
        self.plan.as_ref().is_some_and(FlightPlan::has_waypoints)
    }

    /// Jump the plan's active waypoint (no-op when out of bounds or no
    /// plan).
    pub fn set_active_waypoint_index(&mut self, index: usize) {
        if let Some(plan) = &mut self.plan {
            plan.set_active_index(index);
        }
    }

    /// Advance the plan cursor if the aircraft reached the active
    /// waypoint.
    pub fn sequence(&mut self, position: Position) -> bool {
        self.plan
            .as_mut()
            .map(|plan| plan.sequence(position))
            .unwrap_or(false)
    }

    /// Distance to destination in NM: GPS figure when fresh, otherwise
    /// computed from the plan.
    pub fn destination_distance_nm(&self, now: Instant, position: Position) -> Option<f64> {
        if let Some(dist) = self.nav_state(now).and_then(|n| n.dest_dist_nm) {
            return Some(dist);
        }
        self.plan
            .as_ref()
            .and_then(FlightPlan::destination)
            .map(|wp| haversine_nm(position, wp.position()))
    }

    /// Record a vertical-speed sample for turbulence grading.
    pub fn record_vertical_speed(&mut self, vs_fpm: f64) {
        self.turbulence.record(vs_fpm);
    }

    /// Current turbulence severity, 0..=3.
    pub fn turbulence_severity(&self) -> u8 {
        self.turbulence.severity()
    }

    /// Compute the commanded heading, if any source can provide one.
    pub fn guidance(&self, now: Instant, frame: &TelemetryFrame) -> Option<NavGuidance> {
        let nav = self.nav_state(now);

        // 1. Local flight plan with optional CDI refinement
        if let Some(wp) = self.plan.as_ref().and_then(FlightPlan::active_waypoint) {
            let bearing = initial_bearing_deg(frame.position(), wp.position());
            let heading = match nav {
                Some(n)
                    if n.cdi_usable()
                        && heading_error(bearing, n.cdi.dtk).abs() < SAME_LEG_TOLERANCE_DEG =>
                {
                    intercept_heading(bearing, n.cdi.xtrk, n.cdi.to_from)
                }
                _ => bearing,
            };
            return Some(self.with_wind(heading, GuidanceSource::FlightPlan, frame));
        }

        // 2. CDI course guidance
        if let Some(n) = nav {
            if n.cdi_usable() {
                let heading = intercept_heading(n.cdi.dtk, n.cdi.xtrk, n.cdi.to_from);
                return Some(self.with_wind(heading, GuidanceSource::Cdi(n.cdi.source), frame));
            }

            // 3. Bare waypoint bearing
            if let Some(wp) = &n.active_waypoint {
                let bearing =
                    initial_bearing_deg(frame.position(), Position::new(wp.lat, wp.lon));
                return Some(self.with_wind(bearing, GuidanceSource::Waypoint, frame));
            }
        }

        None
    }

    fn with_wind(
        &self,
        heading: f64,
        source: GuidanceSource,
        frame: &TelemetryFrame,
    ) -> NavGuidance {
        match wind_corrected_heading(heading, frame.wind_direction, frame.wind_speed, frame.speed)
        {
            Some(corrected) => NavGuidance {
                heading: corrected.heading,
                source,
                wind_correction_deg: Some(corrected.correction_deg),
            },
            None => NavGuidance {
                heading,
                source,
                wind_correction_deg: None,
            },
        }
    }
}
