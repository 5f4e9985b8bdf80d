//! Flight-phase classification.
//!
//! The [`PhaseTracker`] turns each telemetry frame into one of eight flight
//! phases and reports a [`PhaseChange`] whenever the classification moves.
//! Classification is rule-driven, evaluated on every frame with the first
//! matching rule winning; there is no failure path, every frame produces a
//! phase.
//!
//! # Phase progression
//!
//! ```text
//! PREFLIGHT -> TAXI -> TAKEOFF -> CLIMB -> CRUISE -> DESCENT -> APPROACH -> LANDING
//!      ^        ^ |                  ^                              |          |
//!      |        | +-- rejected t/o   +------------- go-around -----+----------+
//!      +--------+ (engine shutdown)
//! ```
//!
//! # Catch-up
//!
//! When the supervisor joins an already-airborne session the tracker is
//! still in PREFLIGHT; the first airborne frame classifies directly into
//! APPROACH / CLIMB / CRUISE from altitude and vertical speed instead of
//! walking the whole progression.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::profile::AircraftProfile;
use crate::telemetry::TelemetryFrame;

/// Floor for the cruise-altitude target (ft MSL).
const MIN_TARGET_CRUISE_ALT_FT: f64 = 1000.0;

/// Altitude window around the target that counts as "at cruise" (ft).
const CRUISE_CAPTURE_WINDOW_FT: f64 = 200.0;

/// Minimum time in CRUISE before the drifting-descent heuristic may fire.
const CRUISE_SETTLE_TIME: Duration = Duration::from_secs(30);

/// Consecutive ticks the descent condition must hold before transitioning.
const DESCENT_HYSTERESIS_TICKS: u8 = 2;

/// The eight flight phases, in progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlightPhase {
    #[default]
    Preflight,
    Taxi,
    Takeoff,
    Climb,
    Cruise,
    Descent,
    Approach,
    Landing,
}

impl FlightPhase {
    /// Position in the progression, 0..=7.
    pub fn index(&self) -> usize {
        match self {
            FlightPhase::Preflight => 0,
            FlightPhase::Taxi => 1,
            FlightPhase::Takeoff => 2,
            FlightPhase::Climb => 3,
            FlightPhase::Cruise => 4,
            FlightPhase::Descent => 5,
            FlightPhase::Approach => 6,
            FlightPhase::Landing => 7,
        }
    }

    /// Wire/UI name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::Preflight => "PREFLIGHT",
            FlightPhase::Taxi => "TAXI",
            FlightPhase::Takeoff => "TAKEOFF",
            FlightPhase::Climb => "CLIMB",
            FlightPhase::Cruise => "CRUISE",
            FlightPhase::Descent => "DESCENT",
            FlightPhase::Approach => "APPROACH",
            FlightPhase::Landing => "LANDING",
        }
    }

    /// Phases in which the engine applies lateral navigation.
    pub fn is_nav_capable(&self) -> bool {
        matches!(
            self,
            FlightPhase::Climb | FlightPhase::Cruise | FlightPhase::Descent | FlightPhase::Approach
        )
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A phase transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: FlightPhase,
    pub to: FlightPhase,
}

/// Classifies telemetry into flight phases.
#[derive(Debug)]
pub struct PhaseTracker {
    profile: Arc<AircraftProfile>,

    phase: FlightPhase,

    /// When the current phase was entered.
    entered_at: Instant,

    /// Cruise altitude target, clamped to `[1000, ceiling]` ft.
    target_cruise_alt: f64,

    /// Destination distance from the nav subsystem, when known (NM).
    destination_dist_nm: Option<f64>,

    /// Field elevation used for top-of-descent planning (ft MSL).
    field_elevation: f64,

    /// When set, telemetry no longer drives transitions.
    manual_override: bool,

    /// Altitude at APPROACH entry, for go-around detection.
    approach_entry_alt: Option<f64>,

    /// Consecutive ticks the CRUISE->DESCENT condition has held.
    descent_hold_ticks: u8,
}

impl PhaseTracker {
    /// Create a tracker in PREFLIGHT.
    pub fn new(profile: Arc<AircraftProfile>, now: Instant) -> Self {
        let default_target = profile.limits.ceiling.min(8000.0);
        let mut tracker = Self {
            profile,
            phase: FlightPhase::Preflight,
            entered_at: now,
            target_cruise_alt: 0.0,
            destination_dist_nm: None,
            field_elevation: 0.0,
            manual_override: false,
            approach_entry_alt: None,
            descent_hold_ticks: 0,
        };
        tracker.set_target_cruise_alt(default_target);
        tracker
    }

    /// Current phase.
    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// How long the current phase has been active.
    pub fn phase_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// The cruise-altitude target (ft MSL).
    pub fn target_cruise_alt(&self) -> f64 {
        self.target_cruise_alt
    }

    /// Set the cruise-altitude target, clamped to `[1000, ceiling]`.
    pub fn set_target_cruise_alt(&mut self, altitude_ft: f64) {
        self.target_cruise_alt = altitude_ft.clamp(MIN_TARGET_CRUISE_ALT_FT, self.profile.limits.ceiling);
    }

    /// Feed the latest destination distance from the nav subsystem.
    pub fn set_destination_distance(&mut self, dist_nm: Option<f64>) {
        self.destination_dist_nm = dist_nm;
    }

    /// Set the destination field elevation for TOD planning.
    pub fn set_field_elevation(&mut self, elevation_ft: f64) {
        self.field_elevation = elevation_ft;
    }

    /// Whether a manual phase pin is active.
    pub fn is_manual(&self) -> bool {
        self.manual_override
    }

    /// Pin the phase until [`resume_auto`] is called.
    ///
    /// [`resume_auto`]: PhaseTracker::resume_auto
    pub fn set_manual(&mut self, phase: FlightPhase, now: Instant) -> Option<PhaseChange> {
        self.manual_override = true;
        self.transition_to(phase, now, "manual")
    }

    /// Return to telemetry-driven classification.
    pub fn resume_auto(&mut self) {
        self.manual_override = false;
    }

    /// Immediately transition regardless of telemetry; automatic
    /// classification continues afterwards.
    pub fn force(&mut self, phase: FlightPhase, now: Instant) -> Option<PhaseChange> {
        self.transition_to(phase, now, "forced")
    }

    /// Classify one telemetry frame.
    ///
    /// Returns the transition when the phase changed.
    pub fn update(&mut self, now: Instant, frame: &TelemetryFrame) -> Option<PhaseChange> {
        if self.manual_override {
            return None;
        }

        if self.phase == FlightPhase::Preflight && !frame.on_ground_reliable() {
            let caught_up = self.classify_airborne(frame);
            return self.transition_to(caught_up, now, "catch-up");
        }

        if let Some(next) = self.evaluate(now, frame) {
            return self.transition_to(next, now, "telemetry");
        }
        None
    }

    /// Late-join classification for an airborne aircraft.
    fn classify_airborne(&self, frame: &TelemetryFrame) -> FlightPhase {
        if frame.altitude_agl < 2000.0 {
            FlightPhase::Approach
        } else if frame.vertical_speed > 100.0 {
            FlightPhase::Climb
        } else if (frame.altitude - self.target_cruise_alt).abs() < 500.0
            && frame.vertical_speed.abs() < 200.0
        {
            FlightPhase::Cruise
        } else {
            FlightPhase::Climb
        }
    }

    /// Evaluate the transition table for the current phase.
    fn evaluate(&mut self, now: Instant, frame: &TelemetryFrame) -> Option<FlightPhase> {
        let on_ground = frame.on_ground_reliable();
        match self.phase {
            FlightPhase::Preflight => {
                if frame.engine_running || frame.throttle > 10.0 {
                    return Some(FlightPhase::Taxi);
                }
            }
            FlightPhase::Taxi => {
                if !frame.engine_running && frame.ground_speed < 1.0 {
                    return Some(FlightPhase::Preflight);
                }
                if on_ground && frame.ground_speed > 25.0 {
                    return Some(FlightPhase::Takeoff);
                }
            }
            FlightPhase::Takeoff => {
                if !on_ground && frame.altitude_agl > 500.0 {
                    return Some(FlightPhase::Climb);
                }
                // Rejected takeoff: decelerated back to taxi speed
                if on_ground && frame.ground_speed < 10.0 {
                    return Some(FlightPhase::Taxi);
                }
            }
            FlightPhase::Climb => {
                if (frame.altitude - self.target_cruise_alt).abs() < CRUISE_CAPTURE_WINDOW_FT {
                    return Some(FlightPhase::Cruise);
                }
            }
            FlightPhase::Cruise => {
                if self.descent_condition(now, frame) {
                    self.descent_hold_ticks = self.descent_hold_ticks.saturating_add(1);
                    if self.descent_hold_ticks >= DESCENT_HYSTERESIS_TICKS {
                        return Some(FlightPhase::Descent);
                    }
                } else {
                    self.descent_hold_ticks = 0;
                }
            }
            FlightPhase::Descent => {
                if (frame.altitude_agl < 3000.0 && frame.ap_apr_lock) || frame.altitude_agl < 2000.0
                {
                    return Some(FlightPhase::Approach);
                }
            }
            FlightPhase::Approach => {
                if frame.altitude_agl < 200.0 && frame.gear_down {
                    return Some(FlightPhase::Landing);
                }
                // Go-around: climbing away from the approach entry altitude
                if let Some(entry_alt) = self.approach_entry_alt {
                    if frame.altitude >= entry_alt + 200.0 && frame.vertical_speed > 300.0 {
                        return Some(FlightPhase::Climb);
                    }
                }
            }
            FlightPhase::Landing => {
                if on_ground && frame.ground_speed < 30.0 {
                    return Some(FlightPhase::Taxi);
                }
                if !on_ground && frame.vertical_speed > 300.0 {
                    return Some(FlightPhase::Climb);
                }
            }
        }
        None
    }

    /// CRUISE->DESCENT trigger, before hysteresis.
    fn descent_condition(&self, now: Instant, frame: &TelemetryFrame) -> bool {
        // Planned: inside top-of-descent distance of the destination
        if let Some(dest) = self.destination_dist_nm {
            let tod_nm =
                (frame.altitude - self.field_elevation) / 1000.0 * self.profile.descent.tod_factor;
            if dest < tod_nm && dest < 100.0 {
                return true;
            }
        }

        // Unplanned: the aircraft has clearly left cruise altitude downwards
        self.phase_age(now) > CRUISE_SETTLE_TIME
            && frame.altitude < self.target_cruise_alt - 500.0
            && frame.vertical_speed < -200.0
    }

    fn transition_to(
        &mut self,
        next: FlightPhase,
        now: Instant,
        reason: &'static str,
    ) -> Option<PhaseChange> {
        if next == self.phase {
            return None;
        }

        let change = PhaseChange {
            from: self.phase,
            to: next,
        };
        info!(from = %change.from, to = %change.to, reason, "Flight phase transition");

        self.phase = next;
        self.entered_at = now;
        self.descent_hold_ticks = 0;
        self.approach_entry_alt = None;
        Some(change)
    }

    /// Record the altitude at APPROACH entry for go-around detection.
    ///
    /// Called by the controller with the frame that produced the
    /// transition.
    pub fn record_approach_entry(&mut self, altitude_ft: f64) {
        if self.phase == FlightPhase::Approach {
            self.approach_entry_alt = Some(altitude_ft);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PhaseTracker {
        PhaseTracker::new(Arc::new(AircraftProfile::trainer()), Instant::now())
    }

    fn ground_frame() -> TelemetryFrame {
        TelemetryFrame {
            on_ground: true,
            altitude_agl: 0.0,
            altitude: 5800.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_phase_is_preflight() {
        assert_eq!(tracker().phase(), FlightPhase::Preflight);
    }

    #[test]
    fn test_phase_indices_are_ordered() {
        let phases = [
            FlightPhase::Preflight,
            FlightPhase::Taxi,
            FlightPhase::Takeoff,
            FlightPhase::Climb,
            FlightPhase::Cruise,
            FlightPhase::Descent,
            FlightPhase::Approach,
            FlightPhase::Landing,
        ];
        for (i, p) in phases.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn test_engine_start_moves_to_taxi() {
        let mut t = tracker();
        let now = Instant::now();

        let mut frame = ground_frame();
        frame.engine_running = true;
        let change = t.update(now, &frame).unwrap();
        assert_eq!(change.from, FlightPhase::Preflight);
        assert_eq!(change.to, FlightPhase::Taxi);
    }

    #[test]
    fn test_throttle_up_moves_to_taxi() {
        let mut t = tracker();
        let mut frame = ground_frame();
        frame.throttle = 30.0;
        assert_eq!(
            t.update(Instant::now(), &frame).unwrap().to,
            FlightPhase::Taxi
        );
    }

    #[test]
    fn test_engine_shutdown_returns_to_preflight() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Taxi, now);

        let mut frame = ground_frame();
        frame.engine_running = false;
        frame.ground_speed = 0.2;
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Preflight);
    }

    #[test]
    fn test_takeoff_roll_detected() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Taxi, now);

        let mut frame = ground_frame();
        frame.engine_running = true;
        frame.ground_speed = 40.0;
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Takeoff);
    }

    #[test]
    fn test_rejected_takeoff_returns_to_taxi() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Takeoff, now);

        let mut frame = ground_frame();
        frame.engine_running = true;
        frame.ground_speed = 5.0;
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Taxi);
    }

    #[test]
    fn test_liftoff_to_climb_above_500_agl() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Takeoff, now);

        let frame = TelemetryFrame {
            altitude_agl: 600.0,
            altitude: 6400.0,
            vertical_speed: 700.0,
            ground_speed: 70.0,
            engine_running: true,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Climb);
    }

    #[test]
    fn test_climb_captures_cruise_within_window() {
        let mut t = tracker();
        let now = Instant::now();
        t.set_target_cruise_alt(8000.0);
        t.force(FlightPhase::Climb, now);

        let frame = TelemetryFrame {
            altitude: 7900.0,
            altitude_agl: 2100.0,
            vertical_speed: 300.0,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Cruise);
    }

    #[test]
    fn test_cruise_descent_requires_two_ticks() {
        let mut t = tracker();
        let now = Instant::now();
        t.set_target_cruise_alt(8000.0);
        t.set_field_elevation(5400.0);
        t.force(FlightPhase::Cruise, now);

        // TOD = (8000 - 5400)/1000 * 3 = 7.8 NM; at 5 NM we are inside it
        t.set_destination_distance(Some(5.0));
        let frame = TelemetryFrame {
            altitude: 8000.0,
            altitude_agl: 2600.0,
            ..Default::default()
        };

        assert!(t.update(now, &frame).is_none(), "first tick must not fire");
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Descent);
    }

    #[test]
    fn test_cruise_descent_hysteresis_resets() {
        let mut t = tracker();
        let now = Instant::now();
        t.set_target_cruise_alt(8000.0);
        t.set_field_elevation(5400.0);
        t.force(FlightPhase::Cruise, now);

        let frame = TelemetryFrame {
            altitude: 8000.0,
            altitude_agl: 2600.0,
            ..Default::default()
        };

        t.set_destination_distance(Some(5.0));
        assert!(t.update(now, &frame).is_none());

        // Condition clears for a tick: counter must reset
        t.set_destination_distance(Some(80.0));
        assert!(t.update(now, &frame).is_none());

        t.set_destination_distance(Some(5.0));
        assert!(t.update(now, &frame).is_none());
        assert!(t.update(now, &frame).is_some());
    }

    #[test]
    fn test_cruise_distant_destination_does_not_descend() {
        let mut t = tracker();
        let now = Instant::now();
        t.set_target_cruise_alt(8000.0);
        t.force(FlightPhase::Cruise, now);
        t.set_destination_distance(Some(150.0));

        let frame = TelemetryFrame {
            altitude: 8000.0,
            altitude_agl: 2600.0,
            ..Default::default()
        };
        for _ in 0..5 {
            assert!(t.update(now, &frame).is_none());
        }
    }

    #[test]
    fn test_cruise_drifting_descent_heuristic() {
        let mut t = tracker();
        let entered = Instant::now();
        t.set_target_cruise_alt(8000.0);
        t.force(FlightPhase::Cruise, entered);

        // 40 s later, 600 ft low and sinking
        let later = entered + Duration::from_secs(40);
        let frame = TelemetryFrame {
            altitude: 7400.0,
            altitude_agl: 2000.0,
            vertical_speed: -350.0,
            ..Default::default()
        };
        assert!(t.update(later, &frame).is_none());
        assert_eq!(t.update(later, &frame).unwrap().to, FlightPhase::Descent);
    }

    #[test]
    fn test_descent_to_approach_below_2000_agl() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Descent, now);

        let frame = TelemetryFrame {
            altitude_agl: 1800.0,
            altitude: 7200.0,
            vertical_speed: -500.0,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Approach);
    }

    #[test]
    fn test_descent_to_approach_with_apr_armed() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Descent, now);

        let frame = TelemetryFrame {
            altitude_agl: 2800.0,
            ap_apr_lock: true,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Approach);
    }

    #[test]
    fn test_approach_to_landing_needs_gear() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Approach, now);
        t.record_approach_entry(7000.0);

        let mut frame = TelemetryFrame {
            altitude_agl: 150.0,
            altitude: 5550.0,
            vertical_speed: -400.0,
            gear_down: false,
            ..Default::default()
        };
        assert!(t.update(now, &frame).is_none());

        frame.gear_down = true;
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Landing);
    }

    #[test]
    fn test_approach_go_around() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Approach, now);
        t.record_approach_entry(6000.0);

        let frame = TelemetryFrame {
            altitude: 6250.0,
            altitude_agl: 900.0,
            vertical_speed: 600.0,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Climb);
    }

    #[test]
    fn test_landing_rollout_to_taxi() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Landing, now);

        let frame = TelemetryFrame {
            on_ground: true,
            altitude_agl: 0.0,
            ground_speed: 20.0,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Taxi);
    }

    #[test]
    fn test_landing_go_around() {
        let mut t = tracker();
        let now = Instant::now();
        t.force(FlightPhase::Landing, now);

        let frame = TelemetryFrame {
            altitude_agl: 80.0,
            vertical_speed: 500.0,
            ground_speed: 70.0,
            ..Default::default()
        };
        assert_eq!(t.update(now, &frame).unwrap().to, FlightPhase::Climb);
    }

    #[test]
    fn test_catch_up_low_is_approach() {
        let mut t = tracker();
        let frame = TelemetryFrame {
            altitude_agl: 1500.0,
            altitude: 7000.0,
            ground_speed: 100.0,
            vertical_speed: -300.0,
            ..Default::default()
        };
        assert_eq!(
            t.update(Instant::now(), &frame).unwrap().to,
            FlightPhase::Approach
        );
    }

    #[test]
    fn test_catch_up_climbing_is_climb() {
        let mut t = tracker();
        let frame = TelemetryFrame {
            altitude_agl: 3000.0,
            altitude: 8500.0,
            vertical_speed: 500.0,
            ..Default::default()
        };
        assert_eq!(
            t.update(Instant::now(), &frame).unwrap().to,
            FlightPhase::Climb
        );
    }

    #[test]
    fn test_catch_up_level_near_target_is_cruise() {
        let mut t = tracker();
        t.set_target_cruise_alt(8000.0);
        let frame = TelemetryFrame {
            altitude_agl: 2600.0,
            altitude: 8100.0,
            vertical_speed: 50.0,
            ..Default::default()
        };
        assert_eq!(
            t.update(Instant::now(), &frame).unwrap().to,
            FlightPhase::Cruise
        );
    }

    #[test]
    fn test_catch_up_fallback_is_climb() {
        let mut t = tracker();
        t.set_target_cruise_alt(8000.0);
        let frame = TelemetryFrame {
            altitude_agl: 2600.0,
            altitude: 6000.0,
            vertical_speed: -50.0,
            ..Default::default()
        };
        assert_eq!(
            t.update(Instant::now(), &frame).unwrap().to,
            FlightPhase::Climb
        );
    }

    #[test]
    fn test_manual_override_pins_phase() {
        let mut t = tracker();
        let now = Instant::now();
        t.set_manual(FlightPhase::Cruise, now);

        // Telemetry that would normally classify as approach
        let frame = TelemetryFrame {
            altitude_agl: 1200.0,
            vertical_speed: -500.0,
            ..Default::default()
        };
        assert!(t.update(now, &frame).is_none());
        assert_eq!(t.phase(), FlightPhase::Cruise);
    }

    #[test]
    fn test_resume_auto_restores_classification() {
        let mut t = tracker();
        let now = Instant::now();
        t.set_manual(FlightPhase::Cruise, now);
        t.resume_auto();

        let frame = ground_frame();
        // On the ground in CRUISE: no rule matches, but two identical
        // frames must not oscillate either.
        assert!(t.update(now, &frame).is_none());
        assert!(t.update(now, &frame).is_none());
    }

    #[test]
    fn test_target_cruise_alt_clamped() {
        let mut t = tracker();
        t.set_target_cruise_alt(500.0);
        assert_eq!(t.target_cruise_alt(), 1000.0);
        t.set_target_cruise_alt(99000.0);
        assert_eq!(t.target_cruise_alt(), 14000.0);
    }

    #[test]
    fn test_on_ground_glitch_does_not_catch_up() {
        // onGround false but aircraft settled at 4 ft AGL: reliable
        // determination says on ground, so no catch-up from PREFLIGHT.
        let mut t = tracker();
        let frame = TelemetryFrame {
            on_ground: false,
            altitude_agl: 4.0,
            vertical_speed: 20.0,
            ..Default::default()
        };
        assert!(t.update(Instant::now(), &frame).is_none());
        assert_eq!(t.phase(), FlightPhase::Preflight);
    }
}
