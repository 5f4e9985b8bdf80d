//! The single-writer controller.
//!
//! All mutable control state (phase tracker, rule engine, nav computer,
//! terrain alert, last frame) lives here behind one mutex; every mutation
//! funnels through [`Controller::tick`] or one of the bus-message setters.
//! The command queue is a separate shared resource (the drain daemon pops
//! it between ticks) and is passed in for the duration of a tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::bus::{ApBits, AutopilotStateSnapshot, TargetsSnapshot, TerrainAlertLevel};
use crate::command::CommandQueue;
use crate::engine::{RuleEngine, TickContext};
use crate::nav::{FlightPlan, NavComputer, NavState};
use crate::phase::{FlightPhase, PhaseChange, PhaseTracker};
use crate::profile::AircraftProfile;
use crate::telemetry::TelemetryFrame;

/// Telemetry older than this is reported stale by [`Controller::telemetry_age`]
/// consumers (the control loop itself simply stops ticking).
pub const TELEMETRY_STALE_AFTER: Duration = Duration::from_secs(5);

/// The supervisor's mutable core.
pub struct Controller {
    profile: Arc<AircraftProfile>,
    phase: PhaseTracker,
    engine: RuleEngine,
    nav: NavComputer,

    terrain_alert: Option<TerrainAlertLevel>,

    last_frame: Option<TelemetryFrame>,
    last_frame_at: Option<Instant>,
    last_guidance: Option<String>,
}

impl Controller {
    /// Create a controller in PREFLIGHT with no nav data.
    pub fn new(profile: Arc<AircraftProfile>, now: Instant) -> Self {
        Self {
            phase: PhaseTracker::new(Arc::clone(&profile), now),
            engine: RuleEngine::new(Arc::clone(&profile)),
            nav: NavComputer::new(),
            profile,
            terrain_alert: None,
            last_frame: None,
            last_frame_at: None,
            last_guidance: None,
        }
    }

    /// Run one control tick for a telemetry frame.
    ///
    /// Order per tick: mirror refresh, phase classification, waypoint
    /// sequencing, then the phase handler.
    pub fn tick(&mut self, now: Instant, frame: TelemetryFrame, queue: &mut CommandQueue) {
        let frame = frame.sanitize();

        // 1. Mirror the simulator's AP panel into the queue's tracked state
        queue.apply_mirror(&frame);

        // 2. Classify the phase
        self.nav.record_vertical_speed(frame.vertical_speed);
        // Terrain under the aircraft approximates the destination field
        // elevation for top-of-descent planning
        self.phase
            .set_field_elevation(frame.altitude - frame.altitude_agl);
        self.phase
            .set_destination_distance(self.nav.destination_distance_nm(now, frame.position()));
        let change = self.phase.update(now, &frame);
        if matches!(
            change,
            Some(PhaseChange {
                to: FlightPhase::Approach,
                ..
            })
        ) {
            self.phase.record_approach_entry(frame.altitude);
        }

        // 3. Sequence the flight plan while airborne on a nav-capable phase
        if self.phase.phase().is_nav_capable() && !frame.on_ground_reliable() {
            self.nav.sequence(frame.position());
        }

        // 4. Run the phase handler
        let guidance = self.nav.guidance(now, &frame);
        self.last_guidance = guidance.map(|g| g.describe());
        let ctx = TickContext {
            now,
            frame: &frame,
            phase: self.phase.phase(),
            phase_changed: change.is_some(),
            guidance,
            nav: self.nav.nav_state(now),
            target_cruise_alt: self.phase.target_cruise_alt(),
        };
        self.engine.tick(&ctx, queue);

        self.last_frame = Some(frame);
        self.last_frame_at = Some(now);
    }

    // ------------------------------------------------------------------
    // Bus-message ingestion
    // ------------------------------------------------------------------

    /// Latest nav state from the GPS collaborator.
    pub fn set_nav_state(&mut self, state: NavState, now: Instant) {
        if let Some(plan_info) = &state.flight_plan {
            if plan_info.cruise_altitude > 0.0 {
                self.phase.set_target_cruise_alt(plan_info.cruise_altitude);
            }
        }
        self.nav.set_nav_state(state, now);
    }

    /// Terrain alert level from the TAWS collaborator; `None` clears.
    pub fn set_terrain_alert(&mut self, level: Option<TerrainAlertLevel>) {
        self.terrain_alert = level;
    }

    /// Install an imported flight plan.
    pub fn set_flight_plan(&mut self, plan: FlightPlan) {
        if plan.cruise_altitude > 0.0 {
            self.phase.set_target_cruise_alt(plan.cruise_altitude);
        }
        self.nav.set_flight_plan(plan);
    }

    /// Externally-driven waypoint sequencing.
    pub fn set_active_waypoint_index(&mut self, index: usize) {
        self.nav.set_active_waypoint_index(index);
    }

    // ------------------------------------------------------------------
    // Phase control passthroughs
    // ------------------------------------------------------------------

    /// Pin the phase until [`Controller::resume_auto`].
    pub fn set_manual_phase(&mut self, phase: FlightPhase, now: Instant) {
        self.phase.set_manual(phase, now);
    }

    /// Return to telemetry-driven phase classification.
    pub fn resume_auto(&mut self) {
        self.phase.resume_auto();
    }

    /// Force a phase transition, keeping automatic classification.
    pub fn force_phase(&mut self, phase: FlightPhase, now: Instant) {
        self.phase.force(phase, now);
    }

    // ------------------------------------------------------------------
    // Read-side accessors
    // ------------------------------------------------------------------

    /// Current flight phase.
    pub fn phase(&self) -> FlightPhase {
        self.phase.phase()
    }

    /// The aircraft profile in use.
    pub fn profile(&self) -> &AircraftProfile {
        &self.profile
    }

    /// Age of the newest telemetry frame.
    pub fn telemetry_age(&self, now: Instant) -> Option<Duration> {
        self.last_frame_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Whether telemetry has gone stale.
    pub fn telemetry_stale(&self, now: Instant) -> bool {
        match self.telemetry_age(now) {
            Some(age) => age > TELEMETRY_STALE_AFTER,
            None => true,
        }
    }

    /// Turbulence severity 0..=3 for UI display.
    pub fn turbulence_severity(&self) -> u8 {
        self.nav.turbulence_severity()
    }

    /// Assemble the 1 Hz autopilot-state snapshot.
    pub fn snapshot(&self, queue: &CommandQueue) -> AutopilotStateSnapshot {
        let frame = self.last_frame.clone().unwrap_or_default();
        let phase = self.phase.phase();
        let targets = self.engine.targets();

        AutopilotStateSnapshot {
            enabled: frame.ap_master,
            phase,
            takeoff_sub_phase: (phase == FlightPhase::Takeoff)
                .then(|| self.engine.takeoff_sub_phase()),
            targets: TargetsSnapshot {
                altitude: targets.altitude,
                speed: targets.speed,
                heading: targets.heading,
                vs: targets.vertical_speed,
            },
            ap: ApBits {
                master: frame.ap_master,
                hdg: frame.ap_hdg_lock,
                alt: frame.ap_alt_lock,
                vs: frame.ap_vs_lock,
                spd: frame.ap_spd_lock,
                nav: frame.ap_nav_lock,
                apr: frame.ap_apr_lock,
            },
            terrain_alert: self.terrain_alert,
            envelope_alert: self.engine.envelope().alert().map(String::from),
            nav_guidance: self.last_guidance.clone(),
            last_command: queue.last_command().map(|entry| entry.description.clone()),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
