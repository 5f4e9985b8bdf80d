//! The takeoff sub-phase machine.
//!
//! TAKEOFF is the only phase flown entirely on manual axes; the autopilot
//! takes over at the end of INITIAL_CLIMB. Sub-phases never regress, and a
//! fresh TAKEOFF phase entry is the only way back to BEFORE_ROLL.
//!
//! ```text
//! BEFORE_ROLL --gs>3--> ROLL --IAS>=Vr--> ROTATE --airborne--> LIFTOFF
//!     LIFTOFF --vs>100 & agl>200--> INITIAL_CLIMB --handoff+mirror--> DEPARTURE
//! ```
//!
//! Two hard-learned rules are encoded here:
//!
//! - ROTATE advances on the on-ground determination only, never a timer; a
//!   held elevator on a rolling aircraft will tip it.
//! - The handoff to the autopilot is confirmed against the telemetry
//!   mirror before DEPARTURE; commanding AP_MASTER is not the same as the
//!   autopilot being engaged.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{CommandKind, CommandQueue};

use super::axis::{self, AXIS_HOLD_NEUTRAL};
use super::{RuleEngine, TickContext};

/// Ground speed proving the brakes are off (kt). The parking-brake SimVar
/// is unreliable; motion is the only trustworthy signal.
const ROLL_START_SPEED_KT: f64 = 3.0;

/// Wings-level aileron gain during the roll and climb-out.
const WINGS_LEVEL_GAIN: f64 = 2.0;

/// Wings-level aileron deflection cap.
const WINGS_LEVEL_MAX: f64 = 25.0;

/// Elevator at the start of rotation (nose up).
const ROTATE_BASE_ELEVATOR: f64 = -3.0;

/// Additional nose-up elevator per second of rotation.
const ROTATE_RAMP_PER_SEC: f64 = 2.0;

/// Elevator held right after liftoff.
const LIFTOFF_ELEVATOR: f64 = -5.0;

/// Elevator held through the initial climb.
const INITIAL_CLIMB_ELEVATOR: f64 = -4.0;

/// Climb confirmation thresholds for leaving LIFTOFF.
const LIFTOFF_CONFIRM_VS_FPM: f64 = 100.0;
const LIFTOFF_CONFIRM_AGL_FT: f64 = 200.0;

/// Autopilot handoff gates: margin above clean stall and minimum height.
const HANDOFF_STALL_MARGIN_KT: f64 = 15.0;
const HANDOFF_MIN_AGL_FT: f64 = 500.0;

/// Sub-phases of the takeoff procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TakeoffSubPhase {
    #[default]
    BeforeRoll,
    Roll,
    Rotate,
    Liftoff,
    InitialClimb,
    Departure,
}

impl TakeoffSubPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TakeoffSubPhase::BeforeRoll => "BEFORE_ROLL",
            TakeoffSubPhase::Roll => "ROLL",
            TakeoffSubPhase::Rotate => "ROTATE",
            TakeoffSubPhase::Liftoff => "LIFTOFF",
            TakeoffSubPhase::InitialClimb => "INITIAL_CLIMB",
            TakeoffSubPhase::Departure => "DEPARTURE",
        }
    }
}

impl std::fmt::Display for TakeoffSubPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable takeoff state, reset on each TAKEOFF phase entry.
#[derive(Debug)]
pub(super) struct TakeoffState {
    pub sub_phase: TakeoffSubPhase,
    /// Heading captured on the first BEFORE_ROLL tick.
    pub runway_heading: Option<f64>,
    /// When ROTATE was entered.
    pub rotate_started: Option<Instant>,
    /// Handoff commands have been issued; waiting on the mirror.
    pub handoff_commanded: bool,
}

impl TakeoffState {
    pub fn new() -> Self {
        Self {
            sub_phase: TakeoffSubPhase::BeforeRoll,
            runway_heading: None,
            rotate_started: None,
            handoff_commanded: false,
        }
    }
}

impl RuleEngine {
    pub(super) fn handle_takeoff(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        match self.takeoff.sub_phase {
            TakeoffSubPhase::BeforeRoll => self.takeoff_before_roll(ctx, queue),
            TakeoffSubPhase::Roll => self.takeoff_roll(ctx, queue),
            TakeoffSubPhase::Rotate => self.takeoff_rotate(ctx, queue),
            TakeoffSubPhase::Liftoff => self.takeoff_liftoff(ctx, queue),
            TakeoffSubPhase::InitialClimb => self.takeoff_initial_climb(ctx, queue),
            TakeoffSubPhase::Departure => self.takeoff_departure(ctx, queue),
        }
    }

    fn advance_sub_phase(&mut self, next: TakeoffSubPhase, ctx: &TickContext<'_>) {
        info!(
            from = %self.takeoff.sub_phase,
            to = %next,
            speed = ctx.frame.speed,
            agl = ctx.frame.altitude_agl,
            "Takeoff sub-phase"
        );
        self.takeoff.sub_phase = next;
        if next == TakeoffSubPhase::Rotate {
            self.takeoff.rotate_started = Some(ctx.now);
        }
    }

    fn takeoff_before_roll(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        if self.takeoff.runway_heading.is_none() {
            let heading = ctx.frame.heading;
            info!(runway_heading = heading, "Runway heading captured");
            self.takeoff.runway_heading = Some(heading);
        }
        let runway = self.takeoff.runway_heading.unwrap_or(ctx.frame.heading);

        // Claim elevator and ailerons before power comes up
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisElevatorSet,
            AXIS_HOLD_NEUTRAL,
            "Neutral elevator",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisAileronsSet,
            AXIS_HOLD_NEUTRAL,
            "Neutral ailerons",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::MixtureSet,
            100.0,
            "Mixture rich for takeoff",
        );

        // Re-released every second; the brake SimVar cannot be trusted, so
        // only acceleration proves it is actually off.
        if self.repeat_allowed(ctx.now, CommandKind::ParkingBrakeSet) {
            self.force_cmd_value(
                queue,
                ctx.now,
                CommandKind::ParkingBrakeSet,
                0.0,
                "Release parking brake",
            );
        }

        if let Some(rudder) = axis::ground_steer(ctx.frame, runway) {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::AxisRudderSet,
                rudder,
                "Centerline steer",
            );
        }

        if ctx.frame.ground_speed > ROLL_START_SPEED_KT {
            self.advance_sub_phase(TakeoffSubPhase::Roll, ctx);
        }
    }

    fn takeoff_roll(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let runway = self.takeoff.runway_heading.unwrap_or(ctx.frame.heading);
        let roll_throttle = self.profile.takeoff.roll_throttle_pct;

        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisElevatorSet,
            AXIS_HOLD_NEUTRAL,
            "Elevator neutral for roll",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisAileronsSet,
            axis::wings_level_aileron(ctx.frame.bank, WINGS_LEVEL_GAIN, WINGS_LEVEL_MAX),
            "Wings level",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ThrottleSet,
            roll_throttle,
            "Takeoff power",
        );
        if let Some(rudder) = axis::ground_steer(ctx.frame, runway) {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::AxisRudderSet,
                rudder,
                "Centerline steer",
            );
        }

        if ctx.frame.speed >= self.profile.speeds.vr {
            self.advance_sub_phase(TakeoffSubPhase::Rotate, ctx);
        }
    }

    fn takeoff_rotate(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let elapsed = self
            .takeoff
            .rotate_started
            .map(|started| ctx.now.saturating_duration_since(started).as_secs_f64())
            .unwrap_or(0.0);

        // Progressive pull: more nose-up the longer rotation takes, floored
        // at the profile's rotation limit
        let elevator = (ROTATE_BASE_ELEVATOR - elapsed * ROTATE_RAMP_PER_SEC)
            .max(self.profile.takeoff.rotation_elevator_max);

        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisElevatorSet,
            elevator,
            "Rotate",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisAileronsSet,
            axis::wings_level_aileron(ctx.frame.bank, WINGS_LEVEL_GAIN, WINGS_LEVEL_MAX),
            "Wings level",
        );
        self.pulse(queue, ctx.now, CommandKind::ElevTrimUp, "Nose-up trim");

        // Airborne is the only exit; a ground timeout with held elevator
        // would tip the aircraft
        if !ctx.frame.on_ground_reliable() {
            self.advance_sub_phase(TakeoffSubPhase::Liftoff, ctx);
        }
    }

    fn takeoff_liftoff(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisElevatorSet,
            LIFTOFF_ELEVATOR,
            "Hold climb attitude",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisAileronsSet,
            axis::wings_level_aileron(ctx.frame.bank, WINGS_LEVEL_GAIN, WINGS_LEVEL_MAX),
            "Wings level",
        );

        if ctx.frame.vertical_speed > LIFTOFF_CONFIRM_VS_FPM
            && ctx.frame.altitude_agl > LIFTOFF_CONFIRM_AGL_FT
        {
            self.advance_sub_phase(TakeoffSubPhase::InitialClimb, ctx);
        }
    }

    fn takeoff_initial_climb(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        if self.takeoff.handoff_commanded {
            // Holding neutral while the mirror catches up
            if ctx.frame.ap_master {
                self.advance_sub_phase(TakeoffSubPhase::Departure, ctx);
            }
            return;
        }

        let handoff_speed = self.profile.speeds.vs1 + HANDOFF_STALL_MARGIN_KT;
        if ctx.frame.speed >= handoff_speed && ctx.frame.altitude_agl > HANDOFF_MIN_AGL_FT {
            self.takeoff_handoff(ctx, queue);
            return;
        }

        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisElevatorSet,
            INITIAL_CLIMB_ELEVATOR,
            "Hold climb attitude",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisAileronsSet,
            axis::wings_level_aileron(ctx.frame.bank, WINGS_LEVEL_GAIN, WINGS_LEVEL_MAX),
            "Wings level",
        );
    }

    /// Hand the aircraft to the autopilot: release the manual axes, then
    /// configure heading and vertical-speed modes.
    fn takeoff_handoff(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        info!(
            speed = ctx.frame.speed,
            agl = ctx.frame.altitude_agl,
            "Takeoff handoff to autopilot"
        );

        self.neutral_axes(queue, ctx.now);
        self.force_cmd(
            queue,
            ctx.now,
            CommandKind::ApMaster,
            true,
            "Autopilot master on",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::HeadingBugSet,
            ctx.frame.heading.round(),
            "Bug runway heading",
        );
        self.force_cmd(
            queue,
            ctx.now,
            CommandKind::ApHdgHold,
            true,
            "Heading hold",
        );
        self.force_cmd(
            queue,
            ctx.now,
            CommandKind::ApVsHold,
            true,
            "Vertical speed hold",
        );
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ApVsVarSet,
            self.profile.takeoff.departure_vs_fpm,
            "Departure climb rate",
        );

        self.takeoff.handoff_commanded = true;
    }

    fn takeoff_departure(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        if ctx.frame.flaps_index > 0 {
            self.pulse(queue, ctx.now, CommandKind::FlapsUp, "Retract flaps");
        }

        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ApSpdVarSet,
            self.profile.phase_speeds.climb,
            "Departure speed target",
        );
        // Altitude preselect only; ALT_HOLD here would capture pattern
        // altitude and fight the climb phase's vertical speed target
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ApAltVarSet,
            ctx.target_cruise_alt,
            "Cruise altitude target",
        );
    }
}
