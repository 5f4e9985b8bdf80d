//! The per-phase rule engine.
//!
//! Each telemetry tick the supervisor calls [`RuleEngine::tick`] with the
//! current phase and nav guidance; the engine runs the matching phase
//! handler, which emits *desired* commands into the [`CommandQueue`].
//! Handlers are written to be re-entrant: they re-state the full desired
//! configuration every tick and rely on the dedup layers to keep the wire
//! quiet, so a dropped or delayed command is simply re-emitted.
//!
//! # Deduplication layers
//!
//! 1. The engine's own last-issued cache ([`RuleEngine::cmd`] and
//!    [`RuleEngine::cmd_value`]), cleared per-kind by
//!    [`RuleEngine::force_cmd`] and flushed for the autopilot toggles on
//!    every phase change (external state may have diverged).
//! 2. The queue's tracked autopilot state, refreshed from the telemetry
//!    mirror each tick.
//!
//! # Mirror reconciliation
//!
//! Issued autopilot toggles are watched against the mirror. A toggle the
//! simulator never confirmed is re-issued with forced dedup (lag or a
//! dropped frame). A toggle the simulator confirmed and later contradicts
//! for [`PILOT_CONTRADICTION_FRAMES`] frames is treated as a pilot
//! action: the matching axis gets a cooldown override and the engine
//! adopts the mirrored state as its own.

pub mod axis;
pub mod envelope;

mod approach;
mod climb;
mod cruise;
mod descent;
mod ground;
mod landing;
mod takeoff;

pub use envelope::{compute_envelope, EnvelopeFlags};
pub use takeoff::TakeoffSubPhase;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::command::{Command, CommandKind, CommandQueue, CommandValue};
use crate::nav::{NavGuidance, NavState};
use crate::phase::FlightPhase;
use crate::profile::AircraftProfile;
use crate::telemetry::TelemetryFrame;

use takeoff::TakeoffState;

/// Minimum spacing for self-repeating emissions (flap steps, trim pulses,
/// autopilot re-engagement) so a 20 Hz tick cannot flood the queue.
const REPEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Frames of contradiction before an unconfirmed toggle is re-issued.
const REISSUE_CONTRADICTION_FRAMES: u8 = 2;

/// Frames of contradiction on a previously-confirmed toggle before it is
/// graded a pilot action.
const PILOT_CONTRADICTION_FRAMES: u8 = 3;

/// Autopilot toggles whose dedup entries are flushed on phase change.
const AP_TOGGLES: [CommandKind; 7] = [
    CommandKind::ApMaster,
    CommandKind::ApHdgHold,
    CommandKind::ApAltHold,
    CommandKind::ApVsHold,
    CommandKind::ApAirspeedHold,
    CommandKind::ApNav1Hold,
    CommandKind::ApAprHold,
];

/// Everything a phase handler needs for one tick.
#[derive(Debug)]
pub struct TickContext<'a> {
    pub now: Instant,
    pub frame: &'a TelemetryFrame,
    pub phase: FlightPhase,
    /// True on the first tick after a phase transition.
    pub phase_changed: bool,
    /// Lateral guidance from the nav subsystem, when available.
    pub guidance: Option<NavGuidance>,
    /// Latest fresh nav state, for approach mode selection.
    pub nav: Option<&'a NavState>,
    pub target_cruise_alt: f64,
}

/// Last targets the engine commanded, for the state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlTargets {
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub vertical_speed: Option<f64>,
}

/// Watch entry for an issued autopilot toggle.
#[derive(Debug, Clone, Copy)]
struct ToggleIntent {
    desired: bool,
    /// The mirror has agreed with `desired` at least once since issuance.
    confirmed: bool,
    contradictions: u8,
}

/// The stateful rule engine. One per supervisor.
#[derive(Debug)]
pub struct RuleEngine {
    profile: Arc<AircraftProfile>,

    /// Engine-side dedup cache: last `(kind, value)` issued.
    last_issued: HashMap<CommandKind, CommandValue>,

    /// Pacing latches for self-repeating emissions.
    repeat_latch: HashMap<CommandKind, Instant>,

    /// Issued toggles being reconciled against the mirror.
    toggle_intents: HashMap<CommandKind, ToggleIntent>,

    takeoff: TakeoffState,

    /// CLIMB's one-shot altitude/speed target latch.
    climb_targets_set: bool,

    /// APPROACH's one-shot landing-light latch.
    landing_lights_commanded: bool,

    targets: ControlTargets,

    last_envelope: EnvelopeFlags,
}

impl RuleEngine {
    /// Create an engine for the given profile.
    pub fn new(profile: Arc<AircraftProfile>) -> Self {
        Self {
            profile,
            last_issued: HashMap::new(),
            repeat_latch: HashMap::new(),
            toggle_intents: HashMap::new(),
            takeoff: TakeoffState::new(),
            climb_targets_set: false,
            landing_lights_commanded: false,
            targets: ControlTargets::default(),
            last_envelope: EnvelopeFlags::default(),
        }
    }

    /// The active takeoff sub-phase, when in TAKEOFF.
    pub fn takeoff_sub_phase(&self) -> TakeoffSubPhase {
        self.takeoff.sub_phase
    }

    /// Envelope flags from the most recent tick.
    pub fn envelope(&self) -> EnvelopeFlags {
        self.last_envelope
    }

    /// Last commanded targets.
    pub fn targets(&self) -> ControlTargets {
        self.targets
    }

    /// Run one control tick: reconcile toggles, then the phase handler.
    pub fn tick(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        self.last_envelope = compute_envelope(ctx.frame, &self.profile);

        if ctx.phase_changed {
            self.on_phase_change(ctx);
        }
        self.reconcile_toggles(ctx, queue);

        match ctx.phase {
            FlightPhase::Preflight => {}
            FlightPhase::Taxi => self.handle_taxi(ctx, queue),
            FlightPhase::Takeoff => self.handle_takeoff(ctx, queue),
            FlightPhase::Climb => self.handle_climb(ctx, queue),
            FlightPhase::Cruise => self.handle_cruise(ctx, queue),
            FlightPhase::Descent => self.handle_descent(ctx, queue),
            FlightPhase::Approach => self.handle_approach(ctx, queue),
            FlightPhase::Landing => self.handle_landing(ctx, queue),
        }
    }

    /// Phase boundaries invalidate what we believe about the AP panel.
    fn on_phase_change(&mut self, ctx: &TickContext<'_>) {
        for kind in AP_TOGGLES {
            self.last_issued.remove(&kind);
        }
        debug!(phase = %ctx.phase, "Autopilot dedup cache flushed for phase change");

        match ctx.phase {
            FlightPhase::Takeoff => {
                // A fresh TAKEOFF entry is the only way back to BEFORE_ROLL
                self.takeoff = TakeoffState::new();
            }
            FlightPhase::Climb => self.climb_targets_set = false,
            FlightPhase::Approach => self.landing_lights_commanded = false,
            _ => {}
        }
    }

    /// Compare issued toggles with the telemetry mirror.
    ///
    /// A toggle the simulator never confirmed is re-issued (simulator lag
    /// or a dropped frame). A toggle the simulator confirmed and then
    /// flipped back is a pilot action: the matching axis gets a cooldown
    /// override and the engine adopts the mirrored state.
    fn reconcile_toggles(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let mut reissue = Vec::new();
        let mut overridden = Vec::new();

        for (kind, intent) in self.toggle_intents.iter_mut() {
            let Some(actual) = mirror_state(ctx.frame, *kind) else {
                continue;
            };
            if actual == intent.desired {
                intent.confirmed = true;
                intent.contradictions = 0;
                continue;
            }
            intent.contradictions = intent.contradictions.saturating_add(1);

            if intent.confirmed {
                if intent.contradictions >= PILOT_CONTRADICTION_FRAMES {
                    overridden.push((*kind, actual));
                }
            } else if intent.contradictions >= REISSUE_CONTRADICTION_FRAMES {
                reissue.push((*kind, intent.desired));
            }
        }

        for (kind, desired) in reissue {
            // Paced: the tick rate is far above what the simulator needs
            if self.repeat_allowed(ctx.now, kind) {
                debug!(command = %kind, desired, "Mirror contradicts issued toggle, re-issuing");
                self.force_cmd(queue, ctx.now, kind, desired, "Re-issued after mirror mismatch");
            }
        }

        for (kind, actual) in overridden {
            self.toggle_intents.remove(&kind);
            self.last_issued.insert(kind, CommandValue::Bool(actual));
            if let Some(axis) = kind.override_axis() {
                info!(command = %kind, %axis, "Pilot toggled autopilot, registering override");
                queue.register_override(ctx.now, axis);
            }
        }
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    /// Emit a toggle unless it matches the last issued state.
    pub(crate) fn cmd(
        &mut self,
        queue: &mut CommandQueue,
        now: Instant,
        kind: CommandKind,
        on: bool,
        description: impl Into<String>,
    ) {
        // A pilot override owns the axis: stand down and forget our last
        // value so the first post-cooldown emission is not deduped away
        if let Some(axis) = kind.override_axis() {
            if queue.override_active(now, axis) {
                self.last_issued.remove(&kind);
                self.toggle_intents.remove(&kind);
                return;
            }
        }

        let value = CommandValue::Bool(on);
        if self
            .last_issued
            .get(&kind)
            .is_some_and(|last| value.is_duplicate_of(last))
        {
            return;
        }

        match queue.enqueue(now, Command::toggle(kind, on, description)) {
            crate::command::EnqueueOutcome::Queued { .. } => {
                self.last_issued.insert(kind, value);
                self.toggle_intents.insert(
                    kind,
                    ToggleIntent {
                        desired: on,
                        confirmed: false,
                        contradictions: 0,
                    },
                );
            }
            crate::command::EnqueueOutcome::DroppedDuplicate => {
                // The simulator already shows this state; remember it so we
                // stop asking.
                self.last_issued.insert(kind, value);
                self.toggle_intents.insert(
                    kind,
                    ToggleIntent {
                        desired: on,
                        confirmed: true,
                        contradictions: 0,
                    },
                );
            }
            crate::command::EnqueueOutcome::DroppedOverride => {
                // The pilot owns this axis for now; forget our last value
                // so the first post-cooldown emission is not deduped away.
                self.last_issued.remove(&kind);
                self.toggle_intents.remove(&kind);
            }
        }
    }

    /// Emit a value-set command unless it matches the last issued value
    /// within the numeric dedup epsilon.
    pub(crate) fn cmd_value(
        &mut self,
        queue: &mut CommandQueue,
        now: Instant,
        kind: CommandKind,
        value: f64,
        description: impl Into<String>,
    ) {
        if let Some(axis) = kind.override_axis() {
            if queue.override_active(now, axis) {
                self.last_issued.remove(&kind);
                return;
            }
        }

        let wrapped = CommandValue::Number(value);
        if self
            .last_issued
            .get(&kind)
            .is_some_and(|last| wrapped.is_duplicate_of(last))
        {
            return;
        }

        match queue.enqueue(now, Command::value(kind, value, description)) {
            crate::command::EnqueueOutcome::Queued { .. }
            | crate::command::EnqueueOutcome::DroppedDuplicate => {
                self.last_issued.insert(kind, wrapped);
                self.record_target(kind, value);
            }
            crate::command::EnqueueOutcome::DroppedOverride => {
                self.last_issued.remove(&kind);
            }
        }
    }

    /// Clear the dedup entry for a toggle, then emit it.
    ///
    /// Used after phase changes, at autopilot handoff, and whenever the
    /// simulator may have drifted from what we last asked for.
    pub(crate) fn force_cmd(
        &mut self,
        queue: &mut CommandQueue,
        now: Instant,
        kind: CommandKind,
        on: bool,
        description: impl Into<String>,
    ) {
        self.last_issued.remove(&kind);
        self.cmd(queue, now, kind, on, description);
    }

    /// Clear the dedup entry for a value command, then emit it.
    pub(crate) fn force_cmd_value(
        &mut self,
        queue: &mut CommandQueue,
        now: Instant,
        kind: CommandKind,
        value: f64,
        description: impl Into<String>,
    ) {
        self.last_issued.remove(&kind);
        self.cmd_value(queue, now, kind, value, description);
    }

    /// Emit a bare command (no tracked state) at most once per
    /// [`REPEAT_INTERVAL`].
    ///
    /// Bare commands carry no value for the dedup layers to compare, so
    /// pacing is the only thing stopping a 20 Hz tick from flooding the
    /// queue with trim pulses or flap steps.
    pub(crate) fn pulse(
        &mut self,
        queue: &mut CommandQueue,
        now: Instant,
        kind: CommandKind,
        description: impl Into<String>,
    ) {
        if !self.repeat_allowed(now, kind) {
            return;
        }
        queue.enqueue(now, Command::bare(kind, description));
    }

    /// Per-kind pacing latch for self-repeating emissions.
    pub(crate) fn repeat_allowed(&mut self, now: Instant, kind: CommandKind) -> bool {
        match self.repeat_latch.get(&kind) {
            Some(last) if now.saturating_duration_since(*last) < REPEAT_INTERVAL => false,
            _ => {
                self.repeat_latch.insert(kind, now);
                true
            }
        }
    }

    /// Hold every manual axis at the neutral value that keeps control.
    pub(crate) fn neutral_axes(&mut self, queue: &mut CommandQueue, now: Instant) {
        for (kind, what) in [
            (CommandKind::AxisElevatorSet, "elevator"),
            (CommandKind::AxisAileronsSet, "ailerons"),
            (CommandKind::AxisRudderSet, "rudder"),
        ] {
            self.cmd_value(
                queue,
                now,
                kind,
                axis::AXIS_HOLD_NEUTRAL,
                format!("Neutral {what}"),
            );
        }
    }

    fn record_target(&mut self, kind: CommandKind, value: f64) {
        match kind {
            CommandKind::ApAltVarSet => self.targets.altitude = Some(value),
            CommandKind::ApSpdVarSet => self.targets.speed = Some(value),
            CommandKind::HeadingBugSet => self.targets.heading = Some(value),
            CommandKind::ApVsVarSet => self.targets.vertical_speed = Some(value),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Shared lateral navigation
    // ------------------------------------------------------------------

    /// Steer the heading bug from nav guidance, or hold the current
    /// heading when no source is available.
    pub(crate) fn apply_lateral_nav(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        match ctx.guidance {
            Some(guidance) => {
                self.cmd_value(
                    queue,
                    ctx.now,
                    CommandKind::HeadingBugSet,
                    guidance.heading.round(),
                    format!("Nav {}", guidance.describe()),
                );
                self.cmd(
                    queue,
                    ctx.now,
                    CommandKind::ApHdgHold,
                    true,
                    "Heading hold for nav guidance",
                );
            }
            None => {
                // No guidance: make sure we are at least holding heading
                if !ctx.frame.ap_hdg_lock {
                    self.cmd_value(
                        queue,
                        ctx.now,
                        CommandKind::HeadingBugSet,
                        ctx.frame.heading.round(),
                        "Hold current heading",
                    );
                    self.cmd(queue, ctx.now, CommandKind::ApHdgHold, true, "Heading hold");
                }
            }
        }
    }
}

/// The mirror's view of an autopilot toggle, when the frame carries one.
fn mirror_state(frame: &TelemetryFrame, kind: CommandKind) -> Option<bool> {
    match kind {
        CommandKind::ApMaster => Some(frame.ap_master),
        CommandKind::ApHdgHold => Some(frame.ap_hdg_lock),
        CommandKind::ApAltHold => Some(frame.ap_alt_lock),
        CommandKind::ApVsHold => Some(frame.ap_vs_lock),
        CommandKind::ApAirspeedHold => Some(frame.ap_spd_lock),
        CommandKind::ApNav1Hold => Some(frame.ap_nav_lock),
        CommandKind::ApAprHold => Some(frame.ap_apr_lock),
        _ => None,
    }
}
