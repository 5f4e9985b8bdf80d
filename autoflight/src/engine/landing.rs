//! LANDING: stepped final descent, flare, and rollout cleanup.

use crate::command::{CommandKind, CommandQueue};

use super::{RuleEngine, TickContext};

/// Flare elevator deflection (nose up).
const FLARE_ELEVATOR: f64 = -30.0;

/// Rollout braking window (kt ground speed).
const BRAKE_MAX_SPEED_KT: f64 = 40.0;
const BRAKE_MIN_SPEED_KT: f64 = 5.0;

/// Full flaps notch.
const FULL_FLAPS: u32 = 4;

impl RuleEngine {
    pub(super) fn handle_landing(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let frame = ctx.frame;

        // Touchdown per the raw flag; the reliable determination lags a
        // few feet and the rollout actions are harmless a moment early
        let touched_down = frame.on_ground && frame.altitude_agl < 10.0;
        if touched_down {
            self.landing_rollout(ctx, queue);
        } else {
            self.landing_final(ctx, queue);
        }
    }

    /// Airborne: full flaps and a stepped power/sink reduction to the
    /// flare.
    fn landing_final(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let frame = ctx.frame;

        if frame.flaps_index < FULL_FLAPS && self.repeat_allowed(ctx.now, CommandKind::FlapsDown) {
            self.force_cmd_value(
                queue,
                ctx.now,
                CommandKind::FlapsDown,
                FULL_FLAPS as f64,
                "Full flaps",
            );
        }

        let agl = frame.altitude_agl;
        if agl > 100.0 {
            self.cmd_value(queue, ctx.now, CommandKind::ApVsVarSet, -300.0, "Final descent");
            self.cmd_value(queue, ctx.now, CommandKind::ThrottleSet, 35.0, "Final power");
        } else if agl > 50.0 {
            self.cmd_value(queue, ctx.now, CommandKind::ApVsVarSet, -200.0, "Short final");
            self.cmd_value(queue, ctx.now, CommandKind::ThrottleSet, 25.0, "Short final power");
        } else if agl > 20.0 {
            self.cmd_value(queue, ctx.now, CommandKind::ApVsVarSet, -100.0, "Over the threshold");
            self.cmd_value(queue, ctx.now, CommandKind::ThrottleSet, 15.0, "Threshold power");
        } else {
            // Flare: autopilot off, power off, hold the nose up
            self.cmd(queue, ctx.now, CommandKind::ApMaster, false, "Autopilot off for flare");
            self.cmd_value(queue, ctx.now, CommandKind::ThrottleSet, 0.0, "Power idle");
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::AxisElevatorSet,
                FLARE_ELEVATOR,
                "Flare",
            );
        }
    }

    /// On the runway: clean up and slow down.
    fn landing_rollout(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let frame = ctx.frame;

        self.cmd(queue, ctx.now, CommandKind::ApMaster, false, "Autopilot off");
        self.cmd_value(queue, ctx.now, CommandKind::ThrottleSet, 0.0, "Power idle");
        self.neutral_axes(queue, ctx.now);

        if frame.flaps_index > 0 {
            self.pulse(queue, ctx.now, CommandKind::FlapsUp, "Retract flaps");
        }

        if frame.ground_speed > BRAKE_MIN_SPEED_KT && frame.ground_speed < BRAKE_MAX_SPEED_KT {
            self.cmd_value(queue, ctx.now, CommandKind::ParkingBrakeSet, 1.0, "Braking");
        }
    }
}
