//! DESCENT: vertical-speed descent at the profile rate, throttle banded
//! around the descent speed target.

use crate::command::{CommandKind, CommandQueue};

use super::{RuleEngine, TickContext};

impl RuleEngine {
    pub(super) fn handle_descent(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        self.cmd(queue, ctx.now, CommandKind::ApMaster, true, "Autopilot master");

        if ctx.phase_changed {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApAltVarSet,
                ctx.target_cruise_alt,
                "Descent reference altitude",
            );
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApSpdVarSet,
                self.profile.phase_speeds.descent,
                "Descent speed target",
            );
            // ALT_HOLD would pin us at cruise; VS mode flies the descent
            self.cmd(queue, ctx.now, CommandKind::ApAltHold, false, "Altitude hold off");
            self.force_cmd(queue, ctx.now, CommandKind::ApVsHold, true, "Vertical speed hold");
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApVsVarSet,
                self.profile.descent.normal_rate,
                "Descent rate",
            );
        }

        self.apply_lateral_nav(ctx, queue);

        // Banded throttle around the descent speed target
        let delta = self.profile.phase_speeds.descent - ctx.frame.speed;
        let throttle = if delta > 10.0 {
            75.0
        } else if delta > 0.0 {
            60.0
        } else if delta > -10.0 {
            40.0
        } else {
            25.0
        };
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ThrottleSet,
            throttle,
            "Descent power",
        );
    }
}
