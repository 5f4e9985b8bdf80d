//! CRUISE: altitude hold with closed-loop throttle toward the cruise
//! speed, steering from nav guidance.

use crate::command::{CommandKind, CommandQueue};

use super::{RuleEngine, TickContext};

impl RuleEngine {
    pub(super) fn handle_cruise(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let speeds = self.profile.speeds;

        self.cmd(queue, ctx.now, CommandKind::ApMaster, true, "Autopilot master");

        if ctx.phase_changed {
            self.force_cmd(queue, ctx.now, CommandKind::ApAltHold, true, "Altitude hold");
            self.cmd_value(queue, ctx.now, CommandKind::ApVsVarSet, 0.0, "Level off");
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApSpdVarSet,
                speeds.vcruise,
                "Cruise speed target",
            );
        }

        self.apply_lateral_nav(ctx, queue);

        // Closed-loop throttle: stepped bands around the cruise target
        let delta = speeds.vcruise - ctx.frame.speed;
        let throttle = if delta > 15.0 {
            100.0
        } else if delta > 5.0 {
            90.0
        } else if delta > -5.0 {
            80.0
        } else {
            70.0
        };
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ThrottleSet,
            throttle,
            format!("Cruise power for {:.0} kt", speeds.vcruise),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::command::CommandKind;
    use crate::engine::test_support::{drain_all, engine_and_queue, find, run_tick};
    use crate::phase::FlightPhase;
    use crate::telemetry::TelemetryFrame;

    fn cruise_frame(speed: f64) -> TelemetryFrame {
        TelemetryFrame {
            altitude: 8000.0,
            altitude_agl: 2600.0,
            speed,
            ap_master: true,
            ap_hdg_lock: true,
            // Arriving from a climb: the VS target is still dialed in
            ap_vs_set: 700.0,
            ap_vs_lock: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_cruise_entry_levels_off() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();

        run_tick(
            &mut engine,
            &mut queue,
            &cruise_frame(110.0),
            FlightPhase::Cruise,
            true,
            now,
        );
        let drained = drain_all(&mut queue);

        assert!(find(&drained, CommandKind::ApAltHold).is_some());
        let vs = find(&drained, CommandKind::ApVsVarSet).unwrap();
        assert_eq!(vs.value.unwrap().as_number().unwrap(), 0.0);
        let spd = find(&drained, CommandKind::ApSpdVarSet).unwrap();
        assert_eq!(spd.value.unwrap().as_number().unwrap(), 110.0);
    }

    #[test]
    fn test_throttle_bands_track_speed_error() {
        let cases = [
            (90.0, 100.0),  // 20 kt slow: full power
            (100.0, 90.0),  // 10 kt slow
            (110.0, 80.0),  // on speed
            (120.0, 70.0),  // 10 kt fast
        ];
        for (speed, expected) in cases {
            let (mut engine, mut queue) = engine_and_queue();
            let now = Instant::now();
            run_tick(
                &mut engine,
                &mut queue,
                &cruise_frame(speed),
                FlightPhase::Cruise,
                true,
                now,
            );
            let drained = drain_all(&mut queue);
            let throttle = find(&drained, CommandKind::ThrottleSet).unwrap();
            assert_eq!(
                throttle.value.unwrap().as_number().unwrap(),
                expected,
                "speed {speed}"
            );
        }
    }

    #[test]
    fn test_throttle_follows_changing_speed() {
        let (mut engine, mut queue) = engine_and_queue();
        let mut now = Instant::now();

        run_tick(
            &mut engine,
            &mut queue,
            &cruise_frame(110.0),
            FlightPhase::Cruise,
            true,
            now,
        );
        drain_all(&mut queue);

        // Slowing down: power comes up
        now += Duration::from_secs(1);
        run_tick(
            &mut engine,
            &mut queue,
            &cruise_frame(95.0),
            FlightPhase::Cruise,
            false,
            now,
        );
        let drained = drain_all(&mut queue);
        let throttle = find(&drained, CommandKind::ThrottleSet).unwrap();
        assert_eq!(throttle.value.unwrap().as_number().unwrap(), 100.0);
    }
}
