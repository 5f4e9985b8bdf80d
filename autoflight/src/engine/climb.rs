//! CLIMB: autopilot vertical-speed climb to the cruise altitude target.
//!
//! The commanded climb rate shallows proportionally as the stall margin
//! narrows. If the autopilot drops offline mid-climb the handler flies
//! wings-level pitch-hold manually while re-engaging it.

use crate::command::{CommandKind, CommandQueue};

use super::axis;
use super::envelope::STALL_MARGIN_CAUTION_KT;
use super::{RuleEngine, TickContext};

/// Pitch attitude held when flying the climb manually (deg).
const MANUAL_PITCH_TARGET_DEG: f64 = 7.0;

/// Manual elevator deflection cap.
const MANUAL_ELEVATOR_MAX: f64 = 20.0;

/// Manual aileron gain and cap.
const MANUAL_AILERON_GAIN: f64 = 0.6;
const MANUAL_AILERON_MAX: f64 = 25.0;

/// Floor on the stall-margin scale factor.
const VS_SCALE_FLOOR: f64 = 0.3;

/// Absolute floor on the commanded climb rate (fpm).
const VS_FLOOR_FPM: f64 = 200.0;

impl RuleEngine {
    pub(super) fn handle_climb(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let frame = ctx.frame;

        if ctx.phase_changed {
            // Coming out of a hand-flown takeoff: release the manual axes
            // and put the autopilot in a known lateral/vertical state
            self.neutral_axes(queue, ctx.now);
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::HeadingBugSet,
                frame.heading.round(),
                "Bug current heading",
            );
            self.force_cmd(queue, ctx.now, CommandKind::ApMaster, true, "Autopilot master on");
            self.force_cmd(queue, ctx.now, CommandKind::ApHdgHold, true, "Heading hold");
            self.force_cmd(queue, ctx.now, CommandKind::ApVsHold, true, "Vertical speed hold");
        }

        if frame.flaps_index > 0 {
            self.pulse(queue, ctx.now, CommandKind::FlapsUp, "Retract flaps");
        }

        self.apply_lateral_nav(ctx, queue);

        // Shallow the climb as the stall margin narrows
        let margin = self.last_envelope.stall_margin_kt;
        let normal_rate = self.profile.climb.normal_rate;
        let commanded_vs = if margin < STALL_MARGIN_CAUTION_KT {
            let scale = (margin / STALL_MARGIN_CAUTION_KT).max(VS_SCALE_FLOOR);
            (normal_rate * scale).max(VS_FLOOR_FPM)
        } else {
            normal_rate
        };
        let vs_description = if commanded_vs < normal_rate {
            format!("Climb rate shallowed, {margin:.0} kt stall margin")
        } else {
            "Climb rate".to_string()
        };
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ApVsVarSet,
            commanded_vs.round(),
            vs_description,
        );

        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ThrottleSet,
            self.profile.climb.throttle_pct,
            "Climb power",
        );

        if !self.climb_targets_set {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApAltVarSet,
                ctx.target_cruise_alt,
                "Cruise altitude target",
            );
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApSpdVarSet,
                self.profile.speeds.vy,
                "Best-rate climb speed",
            );
            self.climb_targets_set = true;
        }

        if !frame.ap_master && !ctx.phase_changed {
            self.climb_manual_fallback(ctx, queue);
        }
    }

    /// Keep climbing by hand while the autopilot refuses to engage.
    ///
    /// Wings level only; lateral navigation waits until the autopilot is
    /// back.
    fn climb_manual_fallback(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let frame = ctx.frame;

        let aileron =
            axis::wings_level_aileron(frame.bank, MANUAL_AILERON_GAIN, MANUAL_AILERON_MAX);
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisAileronsSet,
            aileron,
            "Manual wings level",
        );

        let elevator = axis::target_pitch(frame, MANUAL_PITCH_TARGET_DEG, MANUAL_ELEVATOR_MAX);
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::AxisElevatorSet,
            elevator,
            "Manual climb pitch",
        );

        if self.repeat_allowed(ctx.now, CommandKind::ApMaster) {
            self.force_cmd(
                queue,
                ctx.now,
                CommandKind::ApMaster,
                true,
                "Re-engaging autopilot",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::command::CommandKind;
    use crate::engine::test_support::{drain_all, engine_and_queue, find, run_tick};
    use crate::phase::FlightPhase;
    use crate::telemetry::TelemetryFrame;

    fn climbing_frame() -> TelemetryFrame {
        TelemetryFrame {
            altitude: 6500.0,
            altitude_agl: 1000.0,
            speed: 80.0,
            vertical_speed: 700.0,
            heading: 170.0,
            ap_master: true,
            ap_hdg_lock: true,
            ap_vs_lock: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_climb_entry_configures_autopilot() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        let mut frame = climbing_frame();
        frame.ap_master = false;
        frame.ap_hdg_lock = false;
        frame.ap_vs_lock = false;

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, true, now);
        let drained = drain_all(&mut queue);

        assert!(find(&drained, CommandKind::ApMaster).is_some());
        assert!(find(&drained, CommandKind::ApHdgHold).is_some());
        assert!(find(&drained, CommandKind::ApVsHold).is_some());
        let vs = find(&drained, CommandKind::ApVsVarSet).unwrap();
        assert_eq!(vs.value.unwrap().as_number().unwrap(), 700.0);
        let alt = find(&drained, CommandKind::ApAltVarSet).unwrap();
        assert_eq!(alt.value.unwrap().as_number().unwrap(), 8000.0);
        let spd = find(&drained, CommandKind::ApSpdVarSet).unwrap();
        assert_eq!(spd.value.unwrap().as_number().unwrap(), 74.0);
    }

    #[test]
    fn test_climb_rate_shallowed_near_stall() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        // 65 kt: margin over (Vs1+10)=58 is 7 kt, scale 7/15 = 0.467
        let mut frame = climbing_frame();
        frame.speed = 65.0;

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, true, now);
        let drained = drain_all(&mut queue);

        let vs = find(&drained, CommandKind::ApVsVarSet).unwrap();
        let rate = vs.value.unwrap().as_number().unwrap();
        assert!(
            (rate - 327.0).abs() < 2.0,
            "expected ~327 fpm at 7 kt margin, got {rate}"
        );
        assert!(vs.description.contains("stall margin"));
    }

    #[test]
    fn test_climb_rate_floors_at_200() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        let mut frame = climbing_frame();
        frame.speed = 56.0; // below the caution floor entirely

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, true, now);
        let drained = drain_all(&mut queue);

        let vs = find(&drained, CommandKind::ApVsVarSet).unwrap();
        assert_eq!(vs.value.unwrap().as_number().unwrap(), 210.0);
    }

    #[test]
    fn test_targets_set_once() {
        let (mut engine, mut queue) = engine_and_queue();
        let mut now = Instant::now();
        let frame = climbing_frame();

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, true, now);
        drain_all(&mut queue);

        // Subsequent ticks do not re-issue the altitude/speed targets
        now += Duration::from_secs(1);
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, false, now);
        let drained = drain_all(&mut queue);
        assert!(find(&drained, CommandKind::ApAltVarSet).is_none());
        assert!(find(&drained, CommandKind::ApSpdVarSet).is_none());
    }

    #[test]
    fn test_manual_fallback_when_ap_drops() {
        let (mut engine, mut queue) = engine_and_queue();
        let mut now = Instant::now();
        let mut frame = climbing_frame();

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, true, now);
        drain_all(&mut queue);

        // Autopilot drops offline, wings banked, nose low
        frame.ap_master = false;
        frame.bank = 10.0;
        frame.pitch = 2.0;
        now += Duration::from_secs(2);
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, false, now);
        let drained = drain_all(&mut queue);

        let aileron = find(&drained, CommandKind::AxisAileronsSet).unwrap();
        assert_eq!(aileron.value.unwrap().as_number().unwrap(), -6.0);
        let elevator = find(&drained, CommandKind::AxisElevatorSet).unwrap();
        assert_eq!(elevator.value.unwrap().as_number().unwrap(), -7.5);
        let master = find(&drained, CommandKind::ApMaster).unwrap();
        assert!(master.description.contains("Re-engaging"));
    }

    #[test]
    fn test_manual_fallback_ignores_nav_guidance() {
        use crate::engine::{RuleEngine, TickContext};
        use crate::nav::{GuidanceSource, NavGuidance};

        fn tick_with_guidance(
            engine: &mut RuleEngine,
            queue: &mut crate::command::CommandQueue,
            frame: &TelemetryFrame,
            phase_changed: bool,
            now: Instant,
        ) {
            queue.apply_mirror(frame);
            let ctx = TickContext {
                now,
                frame,
                phase: FlightPhase::Climb,
                phase_changed,
                guidance: Some(NavGuidance {
                    heading: 90.0,
                    source: GuidanceSource::FlightPlan,
                    wind_correction_deg: None,
                }),
                nav: None,
                target_cruise_alt: 8000.0,
            };
            engine.tick(&ctx, queue);
        }

        let (mut engine, mut queue) = engine_and_queue();
        let mut now = Instant::now();
        let mut frame = climbing_frame();
        tick_with_guidance(&mut engine, &mut queue, &frame, true, now);
        drain_all(&mut queue);

        // Autopilot drops with guidance calling for a turn to 090: the
        // fallback still only levels the wings
        frame.ap_master = false;
        frame.bank = 10.0;
        frame.pitch = 2.0;
        now += Duration::from_secs(2);
        tick_with_guidance(&mut engine, &mut queue, &frame, false, now);
        let drained = drain_all(&mut queue);

        let aileron = find(&drained, CommandKind::AxisAileronsSet).unwrap();
        assert_eq!(aileron.value.unwrap().as_number().unwrap(), -6.0);
    }

    #[test]
    fn test_flaps_retracted_during_climb() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        let mut frame = climbing_frame();
        frame.flaps_index = 2;

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Climb, true, now);
        let drained = drain_all(&mut queue);
        assert!(find(&drained, CommandKind::FlapsUp).is_some());
    }
}
