//! APPROACH: configure speed, flaps, and the best available lateral (and
//! vertical, when a glideslope is usable) guidance mode.

use crate::command::{Command, CommandKind, CommandQueue};

use super::{RuleEngine, TickContext};

/// Flap schedule steps by height above ground.
const FLAPS_TWO_BELOW_AGL_FT: f64 = 800.0;
const FLAPS_THREE_BELOW_AGL_FT: f64 = 400.0;

/// Landing lights come on passing this height inbound.
const LANDING_LIGHTS_AGL_FT: f64 = 3000.0;

/// Base approach throttle and its corrections.
const APPROACH_THROTTLE_PCT: f64 = 40.0;
const SLOW_THROTTLE_PCT: f64 = 55.0;
const FAST_THROTTLE_PCT: f64 = 25.0;

/// Margin over clean stall that triggers the power bump (kt).
const SLOW_MARGIN_KT: f64 = 10.0;

/// Margin below Vfe that triggers the power trim (kt).
const FAST_MARGIN_KT: f64 = 5.0;

impl RuleEngine {
    pub(super) fn handle_approach(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let frame = ctx.frame;
        let speeds = self.profile.speeds;

        self.cmd(queue, ctx.now, CommandKind::ApMaster, true, "Autopilot master");

        if ctx.phase_changed {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApSpdVarSet,
                self.profile.phase_speeds.approach,
                "Approach speed target",
            );
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ApVsVarSet,
                self.profile.descent.approach_rate,
                "Approach descent rate",
            );
        }

        if !self.landing_lights_commanded && frame.altitude_agl < LANDING_LIGHTS_AGL_FT {
            queue.enqueue(
                ctx.now,
                Command::bare(CommandKind::LandingLightsToggle, "Landing lights on"),
            );
            self.landing_lights_commanded = true;
        }

        self.approach_flap_schedule(ctx, queue);
        self.approach_nav_mode(ctx, queue);

        // Base power with corrections at the speed envelope edges
        let throttle = if frame.speed < speeds.vs1 + SLOW_MARGIN_KT {
            SLOW_THROTTLE_PCT
        } else if frame.speed > speeds.vfe - FAST_MARGIN_KT {
            FAST_THROTTLE_PCT
        } else {
            APPROACH_THROTTLE_PCT
        };
        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::ThrottleSet,
            throttle,
            "Approach power",
        );
    }

    /// Progressive flap extension: one notch on entry, two below 800 AGL,
    /// three below 400 AGL. Re-issued until the flaps indicate.
    fn approach_flap_schedule(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let agl = ctx.frame.altitude_agl;
        let desired: u32 = if agl < FLAPS_THREE_BELOW_AGL_FT {
            3
        } else if agl < FLAPS_TWO_BELOW_AGL_FT {
            2
        } else {
            1
        };

        if ctx.frame.flaps_index < desired && self.repeat_allowed(ctx.now, CommandKind::FlapsDown) {
            self.force_cmd_value(
                queue,
                ctx.now,
                CommandKind::FlapsDown,
                desired as f64,
                format!("Flaps {desired}"),
            );
        }
    }

    /// Pick the best guidance: coupled approach, lateral-only approach,
    /// nav heading, or the runway heading we departed from.
    fn approach_nav_mode(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        let glideslope_usable = ctx
            .nav
            .map(|n| n.cdi.gs_valid && n.approach.has_glideslope)
            .unwrap_or(false);
        let approach_loaded = ctx.nav.map(|n| n.approach.is_active()).unwrap_or(false);

        if glideslope_usable {
            self.cmd(
                queue,
                ctx.now,
                CommandKind::ApAprHold,
                true,
                "Approach mode, glideslope coupled",
            );
        } else if approach_loaded {
            self.cmd(
                queue,
                ctx.now,
                CommandKind::ApAprHold,
                true,
                "Approach mode, lateral only",
            );
        } else if ctx.guidance.is_some() {
            self.apply_lateral_nav(ctx, queue);
        } else if let Some(runway) = self.takeoff.runway_heading {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::HeadingBugSet,
                runway.round(),
                "Bug runway heading",
            );
            self.cmd(queue, ctx.now, CommandKind::ApHdgHold, true, "Heading hold");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::command::{CommandKind, CommandQueue, QueueConfig};
    use crate::engine::test_support::{drain_all, engine_and_queue, find, run_tick};
    use crate::engine::{RuleEngine, TickContext};
    use crate::nav::{ApproachInfo, CdiState, NavState};
    use crate::phase::FlightPhase;
    use crate::telemetry::TelemetryFrame;

    fn approach_frame(agl: f64) -> TelemetryFrame {
        TelemetryFrame {
            altitude: 5400.0 + agl,
            altitude_agl: agl,
            speed: 75.0,
            vertical_speed: -400.0,
            ap_master: true,
            ap_hdg_lock: true,
            ..Default::default()
        }
    }

    fn tick_with_nav(
        engine: &mut RuleEngine,
        queue: &mut CommandQueue,
        frame: &TelemetryFrame,
        nav: Option<&NavState>,
        phase_changed: bool,
        now: Instant,
    ) {
        queue.apply_mirror(frame);
        let ctx = TickContext {
            now,
            frame,
            phase: FlightPhase::Approach,
            phase_changed,
            guidance: None,
            nav,
            target_cruise_alt: 8000.0,
        };
        engine.tick(&ctx, queue);
    }

    #[test]
    fn test_entry_sets_speed_and_rate() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();

        run_tick(
            &mut engine,
            &mut queue,
            &approach_frame(1800.0),
            FlightPhase::Approach,
            true,
            now,
        );
        let drained = drain_all(&mut queue);

        let spd = find(&drained, CommandKind::ApSpdVarSet).unwrap();
        assert_eq!(spd.value.unwrap().as_number().unwrap(), 70.0);
        let vs = find(&drained, CommandKind::ApVsVarSet).unwrap();
        assert_eq!(vs.value.unwrap().as_number().unwrap(), -400.0);
        assert!(find(&drained, CommandKind::LandingLightsToggle).is_some());
    }

    #[test]
    fn test_flap_schedule_steps_down() {
        let cases = [(1500.0, 1.0), (700.0, 2.0), (300.0, 3.0)];
        for (agl, expected_notch) in cases {
            let (mut engine, mut queue) = engine_and_queue();
            let now = Instant::now();
            run_tick(
                &mut engine,
                &mut queue,
                &approach_frame(agl),
                FlightPhase::Approach,
                true,
                now,
            );
            let drained = drain_all(&mut queue);
            let flaps = find(&drained, CommandKind::FlapsDown).unwrap();
            assert_eq!(
                flaps.value.unwrap().as_number().unwrap(),
                expected_notch,
                "agl {agl}"
            );
        }
    }

    #[test]
    fn test_flaps_not_reissued_once_set() {
        let (mut engine, mut queue) = engine_and_queue();
        let mut now = Instant::now();
        let mut frame = approach_frame(1500.0);
        frame.flaps_index = 1;

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Approach, true, now);
        let drained = drain_all(&mut queue);
        assert!(find(&drained, CommandKind::FlapsDown).is_none());

        // Descending through 700: next notch
        frame.altitude_agl = 700.0;
        now += Duration::from_secs(2);
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Approach, false, now);
        let drained = drain_all(&mut queue);
        let flaps = find(&drained, CommandKind::FlapsDown).unwrap();
        assert_eq!(flaps.value.unwrap().as_number().unwrap(), 2.0);
    }

    #[test]
    fn test_coupled_approach_engages_apr() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        let nav = NavState {
            cdi: CdiState {
                gs_valid: true,
                ..Default::default()
            },
            approach: ApproachInfo {
                mode: "ILS".to_string(),
                name: "ILS 35R".to_string(),
                has_glideslope: true,
            },
            ..Default::default()
        };

        tick_with_nav(
            &mut engine,
            &mut queue,
            &approach_frame(1800.0),
            Some(&nav),
            true,
            now,
        );
        let drained = drain_all(&mut queue);
        let apr = find(&drained, CommandKind::ApAprHold).unwrap();
        assert!(apr.description.contains("glideslope"));
    }

    #[test]
    fn test_lateral_only_approach_engages_apr() {
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        let nav = NavState {
            approach: ApproachInfo {
                mode: "RNAV".to_string(),
                name: "RNAV 17".to_string(),
                has_glideslope: false,
            },
            ..Default::default()
        };

        tick_with_nav(
            &mut engine,
            &mut queue,
            &approach_frame(1800.0),
            Some(&nav),
            true,
            now,
        );
        let drained = drain_all(&mut queue);
        let apr = find(&drained, CommandKind::ApAprHold).unwrap();
        assert!(apr.description.contains("lateral"));
    }

    #[test]
    fn test_runway_heading_fallback() {
        let profile = std::sync::Arc::new(crate::profile::AircraftProfile::trainer());
        let mut engine = RuleEngine::new(std::sync::Arc::clone(&profile));
        let mut queue = CommandQueue::new(QueueConfig::default(), profile);
        let mut now = Instant::now();

        // Capture a runway heading via a takeoff entry
        let runway_frame = TelemetryFrame {
            on_ground: true,
            engine_running: true,
            heading: 172.0,
            ..Default::default()
        };
        run_tick(
            &mut engine,
            &mut queue,
            &runway_frame,
            FlightPhase::Takeoff,
            true,
            now,
        );
        drain_all(&mut queue);

        // Later, an approach with no nav data at all
        let mut frame = approach_frame(1500.0);
        frame.ap_hdg_lock = false;
        now += Duration::from_secs(5);
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Approach, true, now);
        let drained = drain_all(&mut queue);

        let bug = find(&drained, CommandKind::HeadingBugSet).unwrap();
        assert_eq!(bug.value.unwrap().as_number().unwrap(), 172.0);
        assert!(find(&drained, CommandKind::ApHdgHold).is_some());
    }

    #[test]
    fn test_throttle_corrections_at_speed_edges() {
        // Slow: below Vs1 + 10 = 58
        let (mut engine, mut queue) = engine_and_queue();
        let now = Instant::now();
        let mut frame = approach_frame(1000.0);
        frame.speed = 56.0;
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Approach, true, now);
        let drained = drain_all(&mut queue);
        let throttle = find(&drained, CommandKind::ThrottleSet).unwrap();
        assert_eq!(throttle.value.unwrap().as_number().unwrap(), 55.0);

        // Fast: above Vfe - 5 = 80
        let (mut engine, mut queue) = engine_and_queue();
        let mut frame = approach_frame(1000.0);
        frame.speed = 82.0;
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Approach, true, now);
        let drained = drain_all(&mut queue);
        let throttle = find(&drained, CommandKind::ThrottleSet).unwrap();
        assert_eq!(throttle.value.unwrap().as_number().unwrap(), 25.0);
    }
}
