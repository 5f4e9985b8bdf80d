//! Ground handlers: PREFLIGHT does nothing; TAXI keeps the aircraft
//! rolling safely until the takeoff roll begins.

use crate::command::{CommandKind, CommandQueue};

use super::axis;
use super::{RuleEngine, TickContext};

/// Mixture kept full rich on the ground.
const MIXTURE_RICH_PCT: f64 = 100.0;

impl RuleEngine {
    /// TAXI: brake released, mixture rich, optional heading steer.
    pub(super) fn handle_taxi(&mut self, ctx: &TickContext<'_>, queue: &mut CommandQueue) {
        if ctx.phase_changed {
            self.cmd_value(
                queue,
                ctx.now,
                CommandKind::ParkingBrakeSet,
                0.0,
                "Release parking brake",
            );
        }

        self.cmd_value(
            queue,
            ctx.now,
            CommandKind::MixtureSet,
            MIXTURE_RICH_PCT,
            "Mixture rich for taxi",
        );

        if let Some(target) = self.profile.taxi_heading {
            if let Some(rudder) = axis::ground_steer(ctx.frame, target) {
                self.cmd_value(
                    queue,
                    ctx.now,
                    CommandKind::AxisRudderSet,
                    rudder,
                    format!("Taxi steer to {target:.0}"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use crate::command::{CommandKind, CommandQueue, QueueConfig};
    use crate::engine::test_support::{drain_all, find, run_tick};
    use crate::engine::RuleEngine;
    use crate::phase::FlightPhase;
    use crate::profile::AircraftProfile;
    use crate::telemetry::TelemetryFrame;

    #[test]
    fn test_taxi_entry_releases_brake_and_sets_mixture() {
        let (mut engine, mut queue) = crate::engine::test_support::engine_and_queue();
        let now = Instant::now();
        let frame = TelemetryFrame {
            on_ground: true,
            engine_running: true,
            ground_speed: 5.0,
            ..Default::default()
        };

        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Taxi, true, now);
        let drained = drain_all(&mut queue);

        let brake = find(&drained, CommandKind::ParkingBrakeSet).unwrap();
        assert_eq!(brake.value.unwrap().as_number().unwrap(), 0.0);
        let mixture = find(&drained, CommandKind::MixtureSet).unwrap();
        assert_eq!(mixture.value.unwrap().as_number().unwrap(), 100.0);
    }

    #[test]
    fn test_taxi_steers_to_configured_heading() {
        let mut profile = AircraftProfile::trainer();
        profile.taxi_heading = Some(180.0);
        let profile = Arc::new(profile);
        let mut engine = RuleEngine::new(Arc::clone(&profile));
        let mut queue = CommandQueue::new(QueueConfig::default(), profile);

        let now = Instant::now();
        let frame = TelemetryFrame {
            on_ground: true,
            engine_running: true,
            ground_speed: 8.0,
            heading: 170.0,
            ..Default::default()
        };
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Taxi, true, now);

        let drained = drain_all(&mut queue);
        let rudder = find(&drained, CommandKind::AxisRudderSet).unwrap();
        // 10 degrees right of the nose: positive rudder
        assert!(rudder.value.unwrap().as_number().unwrap() > 0.0);
    }

    #[test]
    fn test_taxi_without_heading_leaves_rudder_alone() {
        let (mut engine, mut queue) = crate::engine::test_support::engine_and_queue();
        let now = Instant::now();
        let frame = TelemetryFrame {
            on_ground: true,
            engine_running: true,
            ground_speed: 5.0,
            ..Default::default()
        };
        run_tick(&mut engine, &mut queue, &frame, FlightPhase::Taxi, true, now);

        let drained = drain_all(&mut queue);
        assert!(find(&drained, CommandKind::AxisRudderSet).is_none());
    }
}
