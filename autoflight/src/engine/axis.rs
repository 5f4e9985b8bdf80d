//! Proportional axis helpers shared by the phase handlers.
//!
//! All deflections are in the simulator's signed axis units, nominal range
//! -100..100. Sign conventions the handlers rely on:
//!
//! - **Elevator**: negative is nose up.
//! - **Ailerons**: positive rolls right; wings-level corrections are the
//!   *negation* of bank (right bank commands left aileron).
//! - **Rudder**: positive yaws right.
//!
//! A held-neutral axis is set to [`AXIS_HOLD_NEUTRAL`], never literal zero:
//! the bridge releases an axis back to the joystick on exact zero.

use crate::telemetry::TelemetryFrame;

use crate::nav::heading_error;

/// Neutral value for an axis that must stay under our control.
pub const AXIS_HOLD_NEUTRAL: f64 = 0.0001;

/// Proportional gain from pitch error (degrees) to elevator deflection.
const PITCH_GAIN: f64 = 1.5;

/// Proportional gain from heading error (degrees) to bank angle (degrees).
const HEADING_BANK_GAIN: f64 = 1.0;

/// Proportional gain from heading error (degrees) to rudder deflection.
const GROUND_STEER_GAIN: f64 = 3.0;

/// Rudder deflection cap while steering on the ground.
const GROUND_STEER_MAX_DEFLECTION: f64 = 50.0;

/// Ground speed above which rudder steering is abandoned (kt).
const GROUND_STEER_MAX_SPEED_KT: f64 = 40.0;

/// Gain from bank angle to the yaw-damping rudder bias.
const RUDDER_BIAS_GAIN: f64 = 0.4;

/// Elevator deflection that holds a target pitch attitude.
///
/// Proportional on pitch error, clamped to `max_deflection`. Nose-up
/// output is negative.
pub fn target_pitch(frame: &TelemetryFrame, target_deg: f64, max_deflection: f64) -> f64 {
    ((frame.pitch - target_deg) * PITCH_GAIN).clamp(-max_deflection, max_deflection)
}

/// Bank angle that turns the shortest way onto a target heading.
///
/// Wraps across north; the result is clamped to `max_bank` degrees either
/// side. Positive output banks right.
pub fn bank_to_heading(frame: &TelemetryFrame, target_heading: f64, max_bank: f64) -> f64 {
    (heading_error(frame.heading, target_heading) * HEADING_BANK_GAIN).clamp(-max_bank, max_bank)
}

/// Aileron deflection that levels the wings.
///
/// Correction opposes bank: right bank yields left aileron.
pub fn wings_level_aileron(bank_deg: f64, gain: f64, max_deflection: f64) -> f64 {
    (-bank_deg * gain).clamp(-max_deflection, max_deflection)
}

/// Rudder deflection that steers toward a heading on the ground.
///
/// Only effective below 40 kt ground speed; above that the rudder does the
/// steering aerodynamically and proportional nosewheel inputs oscillate.
pub fn ground_steer(frame: &TelemetryFrame, target_heading: f64) -> Option<f64> {
    if frame.ground_speed >= GROUND_STEER_MAX_SPEED_KT {
        return None;
    }
    let deflection = (heading_error(frame.heading, target_heading) * GROUND_STEER_GAIN)
        .clamp(-GROUND_STEER_MAX_DEFLECTION, GROUND_STEER_MAX_DEFLECTION);
    Some(deflection)
}

/// Yaw-damping rudder bias proportional to bank.
pub fn rudder_bias(frame: &TelemetryFrame, max_deflection: f64) -> f64 {
    (-frame.bank * RUDDER_BIAS_GAIN).clamp(-max_deflection, max_deflection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> TelemetryFrame {
        TelemetryFrame::default()
    }

    #[test]
    fn test_hold_neutral_is_not_zero() {
        assert!(AXIS_HOLD_NEUTRAL > 0.0);
        assert!(AXIS_HOLD_NEUTRAL < 0.001);
    }

    #[test]
    fn test_target_pitch_noses_up_when_low() {
        let mut f = frame();
        f.pitch = 2.0;
        // Below a 7 degree target: negative (nose-up) elevator
        let elevator = target_pitch(&f, 7.0, 20.0);
        assert_eq!(elevator, -7.5);
    }

    #[test]
    fn test_target_pitch_clamps() {
        let mut f = frame();
        f.pitch = -30.0;
        assert_eq!(target_pitch(&f, 7.0, 20.0), -20.0);
        f.pitch = 40.0;
        assert_eq!(target_pitch(&f, 7.0, 20.0), 20.0);
    }

    #[test]
    fn test_bank_to_heading_shortest_turn() {
        let mut f = frame();
        f.heading = 350.0;
        // 20 degrees right through north
        assert_eq!(bank_to_heading(&f, 10.0, 25.0), 20.0);
        f.heading = 10.0;
        assert_eq!(bank_to_heading(&f, 350.0, 25.0), -20.0);
    }

    #[test]
    fn test_bank_to_heading_clamps_to_max_bank() {
        let mut f = frame();
        f.heading = 0.0;
        assert_eq!(bank_to_heading(&f, 90.0, 25.0), 25.0);
        assert_eq!(bank_to_heading(&f, 270.0, 25.0), -25.0);
    }

    #[test]
    fn test_wings_level_opposes_bank() {
        // Right bank -> left aileron
        assert_eq!(wings_level_aileron(10.0, 2.0, 25.0), -20.0);
        // Left bank -> right aileron
        assert_eq!(wings_level_aileron(-5.0, 2.0, 25.0), 10.0);
        // Clamped
        assert_eq!(wings_level_aileron(30.0, 2.0, 25.0), -25.0);
    }

    #[test]
    fn test_ground_steer_inactive_at_speed() {
        let mut f = frame();
        f.ground_speed = 45.0;
        f.heading = 170.0;
        assert!(ground_steer(&f, 180.0).is_none());
    }

    #[test]
    fn test_ground_steer_proportional() {
        let mut f = frame();
        f.ground_speed = 10.0;
        f.heading = 175.0;
        assert_eq!(ground_steer(&f, 180.0), Some(15.0));
        f.heading = 185.0;
        assert_eq!(ground_steer(&f, 180.0), Some(-15.0));
    }

    #[test]
    fn test_ground_steer_clamps() {
        let mut f = frame();
        f.ground_speed = 5.0;
        f.heading = 90.0;
        assert_eq!(ground_steer(&f, 180.0), Some(50.0));
    }

    #[test]
    fn test_rudder_bias_opposes_bank() {
        let mut f = frame();
        f.bank = 10.0;
        assert_eq!(rudder_bias(&f, 30.0), -4.0);
        f.bank = -50.0;
        assert_eq!(rudder_bias(&f, 15.0), 15.0);
    }
}
