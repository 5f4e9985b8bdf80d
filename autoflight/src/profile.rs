//! Aircraft performance profile.
//!
//! One [`AircraftProfile`] is loaded at startup and shared read-only across
//! the supervisor. It carries the speed schedule, climb/descent planning
//! numbers, safety limits, and per-phase target speeds that the rule engine
//! and the command queue clamp against.
//!
//! Profiles are serde JSON; [`AircraftProfile::validate`] enforces the
//! structural invariants (monotone speed schedule, climb positive, descent
//! negative) so a bad file fails at load instead of mid-flight.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::phase::FlightPhase;

/// Errors raised when loading or validating a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse profile: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("speed schedule must satisfy Vs1 < Vr < Vy < Vcruise < Vno < Vne (got {0})")]
    SpeedOrder(String),

    #[error("climb.normalRate must be positive, got {0}")]
    ClimbRate(f64),

    #[error("descent rates must be negative, got normal={normal} approach={approach}")]
    DescentRate { normal: f64, approach: f64 },

    #[error("limits.maxBank must be positive, got {0}")]
    MaxBank(f64),
}

/// V-speed schedule in knots indicated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedSchedule {
    /// Rotation speed.
    pub vr: f64,
    /// Best-angle climb.
    pub vx: f64,
    /// Best-rate climb.
    pub vy: f64,
    /// Normal cruise.
    pub vcruise: f64,
    /// Maximum flaps-extended.
    pub vfe: f64,
    /// Maximum structural cruising.
    pub vno: f64,
    /// Never exceed.
    pub vne: f64,
    /// Reference approach speed.
    pub vref: f64,
    /// Stall, landing configuration.
    pub vs0: f64,
    /// Stall, clean configuration.
    pub vs1: f64,
}

/// Climb planning numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimbSpec {
    /// Normal climb rate in fpm (positive).
    pub normal_rate: f64,
    /// Throttle held during climb, percent.
    #[serde(default = "default_climb_throttle")]
    pub throttle_pct: f64,
}

fn default_climb_throttle() -> f64 {
    100.0
}

/// Descent planning numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescentSpec {
    /// Normal descent rate in fpm (negative).
    pub normal_rate: f64,
    /// Approach descent rate in fpm (negative).
    pub approach_rate: f64,
    /// Top-of-descent factor: NM of descent per 1000 ft above field.
    pub tod_factor: f64,
}

/// Operating limits used by the safety envelope and command clamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    /// Service ceiling in feet MSL.
    pub ceiling: f64,
    /// Hard altitude-command ceiling; falls back to `ceiling` when absent.
    #[serde(default)]
    pub max_alt: Option<f64>,
    /// Maximum commandable vertical speed in fpm (positive).
    pub max_vs: f64,
    /// Minimum commandable vertical speed in fpm (negative).
    pub min_vs: f64,
    /// Maximum bank angle in degrees.
    pub max_bank: f64,
}

impl Limits {
    /// The effective altitude-command clamp.
    pub fn altitude_clamp(&self) -> f64 {
        self.max_alt.unwrap_or(self.ceiling)
    }
}

/// Target indicated airspeeds per flight phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSpeeds {
    pub climb: f64,
    pub cruise: f64,
    pub descent: f64,
    pub approach: f64,
}

impl PhaseSpeeds {
    /// Target speed for a phase, when one is defined.
    pub fn for_phase(&self, phase: FlightPhase) -> Option<f64> {
        match phase {
            FlightPhase::Climb => Some(self.climb),
            FlightPhase::Cruise => Some(self.cruise),
            FlightPhase::Descent => Some(self.descent),
            FlightPhase::Approach => Some(self.approach),
            _ => None,
        }
    }
}

/// Takeoff procedure tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoffSpec {
    /// Throttle percentage held through the takeoff roll.
    pub roll_throttle_pct: f64,
    /// Maximum nose-up elevator during rotation (negative = nose up).
    pub rotation_elevator_max: f64,
    /// Vertical speed commanded at autopilot handoff, fpm.
    pub departure_vs_fpm: f64,
}

impl Default for TakeoffSpec {
    fn default() -> Self {
        Self {
            roll_throttle_pct: 100.0,
            rotation_elevator_max: -8.0,
            departure_vs_fpm: 700.0,
        }
    }
}

/// Complete per-airframe configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftProfile {
    pub name: String,
    pub speeds: SpeedSchedule,
    pub climb: ClimbSpec,
    pub descent: DescentSpec,
    pub limits: Limits,
    pub phase_speeds: PhaseSpeeds,
    #[serde(default)]
    pub takeoff: TakeoffSpec,
    /// Heading to hold during taxi, when the scenario defines one.
    #[serde(default)]
    pub taxi_heading: Option<f64>,
}

impl AircraftProfile {
    /// Load and validate a profile from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let raw = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&raw)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Enforce the structural invariants.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let s = &self.speeds;
        let ordered = [s.vs1, s.vr, s.vy, s.vcruise, s.vno, s.vne];
        if !ordered.windows(2).all(|w| w[0] < w[1]) {
            return Err(ProfileError::SpeedOrder(format!(
                "Vs1={} Vr={} Vy={} Vcruise={} Vno={} Vne={}",
                s.vs1, s.vr, s.vy, s.vcruise, s.vno, s.vne
            )));
        }
        if self.climb.normal_rate <= 0.0 {
            return Err(ProfileError::ClimbRate(self.climb.normal_rate));
        }
        if self.descent.normal_rate >= 0.0 || self.descent.approach_rate >= 0.0 {
            return Err(ProfileError::DescentRate {
                normal: self.descent.normal_rate,
                approach: self.descent.approach_rate,
            });
        }
        if self.limits.max_bank <= 0.0 {
            return Err(ProfileError::MaxBank(self.limits.max_bank));
        }
        Ok(())
    }

    /// Built-in single-engine trainer profile.
    ///
    /// Numbers approximate a Cessna 172S; used by the CLI when no profile
    /// file is given and by tests throughout the crate.
    pub fn trainer() -> Self {
        Self {
            name: "Single-engine trainer".to_string(),
            speeds: SpeedSchedule {
                vr: 55.0,
                vx: 62.0,
                vy: 74.0,
                vcruise: 110.0,
                vfe: 85.0,
                vno: 129.0,
                vne: 163.0,
                vref: 65.0,
                vs0: 40.0,
                vs1: 48.0,
            },
            climb: ClimbSpec {
                normal_rate: 700.0,
                throttle_pct: 100.0,
            },
            descent: DescentSpec {
                normal_rate: -500.0,
                approach_rate: -400.0,
                tod_factor: 3.0,
            },
            limits: Limits {
                ceiling: 14000.0,
                max_alt: None,
                max_vs: 1500.0,
                min_vs: -1500.0,
                max_bank: 25.0,
            },
            phase_speeds: PhaseSpeeds {
                climb: 74.0,
                cruise: 110.0,
                descent: 105.0,
                approach: 70.0,
            },
            takeoff: TakeoffSpec::default(),
            taxi_heading: None,
        }
    }
}

impl Default for AircraftProfile {
    fn default() -> Self {
        Self::trainer()
    }
}
