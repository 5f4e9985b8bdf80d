//! Command vocabulary shared by the rule engine, queue, and bridge.
//!
//! A [`Command`] pairs a [`CommandKind`] with an optional value and a
//! human-readable description for the timeline. Kinds partition by shape:
//!
//! - **toggles**: sent as a bare identifier on the wire (`AP_MASTER`,
//!   `FLAPS_UP`); the attached boolean records the *intended* state for
//!   deduplication against the autopilot mirror.
//! - **value-set**: sent as `{command, value}` (`HEADING_BUG_SET`,
//!   `THROTTLE_SET`, the `AXIS_*` family).

use serde::Serialize;

/// Autopilot axes a pilot override can suppress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverrideAxis {
    Hdg,
    Alt,
    Vs,
    Spd,
    Nav,
    Apr,
    Master,
}

impl OverrideAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideAxis::Hdg => "HDG",
            OverrideAxis::Alt => "ALT",
            OverrideAxis::Vs => "VS",
            OverrideAxis::Spd => "SPD",
            OverrideAxis::Nav => "NAV",
            OverrideAxis::Apr => "APR",
            OverrideAxis::Master => "MASTER",
        }
    }
}

impl std::fmt::Display for OverrideAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every command the supervisor can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ApMaster,
    ApHdgHold,
    ApAltHold,
    ApVsHold,
    ApNav1Hold,
    ApAprHold,
    ApAirspeedHold,
    HeadingBugSet,
    ApAltVarSet,
    ApVsVarSet,
    ApSpdVarSet,
    FlapsUp,
    FlapsDown,
    ThrottleSet,
    MixtureSet,
    AxisElevatorSet,
    AxisAileronsSet,
    AxisRudderSet,
    ParkingBrakeSet,
    SteeringSet,
    ElevTrimUp,
    LandingLightsToggle,
}

impl CommandKind {
    /// Identifier used on the simulator wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            CommandKind::ApMaster => "AP_MASTER",
            CommandKind::ApHdgHold => "AP_HDG_HOLD",
            CommandKind::ApAltHold => "AP_ALT_HOLD",
            CommandKind::ApVsHold => "AP_VS_HOLD",
            CommandKind::ApNav1Hold => "AP_NAV1_HOLD",
            CommandKind::ApAprHold => "AP_APR_HOLD",
            CommandKind::ApAirspeedHold => "AP_AIRSPEED_HOLD",
            CommandKind::HeadingBugSet => "HEADING_BUG_SET",
            CommandKind::ApAltVarSet => "AP_ALT_VAR_SET_ENGLISH",
            CommandKind::ApVsVarSet => "AP_VS_VAR_SET_ENGLISH",
            CommandKind::ApSpdVarSet => "AP_SPD_VAR_SET",
            CommandKind::FlapsUp => "FLAPS_UP",
            CommandKind::FlapsDown => "FLAPS_DOWN",
            CommandKind::ThrottleSet => "THROTTLE_SET",
            CommandKind::MixtureSet => "MIXTURE_SET",
            CommandKind::AxisElevatorSet => "AXIS_ELEVATOR_SET",
            CommandKind::AxisAileronsSet => "AXIS_AILERONS_SET",
            CommandKind::AxisRudderSet => "AXIS_RUDDER_SET",
            CommandKind::ParkingBrakeSet => "PARKING_BRAKE_SET",
            CommandKind::SteeringSet => "STEERING_SET",
            CommandKind::ElevTrimUp => "ELEV_TRIM_UP",
            CommandKind::LandingLightsToggle => "LANDING_LIGHTS_TOGGLE",
        }
    }

    /// Whether the wire form is a bare identifier.
    pub fn is_toggle(&self) -> bool {
        matches!(
            self,
            CommandKind::ApMaster
                | CommandKind::ApHdgHold
                | CommandKind::ApAltHold
                | CommandKind::ApVsHold
                | CommandKind::ApNav1Hold
                | CommandKind::ApAprHold
                | CommandKind::ApAirspeedHold
                | CommandKind::FlapsUp
                | CommandKind::ElevTrimUp
                | CommandKind::LandingLightsToggle
        )
    }

    /// The pilot-override axis this command belongs to, if any.
    pub fn override_axis(&self) -> Option<OverrideAxis> {
        match self {
            CommandKind::ApHdgHold | CommandKind::HeadingBugSet => Some(OverrideAxis::Hdg),
            CommandKind::ApAltHold | CommandKind::ApAltVarSet => Some(OverrideAxis::Alt),
            CommandKind::ApVsHold | CommandKind::ApVsVarSet => Some(OverrideAxis::Vs),
            CommandKind::ApSpdVarSet | CommandKind::ApAirspeedHold => Some(OverrideAxis::Spd),
            CommandKind::ApNav1Hold => Some(OverrideAxis::Nav),
            CommandKind::ApAprHold => Some(OverrideAxis::Apr),
            CommandKind::ApMaster => Some(OverrideAxis::Master),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// The value carried by a command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandValue {
    Number(f64),
    Bool(bool),
}

/// Numeric values closer than this are considered the same command.
pub const NUMERIC_DEDUP_EPSILON: f64 = 1.0;

impl CommandValue {
    /// Duplicate test: boolean equality, numeric within
    /// [`NUMERIC_DEDUP_EPSILON`].
    pub fn is_duplicate_of(&self, other: &CommandValue) -> bool {
        match (self, other) {
            (CommandValue::Bool(a), CommandValue::Bool(b)) => a == b,
            (CommandValue::Number(a), CommandValue::Number(b)) => {
                (a - b).abs() < NUMERIC_DEDUP_EPSILON
            }
            _ => false,
        }
    }

    /// The numeric payload, when present.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CommandValue::Number(n) => Some(*n),
            CommandValue::Bool(_) => None,
        }
    }

    /// The boolean payload, when present.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CommandValue::Bool(b) => Some(*b),
            CommandValue::Number(_) => None,
        }
    }
}

impl std::fmt::Display for CommandValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandValue::Number(n) => write!(f, "{n}"),
            CommandValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A desired command, as produced by the rule engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub value: Option<CommandValue>,
    pub description: String,
}

impl Command {
    /// A toggle with an intended on/off state.
    pub fn toggle(kind: CommandKind, on: bool, description: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(CommandValue::Bool(on)),
            description: description.into(),
        }
    }

    /// A value-set command.
    pub fn value(kind: CommandKind, value: f64, description: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(CommandValue::Number(value)),
            description: description.into(),
        }
    }

    /// A bare command with no tracked state (e.g. a trim pulse).
    pub fn bare(kind: CommandKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            value: None,
            description: description.into(),
        }
    }
}
