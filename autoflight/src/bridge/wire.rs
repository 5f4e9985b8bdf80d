//! Wire encoding for the simulator bridge.
//!
//! Outbound frames are either a bare command identifier (toggles) or a
//! `{command, value}` object (value-set commands). Inbound frames are JSON
//! telemetry objects with the fields of
//! [`TelemetryFrame`](crate::telemetry::TelemetryFrame).

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::command::{Command, CommandValue};
use crate::telemetry::TelemetryFrame;

/// A command in its simulator wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum WireCommand {
    /// A bare identifier, e.g. `"AP_MASTER"`.
    Toggle(&'static str),
    /// A `{command, value}` frame, e.g. `{"command": "THROTTLE_SET",
    /// "value": 80}`.
    Set {
        command: &'static str,
        value: CommandValue,
    },
}

impl WireCommand {
    /// The command identifier regardless of shape.
    pub fn name(&self) -> &'static str {
        match self {
            WireCommand::Toggle(name) => name,
            WireCommand::Set { command, .. } => command,
        }
    }

    /// Encode to the JSON text the bridge expects.
    pub fn to_wire_json(&self) -> String {
        // Serialization of these shapes cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&Command> for WireCommand {
    fn from(cmd: &Command) -> Self {
        match cmd.value {
            Some(value) if !cmd.kind.is_toggle() => WireCommand::Set {
                command: cmd.kind.wire_name(),
                value,
            },
            _ => WireCommand::Toggle(cmd.kind.wire_name()),
        }
    }
}

impl Serialize for WireCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WireCommand::Toggle(name) => serializer.serialize_str(name),
            WireCommand::Set { command, value } => {
                let mut frame = serializer.serialize_struct("WireCommand", 2)?;
                frame.serialize_field("command", command)?;
                frame.serialize_field("value", value)?;
                frame.end()
            }
        }
    }
}

/// Decode an inbound telemetry frame, sanitizing non-finite numerics.
pub fn decode_telemetry(text: &str) -> Result<TelemetryFrame, serde_json::Error> {
    let frame = TelemetryFrame::deserialize(&mut serde_json::Deserializer::from_str(text))?;
    Ok(frame.sanitize())
}
