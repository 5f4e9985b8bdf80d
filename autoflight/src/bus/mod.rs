//! In-process pub/sub synchronization bus.
//!
//! Collaborators (the GPS unit, the TAWS alerter, flight-plan importers)
//! and the supervisor exchange self-describing `{type, data}` messages on
//! the broadcast channel named [`SYNC_CHANNEL`]. Delivery is best-effort
//! and at-most-once; consumers keep only the latest message per type, so a
//! lagging subscriber losing an old nav state is harmless.

mod publisher;

pub use publisher::StatePublisher;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::engine::TakeoffSubPhase;
use crate::nav::{FlightPlan, NavState};
use crate::phase::FlightPhase;

/// Name of the broadcast channel shared with collaborators.
pub const SYNC_CHANNEL: &str = "sync";

/// Default broadcast capacity; late subscribers only care about the most
/// recent message per type anyway.
const DEFAULT_BUS_CAPACITY: usize = 64;

/// Terrain alert severity from the TAWS collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerrainAlertLevel {
    Warning,
    Caution,
}

/// A TAWS alert message; `level: None` clears the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TawsAlert {
    pub level: Option<TerrainAlertLevel>,
}

/// An external waypoint-sequencing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointSequence {
    pub index: usize,
}

/// Commanded-target block of the autopilot-state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetsSnapshot {
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub vs: Option<f64>,
}

/// Autopilot annunciator block of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApBits {
    pub master: bool,
    pub hdg: bool,
    pub alt: bool,
    pub vs: bool,
    pub spd: bool,
    pub nav: bool,
    pub apr: bool,
}

/// The supervisor's 1 Hz state broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotStateSnapshot {
    /// Whether the supervisor believes the autopilot is flying.
    pub enabled: bool,
    pub phase: FlightPhase,
    pub takeoff_sub_phase: Option<TakeoffSubPhase>,
    pub targets: TargetsSnapshot,
    pub ap: ApBits,
    pub terrain_alert: Option<TerrainAlertLevel>,
    pub envelope_alert: Option<String>,
    /// Human-readable active guidance, e.g. `FPL 251 (wind -4)`.
    pub nav_guidance: Option<String>,
    /// Description of the most recently executed command.
    pub last_command: Option<String>,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

/// Messages exchanged on the sync channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SyncMessage {
    NavState(NavState),
    TawsAlert(TawsAlert),
    SimbriefPlan(FlightPlan),
    WaypointSequence(WaypointSequence),
    AutopilotState(AutopilotStateSnapshot),
}

impl SyncMessage {
    /// The wire `type` tag of this message.
    pub fn type_tag(&self) -> &'static str {
        match self {
            SyncMessage::NavState(_) => "nav-state",
            SyncMessage::TawsAlert(_) => "taws-alert",
            SyncMessage::SimbriefPlan(_) => "simbrief-plan",
            SyncMessage::WaypointSequence(_) => "waypoint-sequence",
            SyncMessage::AutopilotState(_) => "autopilot-state",
        }
    }
}

/// Handle to the broadcast bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<SyncMessage>,
}

impl SyncBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Create a bus with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a message; returns how many subscribers saw it.
    ///
    /// A bus with no subscribers is not an error (best-effort semantics).
    pub fn publish(&self, message: SyncMessage) -> usize {
        trace!(channel = SYNC_CHANNEL, message_type = message.type_tag(), "Bus publish");
        self.tx.send(message).unwrap_or(0)
    }

    /// Subscribe to all messages on the channel.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncMessage> {
        self.tx.subscribe()
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format_is_type_data() {
        let message = SyncMessage::WaypointSequence(WaypointSequence { index: 2 });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "waypoint-sequence");
        assert_eq!(json["data"]["index"], 2);
    }

    #[test]
    fn test_nav_state_message_round_trips() {
        let message = SyncMessage::NavState(NavState::default());
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""type":"nav-state""#));
        let back: SyncMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message, back);
    }

    #[test]
    fn test_taws_alert_null_level_clears() {
        let message: SyncMessage =
            serde_json::from_str(r#"{"type": "taws-alert", "data": {"level": null}}"#).unwrap();
        assert_eq!(message, SyncMessage::TawsAlert(TawsAlert { level: None }));

        let message: SyncMessage =
            serde_json::from_str(r#"{"type": "taws-alert", "data": {"level": "WARNING"}}"#)
                .unwrap();
        assert_eq!(
            message,
            SyncMessage::TawsAlert(TawsAlert {
                level: Some(TerrainAlertLevel::Warning)
            })
        );
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = SyncBus::new();
        assert_eq!(
            bus.publish(SyncMessage::TawsAlert(TawsAlert::default())),
            0
        );
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_messages() {
        let bus = SyncBus::new();
        let mut rx = bus.subscribe();

        bus.publish(SyncMessage::WaypointSequence(WaypointSequence { index: 1 }));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.type_tag(), "waypoint-sequence");
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = AutopilotStateSnapshot {
            enabled: true,
            phase: FlightPhase::Cruise,
            takeoff_sub_phase: None,
            targets: TargetsSnapshot {
                altitude: Some(8000.0),
                ..Default::default()
            },
            ap: ApBits {
                master: true,
                hdg: true,
                ..Default::default()
            },
            terrain_alert: None,
            envelope_alert: None,
            nav_guidance: Some("FPL 251".to_string()),
            last_command: None,
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "CRUISE");
        assert_eq!(json["targets"]["altitude"], 8000.0);
        assert_eq!(json["ap"]["master"], true);
        assert_eq!(json["navGuidance"], "FPL 251");
    }
}
