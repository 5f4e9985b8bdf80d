//! Navigation state as delivered by the external GPS unit.
//!
//! The GPS publishes a [`NavState`] record on the sync bus at roughly 1 Hz.
//! The supervisor stores the latest record in a single-slot mailbox; the
//! control loop reads it at tick start and treats a record older than
//! [`NAV_STATE_STALE_AFTER`] as absent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Age beyond which a received nav state is ignored by the engine.
pub const NAV_STATE_STALE_AFTER: Duration = Duration::from_secs(5);

/// Which receiver is driving the CDI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CdiSource {
    #[default]
    Gps,
    Nav1,
    Nav2,
}

impl CdiSource {
    /// Label used in command descriptions and the autopilot-state snapshot.
    pub fn label(&self) -> &'static str {
        match self {
            CdiSource::Gps => "GPS",
            CdiSource::Nav1 => "NAV1",
            CdiSource::Nav2 => "NAV2",
        }
    }
}

/// CDI TO/FROM flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ToFrom {
    To,
    From,
    /// Flagged off; no valid course guidance.
    #[default]
    Off,
}

/// CDI sensitivity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CdiMode {
    /// En-route sensitivity.
    #[default]
    Enr,
    /// Terminal sensitivity.
    Term,
    /// Approach sensitivity.
    Apr,
}

/// The GPS unit's active waypoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveWaypoint {
    pub ident: String,
    pub lat: f64,
    pub lon: f64,
    /// Distance to the waypoint in NM.
    pub dist_nm: f64,
    /// Bearing to the waypoint in degrees.
    pub bearing: f64,
}

/// Course deviation indicator state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CdiState {
    pub source: CdiSource,
    /// Desired track in degrees.
    pub dtk: f64,
    /// Cross-track distance in NM, positive right of course.
    pub xtrk: f64,
    pub to_from: ToFrom,
    pub mode: CdiMode,
    /// Full-scale deflection in NM.
    pub fsd: f64,
    /// Whether the glideslope indication is valid.
    pub gs_valid: bool,
    /// Glideslope deviation, positive above path.
    pub gs_deviation: f64,
}

/// Summary of the GPS flight plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightPlanInfo {
    pub name: String,
    pub cruise_altitude: f64,
    pub waypoint_count: usize,
}

/// Loaded approach information.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApproachInfo {
    /// Approach mode string as reported by the GPS (empty when none loaded).
    pub mode: String,
    pub name: String,
    pub has_glideslope: bool,
}

impl ApproachInfo {
    /// Whether an approach is loaded and active in the GPS.
    pub fn is_active(&self) -> bool {
        !self.mode.is_empty()
    }
}

/// Navigation state snapshot from the external GPS.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavState {
    pub active_waypoint: Option<ActiveWaypoint>,
    pub cdi: CdiState,
    pub flight_plan: Option<FlightPlanInfo>,
    /// Distance to destination in NM, when known.
    pub dest_dist_nm: Option<f64>,
    pub approach: ApproachInfo,
}

impl NavState {
    /// Whether the CDI carries usable course guidance.
    pub fn cdi_usable(&self) -> bool {
        self.cdi.to_from != ToFrom::Off
    }
}
