//! Flight plan model and waypoint sequencing.
//!
//! A [`FlightPlan`] is an ordered list of waypoints with an active index.
//! The index is advanced by [`FlightPlan::sequence`] when the aircraft
//! passes within [`SEQUENCE_RADIUS_NM`] of the active waypoint; an index one
//! past the end means the plan is complete.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::geo::{haversine_nm, Position};

/// Distance at which the active waypoint is considered passed (NM).
pub const SEQUENCE_RADIUS_NM: f64 = 0.5;

/// A single flight-plan waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub ident: String,
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    /// Create a waypoint from an identifier and position.
    pub fn new(ident: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            ident: ident.into(),
            lat,
            lon,
        }
    }

    /// The waypoint's position.
    pub fn position(&self) -> Position {
        Position::new(self.lat, self.lon)
    }
}

/// An ordered flight plan with an active-leg cursor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightPlan {
    pub name: String,
    pub waypoints: Vec<Waypoint>,
    pub cruise_altitude: f64,
    /// Index of the active waypoint; `waypoints.len()` means completed.
    pub active_index: usize,
}

impl FlightPlan {
    /// Create a plan starting at the first waypoint.
    pub fn new(name: impl Into<String>, waypoints: Vec<Waypoint>, cruise_altitude: f64) -> Self {
        Self {
            name: name.into(),
            waypoints,
            cruise_altitude,
            active_index: 0,
        }
    }

    /// Whether the plan has any waypoints at all.
    pub fn has_waypoints(&self) -> bool {
        !self.waypoints.is_empty()
    }

    /// The active waypoint, or `None` once the plan is completed.
    pub fn active_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.active_index)
    }

    /// The final waypoint (destination), if the plan is non-empty.
    pub fn destination(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    /// Whether every waypoint has been sequenced.
    pub fn is_complete(&self) -> bool {
        self.active_index >= self.waypoints.len()
    }

    /// Distance from `position` to the active waypoint in NM.
    pub fn distance_to_active_nm(&self, position: Position) -> Option<f64> {
        self.active_waypoint()
            .map(|wp| haversine_nm(position, wp.position()))
    }

    /// Advance the cursor if the aircraft has reached the active waypoint.
    ///
    /// Returns `true` when the waypoint was sequenced. The cursor may end up
    /// one past the last waypoint, at which point [`active_waypoint`]
    /// returns `None`.
    ///
    /// [`active_waypoint`]: FlightPlan::active_waypoint
    pub fn sequence(&mut self, position: Position) -> bool {
        let Some(active) = self.active_waypoint() else {
            return false;
        };

        let dist = haversine_nm(position, active.position());
        if dist >= SEQUENCE_RADIUS_NM {
            return false;
        }

        info!(
            waypoint = %active.ident,
            dist_nm = format_args!("{dist:.2}"),
            next_index = self.active_index + 1,
            "Waypoint sequenced"
        );
        self.active_index += 1;
        true
    }

    /// Jump the cursor to a specific waypoint index.
    ///
    /// Out-of-bounds indices are ignored; the GPS is allowed to sequence one
    /// past the end itself, so `len()` is accepted as "plan complete".
    pub fn set_active_index(&mut self, index: usize) {
        if index <= self.waypoints.len() {
            self.active_index = index;
        }
    }
}
