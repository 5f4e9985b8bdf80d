//! Autoflight - autonomous flight-control supervisor for flight simulators.
//!
//! Autoflight consumes a live telemetry stream from a simulator bridge,
//! classifies the aircraft's situation into a flight phase, and issues
//! rate-limited autopilot and axis commands that fly the phase's procedure
//! while respecting pilot overrides and the aircraft's safety envelope.
//!
//! # Architecture
//!
//! ```text
//! Telemetry ──► PhaseTracker ──► RuleEngine ──► CommandQueue ──► Commands
//!                    ▲                ▲              ▲
//!                    │                │              │
//!               NavComputer ◄── "sync" pub/sub ───── (external GPS)
//!                    │
//!                    └──► autopilot-state broadcast (1 Hz)
//! ```
//!
//! The [`supervisor::Supervisor`] owns the closed loop: a tick per
//! telemetry frame flows through phase classification, waypoint
//! sequencing, and the per-phase rule engine into the command queue; an
//! independent drain delivers at most two commands per second to the
//! bridge.

pub mod bridge;
pub mod bus;
pub mod command;
pub mod engine;
pub mod nav;
pub mod phase;
pub mod profile;
pub mod supervisor;
pub mod telemetry;

pub use bridge::{BridgeConfig, BridgeDaemon, BridgeError, BridgeHandles};
pub use bus::{SyncBus, SyncMessage};
pub use command::QueueConfig;
pub use phase::FlightPhase;
pub use profile::{AircraftProfile, ProfileError};
pub use supervisor::Supervisor;
pub use telemetry::TelemetryFrame;

/// Crate version, surfaced by the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
