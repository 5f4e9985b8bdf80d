//! Simulator bridge: wire encoding and the WebSocket transport.

mod wire;
mod ws;

pub use wire::{decode_telemetry, WireCommand};
pub use ws::{BridgeConfig, BridgeDaemon, BridgeHandles};

use thiserror::Error;

/// Errors raised while establishing the bridge connection.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to connect to simulator bridge: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}
