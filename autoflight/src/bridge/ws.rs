//! WebSocket simulator bridge.
//!
//! The bridge daemon owns the socket: inbound text frames are decoded into
//! telemetry and pushed to the supervisor, outbound wire commands are
//! written fire-and-forget. Neither direction blocks the control loop; a
//! full telemetry channel drops the oldest-style behavior by discarding
//! the new frame (the next one is ~50 ms away), and a failed send is
//! logged and forgotten (the engine re-emits on the next tick if the state
//! is still desired).

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::telemetry::TelemetryFrame;

use super::wire::{decode_telemetry, WireCommand};
use super::BridgeError;

/// Default capacity for the inbound telemetry channel.
const TELEMETRY_CHANNEL_CAPACITY: usize = 64;

/// Default capacity for the outbound command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Bridge connection settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// WebSocket URL of the simulator bridge.
    pub url: String,
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Channel endpoints handed to the supervisor.
pub struct BridgeHandles {
    /// Telemetry frames as they arrive from the simulator.
    pub telemetry_rx: mpsc::Receiver<TelemetryFrame>,
    /// Commands to put on the wire.
    pub command_tx: mpsc::Sender<WireCommand>,
}

/// The connected bridge, ready to run.
pub struct BridgeDaemon {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    telemetry_tx: mpsc::Sender<TelemetryFrame>,
    command_rx: mpsc::Receiver<WireCommand>,
}

impl BridgeDaemon {
    /// Connect to the simulator bridge.
    ///
    /// Returns the daemon (to be spawned) and the channel handles for the
    /// supervisor.
    pub async fn connect(config: &BridgeConfig) -> Result<(Self, BridgeHandles), BridgeError> {
        info!(url = %config.url, "Connecting to simulator bridge");
        let (stream, _response) = connect_async(config.url.as_str()).await?;

        let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let daemon = Self {
            stream,
            telemetry_tx,
            command_rx,
        };
        let handles = BridgeHandles {
            telemetry_rx,
            command_tx,
        };
        Ok((daemon, handles))
    }

    /// Pump the socket until shutdown or disconnect.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Bridge daemon starting");

        let Self {
            stream,
            telemetry_tx,
            mut command_rx,
        } = self;
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Bridge daemon shutting down");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }

                Some(command) = command_rx.recv() => {
                    let text = command.to_wire_json();
                    debug!(command = command.name(), "Sending wire command");
                    if let Err(error) = sink.send(Message::Text(text.into())).await {
                        // Fire and forget: the engine re-emits if still desired
                        warn!(%error, command = command.name(), "Wire send failed");
                    }
                }

                message = source.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::ingest_telemetry(&telemetry_tx, &text);
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            warn!("Simulator bridge closed the connection");
                            break;
                        }
                        Some(Err(error)) => {
                            warn!(%error, "Bridge read error");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn ingest_telemetry(telemetry_tx: &mpsc::Sender<TelemetryFrame>, text: &str) {
        match decode_telemetry(text) {
            Ok(frame) => {
                // try_send: if the controller is behind, dropping this frame
                // is cheaper than stalling the socket; a fresher one follows
                if telemetry_tx.try_send(frame).is_err() {
                    debug!("Telemetry channel full, frame dropped");
                }
            }
            Err(error) => {
                debug!(%error, "Undecodable telemetry frame ignored");
            }
        }
    }
}
