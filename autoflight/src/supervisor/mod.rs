//! Supervisor: wires the controller to the bridge and the sync bus.
//!
//! # Task layout
//!
//! ```text
//! telemetry_rx ──► tick task ──► Controller ──► CommandQueue
//!                                   ▲               │
//!  SyncBus "sync" ◄── publisher ────┘               ▼
//!  SyncBus "sync" ──► bus task ──► Controller   CommandDrain ──► command_tx
//! ```
//!
//! All controller mutation happens on the tick task and the bus task, each
//! holding the controller mutex only for the duration of one message. The
//! drain and publisher tasks never touch the controller mutably.
//!
//! Shutdown cancels every task through one token and awaits them in
//! reverse construction order; commands still queued are discarded.

mod controller;

pub use controller::{Controller, TELEMETRY_STALE_AFTER};

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::BridgeHandles;
use crate::bus::{AutopilotStateSnapshot, StatePublisher, SyncBus, SyncMessage};
use crate::command::{
    ActiveOverride, CommandDrain, CommandQueue, OverrideAxis, QueueConfig, TimelineEntry,
};
use crate::phase::FlightPhase;
use crate::profile::AircraftProfile;

/// A running supervisor and its background tasks.
pub struct Supervisor {
    controller: Arc<Mutex<Controller>>,
    queue: Arc<Mutex<CommandQueue>>,
    cancellation: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Start the control loop over a connected bridge.
    ///
    /// Spawns, in order: the command drain, the telemetry tick task, the
    /// bus subscriber, and the state publisher.
    pub fn start(
        profile: Arc<AircraftProfile>,
        queue_config: QueueConfig,
        bridge: BridgeHandles,
        bus: SyncBus,
    ) -> Self {
        info!(profile = %profile.name, "Supervisor starting");

        let controller = Arc::new(Mutex::new(Controller::new(
            Arc::clone(&profile),
            Instant::now(),
        )));
        let queue = Arc::new(Mutex::new(CommandQueue::new(queue_config, profile)));
        let kick = Arc::new(Notify::new());
        let cancellation = CancellationToken::new();
        let mut tasks = Vec::new();

        // 1. Command drain
        let drain = CommandDrain::new(Arc::clone(&queue), bridge.command_tx, Arc::clone(&kick));
        tasks.push(tokio::spawn(drain.run(cancellation.clone())));

        // 2. Telemetry tick task
        tasks.push(tokio::spawn(Self::tick_task(
            Arc::clone(&controller),
            Arc::clone(&queue),
            Arc::clone(&kick),
            bridge.telemetry_rx,
            cancellation.clone(),
        )));

        // 3. Bus subscriber
        tasks.push(tokio::spawn(Self::bus_task(
            Arc::clone(&controller),
            bus.subscribe(),
            cancellation.clone(),
        )));

        // 4. State publisher
        let snapshot_controller = Arc::clone(&controller);
        let snapshot_queue = Arc::clone(&queue);
        let publisher = StatePublisher::new(bus, move || {
            let controller = snapshot_controller.lock();
            let queue = snapshot_queue.lock();
            controller.snapshot(&queue)
        });
        tasks.push(tokio::spawn(publisher.run(cancellation.clone())));

        Self {
            controller,
            queue,
            cancellation,
            tasks,
        }
    }

    async fn tick_task(
        controller: Arc<Mutex<Controller>>,
        queue: Arc<Mutex<CommandQueue>>,
        kick: Arc<Notify>,
        mut telemetry_rx: tokio::sync::mpsc::Receiver<crate::telemetry::TelemetryFrame>,
        shutdown: CancellationToken,
    ) {
        info!("Tick task starting");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                frame = telemetry_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            {
                                let mut controller = controller.lock();
                                let mut queue = queue.lock();
                                controller.tick(Instant::now(), frame, &mut queue);
                            }
                            // Wake the drain for anything the tick enqueued
                            kick.notify_one();
                        }
                        None => {
                            warn!("Telemetry channel closed, tick task stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn bus_task(
        controller: Arc<Mutex<Controller>>,
        mut rx: tokio::sync::broadcast::Receiver<SyncMessage>,
        shutdown: CancellationToken,
    ) {
        info!("Bus subscriber starting");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                message = rx.recv() => {
                    match message {
                        Ok(message) => Self::handle_bus_message(&controller, message),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            // Last-writer-wins semantics: losing old messages is fine
                            debug!(skipped, "Bus subscriber lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    }

    fn handle_bus_message(controller: &Arc<Mutex<Controller>>, message: SyncMessage) {
        match message {
            SyncMessage::NavState(state) => {
                controller.lock().set_nav_state(state, Instant::now());
            }
            SyncMessage::TawsAlert(alert) => {
                controller.lock().set_terrain_alert(alert.level);
            }
            SyncMessage::SimbriefPlan(plan) => {
                info!(plan = %plan.name, waypoints = plan.waypoints.len(), "Flight plan received");
                controller.lock().set_flight_plan(plan);
            }
            SyncMessage::WaypointSequence(seq) => {
                controller.lock().set_active_waypoint_index(seq.index);
            }
            // Our own broadcast; nothing to ingest
            SyncMessage::AutopilotState(_) => {}
        }
    }

    // ------------------------------------------------------------------
    // External control / inspection surface
    // ------------------------------------------------------------------

    /// Current autopilot-state snapshot.
    pub fn snapshot(&self) -> AutopilotStateSnapshot {
        let controller = self.controller.lock();
        let queue = self.queue.lock();
        controller.snapshot(&queue)
    }

    /// Executed-command timeline, newest first.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.queue.lock().timeline()
    }

    /// Register a pilot override on an axis.
    pub fn register_override(&self, axis: OverrideAxis) {
        self.queue.lock().register_override(Instant::now(), axis);
    }

    /// Unexpired pilot overrides.
    pub fn active_overrides(&self) -> Vec<ActiveOverride> {
        self.queue.lock().active_overrides(Instant::now())
    }

    /// Pin the flight phase.
    pub fn set_manual_phase(&self, phase: FlightPhase) {
        self.controller.lock().set_manual_phase(phase, Instant::now());
    }

    /// Resume automatic phase classification.
    pub fn resume_auto(&self) {
        self.controller.lock().resume_auto();
    }

    /// Age of the newest telemetry frame.
    pub fn telemetry_age(&self) -> Option<Duration> {
        self.controller.lock().telemetry_age(Instant::now())
    }

    /// Stop all tasks, discarding queued commands.
    ///
    /// Tasks are awaited in reverse construction order: publisher and bus
    /// subscription first, the drain last.
    pub async fn shutdown(self) {
        info!("Supervisor shutting down");
        self.cancellation.cancel();
        self.queue.lock().clear_pending();

        for task in self.tasks.into_iter().rev() {
            if let Err(error) = task.await {
                warn!(%error, "Supervisor task panicked during shutdown");
            }
        }
        info!("Supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::WireCommand;
    use crate::telemetry::TelemetryFrame;
    use tokio::sync::mpsc;

    /// Bridge handle pair with the test holding the far ends.
    fn test_bridge() -> (
        BridgeHandles,
        mpsc::Sender<TelemetryFrame>,
        mpsc::Receiver<WireCommand>,
    ) {
        let (telemetry_tx, telemetry_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(16);
        (
            BridgeHandles {
                telemetry_rx,
                command_tx,
            },
            telemetry_tx,
            command_rx,
        )
    }

    fn cruise_frame() -> TelemetryFrame {
        TelemetryFrame {
            altitude: 8000.0,
            altitude_agl: 2600.0,
            speed: 110.0,
            ap_master: true,
            ap_hdg_lock: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_telemetry_drives_commands_to_bridge() {
        let (handles, telemetry_tx, mut command_rx) = test_bridge();
        let supervisor = Supervisor::start(
            Arc::new(AircraftProfile::trainer()),
            QueueConfig::default(),
            handles,
            SyncBus::new(),
        );

        telemetry_tx.send(cruise_frame()).await.unwrap();

        let wire = tokio::time::timeout(Duration::from_secs(1), command_rx.recv())
            .await
            .expect("a cruise-entry command should reach the bridge")
            .unwrap();
        assert!(!wire.name().is_empty());

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshot_after_tick() {
        let (handles, telemetry_tx, _command_rx) = test_bridge();
        let supervisor = Supervisor::start(
            Arc::new(AircraftProfile::trainer()),
            QueueConfig::default(),
            handles,
            SyncBus::new(),
        );

        telemetry_tx.send(cruise_frame()).await.unwrap();
        // Give the tick task a moment to process
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = supervisor.snapshot();
        assert_eq!(snapshot.phase, FlightPhase::Cruise);
        assert!(supervisor.telemetry_age().is_some());

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_bus_messages_reach_controller() {
        let (handles, _telemetry_tx, _command_rx) = test_bridge();
        let bus = SyncBus::new();
        let supervisor = Supervisor::start(
            Arc::new(AircraftProfile::trainer()),
            QueueConfig::default(),
            handles,
            bus.clone(),
        );

        bus.publish(SyncMessage::TawsAlert(crate::bus::TawsAlert {
            level: Some(crate::bus::TerrainAlertLevel::Caution),
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            supervisor.snapshot().terrain_alert,
            Some(crate::bus::TerrainAlertLevel::Caution)
        );

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_override_blocks_axis_commands() {
        let (handles, telemetry_tx, mut command_rx) = test_bridge();
        let supervisor = Supervisor::start(
            Arc::new(AircraftProfile::trainer()),
            QueueConfig::default(),
            handles,
            SyncBus::new(),
        );

        supervisor.register_override(OverrideAxis::Hdg);
        assert_eq!(supervisor.active_overrides().len(), 1);

        // A frame that would normally produce heading commands
        let mut frame = cruise_frame();
        frame.ap_hdg_lock = false;
        telemetry_tx.send(frame).await.unwrap();

        // Commands still flow, but none on the HDG axis
        let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
        while let Ok(Some(wire)) =
            tokio::time::timeout_at(deadline, command_rx.recv()).await
        {
            assert_ne!(wire.name(), "HEADING_BUG_SET");
            assert_ne!(wire.name(), "AP_HDG_HOLD");
        }

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_discards_pending() {
        let (handles, telemetry_tx, _command_rx) = test_bridge();
        let supervisor = Supervisor::start(
            Arc::new(AircraftProfile::trainer()),
            QueueConfig::default(),
            handles,
            SyncBus::new(),
        );

        telemetry_tx.send(cruise_frame()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Entry emits several commands; most are still queued behind the
        // rate limiter when we shut down
        supervisor.shutdown().await;
    }
}
