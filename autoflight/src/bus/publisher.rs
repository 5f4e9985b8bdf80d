//! Periodic autopilot-state broadcast.
//!
//! Publishes the supervisor's [`AutopilotStateSnapshot`] on the sync bus
//! once per second for UI panels and other collaborators. The snapshot is
//! produced by a caller-supplied closure so the publisher stays decoupled
//! from the controller's locking.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{AutopilotStateSnapshot, SyncBus, SyncMessage};

/// How often the autopilot state is broadcast.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Broadcasts autopilot-state snapshots at a fixed cadence.
pub struct StatePublisher<F>
where
    F: Fn() -> AutopilotStateSnapshot + Send + 'static,
{
    bus: SyncBus,
    snapshot: F,
    interval: Duration,
}

impl<F> StatePublisher<F>
where
    F: Fn() -> AutopilotStateSnapshot + Send + 'static,
{
    /// Create a publisher with the default 1 Hz cadence.
    pub fn new(bus: SyncBus, snapshot: F) -> Self {
        Self {
            bus,
            snapshot,
            interval: PUBLISH_INTERVAL,
        }
    }

    /// Override the cadence (tests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Publish until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "State publisher starting");
        let mut ticker = tokio::time::interval(self.interval);
        // A delayed tick should not cause a burst of stale snapshots
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("State publisher shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let snapshot = (self.snapshot)();
                    self.bus.publish(SyncMessage::AutopilotState(snapshot));
                }
            }
        }
    }
}
