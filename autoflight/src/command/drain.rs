//! The command drain daemon.
//!
//! Pops at most one command per drain interval from the shared queue and
//! hands it to the bridge. The daemon idles on an empty queue (no busy
//! loop); the supervisor kicks it through a [`Notify`] whenever a tick
//! enqueues work, so the first command after an idle period fires
//! immediately.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::WireCommand;

use super::queue::CommandQueue;

/// Drains the command queue into the bridge at the configured pace.
pub struct CommandDrain {
    queue: Arc<Mutex<CommandQueue>>,
    command_tx: mpsc::Sender<WireCommand>,
    kick: Arc<Notify>,
}

impl CommandDrain {
    /// Create a drain over a shared queue.
    ///
    /// `kick` must be notified whenever something is enqueued.
    pub fn new(
        queue: Arc<Mutex<CommandQueue>>,
        command_tx: mpsc::Sender<WireCommand>,
        kick: Arc<Notify>,
    ) -> Self {
        Self {
            queue,
            command_tx,
            kick,
        }
    }

    /// Run until shutdown. Pending commands left in the queue are
    /// discarded by the supervisor's teardown, not here.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Command drain starting");

        loop {
            let due_in = self.queue.lock().next_due_in(Instant::now());

            match due_in {
                // Queue empty: sleep until kicked
                None => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.kick.notified() => {}
                    }
                }
                // Rate limiter still cooling down
                Some(wait) if !wait.is_zero() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                // A command is due now
                Some(_) => {
                    let popped = self.queue.lock().pop_due(Instant::now());
                    if let Some(cmd) = popped {
                        debug!(command = %cmd.kind, description = %cmd.description, "Executing command");
                        let wire = WireCommand::from(&cmd);
                        if let Err(error) = self.command_tx.try_send(wire) {
                            // Fire and forget; the engine re-emits if needed
                            warn!(%error, command = %cmd.kind, "Bridge channel refused command");
                        }
                    }
                }
            }
        }

        info!("Command drain stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::command::{Command, CommandKind, QueueConfig};
    use crate::profile::AircraftProfile;

    fn fast_queue() -> Arc<Mutex<CommandQueue>> {
        // Short drain interval keeps the pacing test quick in real time
        let config = QueueConfig::default().with_drain_interval(Duration::from_millis(50));
        Arc::new(Mutex::new(CommandQueue::new(
            config,
            Arc::new(AircraftProfile::trainer()),
        )))
    }

    #[tokio::test]
    async fn test_drain_paces_commands_in_fifo_order() {
        let queue = fast_queue();
        let (command_tx, mut command_rx) = mpsc::channel(16);
        let kick = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();

        let drain = CommandDrain::new(Arc::clone(&queue), command_tx, Arc::clone(&kick));
        let handle = tokio::spawn(drain.run(shutdown.clone()));

        {
            let mut q = queue.lock();
            let now = Instant::now();
            for i in 0..3 {
                q.enqueue(
                    now,
                    Command::value(CommandKind::HeadingBugSet, i as f64 * 10.0, "HDG"),
                );
            }
        }
        let started = Instant::now();
        kick.notify_one();

        let mut received = Vec::new();
        for _ in 0..3 {
            let cmd = tokio::time::timeout(Duration::from_secs(1), command_rx.recv())
                .await
                .expect("drain should deliver all queued commands")
                .unwrap();
            received.push(cmd);
        }
        let elapsed = started.elapsed();

        // FIFO order preserved, and two inter-command gaps were paced
        for (i, wire) in received.iter().enumerate() {
            match wire {
                WireCommand::Set { command, value } => {
                    assert_eq!(*command, "HEADING_BUG_SET");
                    assert_eq!(value.as_number().unwrap(), i as f64 * 10.0);
                }
                other => panic!("expected a Set frame, got {other:?}"),
            }
        }
        assert!(
            elapsed >= Duration::from_millis(90),
            "three commands need two drain intervals, took {elapsed:?}"
        );

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_idles_when_empty() {
        let queue = fast_queue();
        let (command_tx, mut command_rx) = mpsc::channel(16);
        let kick = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();

        let drain = CommandDrain::new(Arc::clone(&queue), command_tx, Arc::clone(&kick));
        let handle = tokio::spawn(drain.run(shutdown.clone()));

        let nothing = tokio::time::timeout(Duration::from_millis(200), command_rx.recv()).await;
        assert!(nothing.is_err(), "no commands expected from an empty queue");

        shutdown.cancel();
        handle.await.unwrap();
    }
}
