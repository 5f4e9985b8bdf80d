//! Rate-limited, safety-clamped command queue.
//!
//! The queue sits between the rule engine's stream of *desired* commands
//! and the simulator bridge. Every enqueue passes through, in order:
//!
//! 1. **Clamp** — value-set commands are forced into the profile's safe
//!    range and annotated when modified; an out-of-range value never
//!    reaches the wire.
//! 2. **Override check** — commands on an axis the pilot recently touched
//!    are dropped silently, and anything already queued for that axis is
//!    flushed.
//! 3. **Dedup** — commands matching the tracked autopilot state (boolean
//!    equality, numeric within 1.0) are dropped.
//! 4. **FIFO append**.
//!
//! Draining is paced: at most one command leaves per drain interval
//! (500 ms, a 2/s ceiling the simulator tolerates). The first command after
//! an idle period fires immediately. Executed commands are recorded in a
//! bounded timeline, newest first.
//!
//! The queue is not itself thread-safe; the supervisor wraps it in the
//! controller mutex and time is passed in explicitly so policy is testable
//! without timers.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::profile::AircraftProfile;
use crate::telemetry::TelemetryFrame;

use super::types::{Command, CommandKind, CommandValue, OverrideAxis};

/// Default pacing between executed commands.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(500);

/// Default pilot-override cooldown.
pub const DEFAULT_OVERRIDE_COOLDOWN: Duration = Duration::from_secs(30);

/// Default timeline capacity.
pub const DEFAULT_TIMELINE_CAP: usize = 100;

/// Queue policy knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Minimum spacing between executed commands.
    pub drain_interval: Duration,
    /// How long a pilot override suppresses an axis.
    pub override_cooldown: Duration,
    /// Maximum retained timeline entries.
    pub timeline_cap: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            override_cooldown: DEFAULT_OVERRIDE_COOLDOWN,
            timeline_cap: DEFAULT_TIMELINE_CAP,
        }
    }
}

impl QueueConfig {
    /// Set the override cooldown.
    pub fn with_override_cooldown(mut self, cooldown: Duration) -> Self {
        self.override_cooldown = cooldown;
        self
    }

    /// Set the drain interval.
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }
}

/// Why an enqueue did not append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended to the FIFO; `clamped` records a range adjustment.
    Queued { clamped: bool },
    /// Dropped: the command's axis is under a pilot override.
    DroppedOverride,
    /// Dropped: the tracked autopilot state already matches.
    DroppedDuplicate,
}

/// An executed command, as shown in the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub kind: CommandKind,
    pub value: Option<CommandValue>,
    pub description: String,
}

/// An unexpired pilot override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveOverride {
    pub axis: OverrideAxis,
    pub remaining: Duration,
}

/// The command queue. See the module docs for the policy pipeline.
#[derive(Debug)]
pub struct CommandQueue {
    config: QueueConfig,
    profile: Arc<AircraftProfile>,

    queue: VecDeque<Command>,

    /// Axis -> override expiry. Entries are purged lazily.
    overrides: HashMap<OverrideAxis, Instant>,

    /// Tracked autopilot state: mirror values refreshed every tick plus
    /// the effects of executed commands.
    ap_state: HashMap<CommandKind, CommandValue>,

    /// Executed commands, newest first, bounded.
    timeline: VecDeque<TimelineEntry>,

    last_drain: Option<Instant>,
}

impl CommandQueue {
    /// Create a queue with the given policy and profile.
    pub fn new(config: QueueConfig, profile: Arc<AircraftProfile>) -> Self {
        Self {
            config,
            profile,
            queue: VecDeque::new(),
            overrides: HashMap::new(),
            ap_state: HashMap::new(),
            timeline: VecDeque::new(),
            last_drain: None,
        }
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Refresh the tracked autopilot state from the telemetry mirror.
    ///
    /// Called at the start of every tick so deduplication compares against
    /// what the simulator actually shows, not only our own history.
    pub fn apply_mirror(&mut self, frame: &TelemetryFrame) {
        let toggles = [
            (CommandKind::ApMaster, frame.ap_master),
            (CommandKind::ApHdgHold, frame.ap_hdg_lock),
            (CommandKind::ApAltHold, frame.ap_alt_lock),
            (CommandKind::ApVsHold, frame.ap_vs_lock),
            (CommandKind::ApAirspeedHold, frame.ap_spd_lock),
            (CommandKind::ApNav1Hold, frame.ap_nav_lock),
            (CommandKind::ApAprHold, frame.ap_apr_lock),
        ];
        for (kind, on) in toggles {
            self.ap_state.insert(kind, CommandValue::Bool(on));
        }

        let values = [
            (CommandKind::HeadingBugSet, frame.ap_hdg_set),
            (CommandKind::ApAltVarSet, frame.ap_alt_set),
            (CommandKind::ApVsVarSet, frame.ap_vs_set),
            (CommandKind::ApSpdVarSet, frame.ap_spd_set),
        ];
        for (kind, value) in values {
            self.ap_state.insert(kind, CommandValue::Number(value));
        }
    }

    /// Run a command through clamp, override, and dedup policy, then
    /// append it.
    pub fn enqueue(&mut self, now: Instant, mut cmd: Command) -> EnqueueOutcome {
        let clamped = self.clamp(&mut cmd);

        if let Some(axis) = cmd.kind.override_axis() {
            if self.override_active(now, axis) {
                self.flush_axis(axis);
                trace!(command = %cmd.kind, %axis, "Command suppressed by pilot override");
                return EnqueueOutcome::DroppedOverride;
            }
        }

        if let (Some(value), Some(tracked)) = (&cmd.value, self.ap_state.get(&cmd.kind)) {
            if value.is_duplicate_of(tracked) {
                return EnqueueOutcome::DroppedDuplicate;
            }
        }

        self.queue.push_back(cmd);
        EnqueueOutcome::Queued { clamped }
    }

    /// Pop the next command if the rate limiter allows one.
    ///
    /// On success the command is recorded in the timeline and the tracked
    /// autopilot state is updated; the caller only has to put it on the
    /// wire.
    pub fn pop_due(&mut self, now: Instant) -> Option<Command> {
        self.purge_expired(now);

        if self.queue.is_empty() {
            return None;
        }
        if let Some(last) = self.last_drain {
            if now.saturating_duration_since(last) < self.config.drain_interval {
                return None;
            }
        }

        let cmd = self.queue.pop_front()?;
        self.last_drain = Some(now);
        self.record_executed(&cmd);
        Some(cmd)
    }

    /// Time until the next command could be popped.
    ///
    /// `None` when the queue is empty; `Some(ZERO)` when a pop is already
    /// due.
    pub fn next_due_in(&self, now: Instant) -> Option<Duration> {
        if self.queue.is_empty() {
            return None;
        }
        match self.last_drain {
            None => Some(Duration::ZERO),
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                Some(self.config.drain_interval.saturating_sub(elapsed))
            }
        }
    }

    /// Register a pilot override: suppress the axis for the cooldown and
    /// flush anything queued for it.
    pub fn register_override(&mut self, now: Instant, axis: OverrideAxis) {
        debug!(%axis, cooldown_secs = self.config.override_cooldown.as_secs(), "Pilot override registered");
        self.overrides
            .insert(axis, now + self.config.override_cooldown);
        self.flush_axis(axis);
    }

    /// Unexpired overrides with their remaining cooldown.
    pub fn active_overrides(&self, now: Instant) -> Vec<ActiveOverride> {
        let mut active: Vec<ActiveOverride> = self
            .overrides
            .iter()
            .filter(|(_, expiry)| **expiry > now)
            .map(|(axis, expiry)| ActiveOverride {
                axis: *axis,
                remaining: expiry.saturating_duration_since(now),
            })
            .collect();
        active.sort_by_key(|o| o.axis.as_str());
        active
    }

    /// Whether an axis is currently suppressed.
    pub fn override_active(&self, now: Instant, axis: OverrideAxis) -> bool {
        self.overrides
            .get(&axis)
            .is_some_and(|expiry| *expiry > now)
    }

    /// The executed-command timeline, newest first.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.timeline.iter().cloned().collect()
    }

    /// Description of the most recently executed command.
    pub fn last_command(&self) -> Option<&TimelineEntry> {
        self.timeline.front()
    }

    /// Discard everything still queued (shutdown path).
    pub fn clear_pending(&mut self) {
        self.queue.clear();
    }

    /// Clamp a value-set command into the profile's safe range.
    ///
    /// Returns true when the value was modified; the description gains a
    /// "(clamped)" marker so the adjustment is visible in the timeline.
    fn clamp(&self, cmd: &mut Command) -> bool {
        let Some(CommandValue::Number(value)) = cmd.value else {
            return false;
        };

        let limits = &self.profile.limits;
        let speeds = &self.profile.speeds;
        let clamped = match cmd.kind {
            CommandKind::ApVsVarSet => value.clamp(limits.min_vs, limits.max_vs),
            CommandKind::ApAltVarSet => value.min(limits.altitude_clamp()),
            CommandKind::ApSpdVarSet => value.clamp(speeds.vs1, speeds.vno),
            _ => return false,
        };

        if clamped == value {
            return false;
        }
        cmd.value = Some(CommandValue::Number(clamped));
        cmd.description.push_str(" (clamped)");
        true
    }

    fn flush_axis(&mut self, axis: OverrideAxis) {
        self.queue
            .retain(|cmd| cmd.kind.override_axis() != Some(axis));
    }

    fn purge_expired(&mut self, now: Instant) {
        self.overrides.retain(|_, expiry| *expiry > now);
    }

    /// Test helper: drain everything immediately, ignoring the rate
    /// limiter, recording executions as usual.
    #[cfg(test)]
    pub(crate) fn drain_unpaced(&mut self) -> Vec<Command> {
        let mut all = Vec::new();
        while let Some(cmd) = self.queue.pop_front() {
            self.record_executed(&cmd);
            all.push(cmd);
        }
        all
    }

    fn record_executed(&mut self, cmd: &Command) {
        if let Some(value) = cmd.value {
            self.ap_state.insert(cmd.kind, value);
        }
        self.timeline.push_front(TimelineEntry {
            at: Utc::now(),
            kind: cmd.kind,
            value: cmd.value,
            description: cmd.description.clone(),
        });
        self.timeline.truncate(self.config.timeline_cap);
    }
}
