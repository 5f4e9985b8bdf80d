//! Command pipeline: vocabulary, policy queue, and the drain daemon.
//!
//! ```text
//! RuleEngine ──enqueue──► CommandQueue ──pop_due──► CommandDrain ──► Bridge
//!                         (clamp, override,         (≤ 1 per 500 ms)
//!                          dedup, FIFO)
//! ```

mod drain;
mod queue;
mod types;

pub use drain::CommandDrain;
pub use queue::{
    ActiveOverride, CommandQueue, EnqueueOutcome, QueueConfig, TimelineEntry,
    DEFAULT_DRAIN_INTERVAL, DEFAULT_OVERRIDE_COOLDOWN, DEFAULT_TIMELINE_CAP,
};
pub use types::{Command, CommandKind, CommandValue, OverrideAxis, NUMERIC_DEDUP_EPSILON};
