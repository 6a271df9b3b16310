//! Error types for the slot pipeline, replay input, and dispatcher thread.

/// Configuration and frame-shape errors raised by the tracker.
///
/// All variants are fatal: they indicate a mismatch between the
/// configured slot layout and the snapshot source, not a transient
/// per-frame condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    /// A body frame did not carry exactly one record per slot.
    #[error("snapshot has {actual} bodies, expected {expected} (one per slot)")]
    SnapshotLength { expected: usize, actual: usize },

    /// The tracker was configured with no slots.
    #[error("slot count must be at least 1")]
    NoSlots,

    /// The confirmation threshold is not a usable confidence value.
    #[error("confirmation threshold {0} is outside [0.0, 1.0]")]
    InvalidThreshold(f32),

    /// The dispatcher queue must hold at least one event.
    #[error("event queue capacity must be at least 1")]
    ZeroQueueCapacity,

    /// A slot index outside `0..slot_count` was referenced.
    #[error("slot {index} does not exist (slot count {count})")]
    NoSuchSlot { index: usize, count: usize },
}

/// Errors reading frame scripts.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("line {line}: malformed s-expression: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: missing required key :{key}")]
    MissingKey { line: usize, key: &'static str },

    #[error("line {line}: invalid value for :{key}")]
    InvalidValue { line: usize, key: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors starting or running the dispatcher thread.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] calloop::Error),

    #[error("dispatcher thread panicked")]
    ThreadPanicked,

    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),
}
