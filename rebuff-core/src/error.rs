//! Errors in the library.
use thiserror::Error;

/// Errors raised by buffers, samplers and their concurrent wrappers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RebuffError {
    /// A construction parameter is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A store request does not fit in the contiguous writable span.
    #[error("Capacity exceeded: {requested} transitions requested, {available} writable")]
    CapacityExceeded {
        /// Number of transitions in the request.
        requested: usize,
        /// Number of slots that could be written in a single call.
        available: usize,
    },

    /// The episode directory has no free entry.
    #[error("Episode directory is full ({0} episodes)")]
    EpisodeDirectoryFull(usize),

    /// An input array does not have `count * dim` elements.
    #[error("Shape mismatch for {field}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Name of the field.
        field: &'static str,
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        actual: usize,
    },

    /// A slot index is beyond the stored content.
    #[error("Index {index} out of range for {size} stored transitions")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of valid slots.
        size: usize,
    },

    /// Parallel arrays passed together have different lengths.
    #[error("Length mismatch: {0} indices but {1} values")]
    LengthMismatch(usize, usize),

    /// A priority value is NaN or infinite.
    #[error("Invalid priority at index {0}")]
    InvalidPriority(usize),

    /// Sampling was requested from a buffer with no stored transitions.
    #[error("Cannot sample from an empty buffer")]
    EmptyBuffer,

    /// Sampling was requested while every priority is zero.
    #[error("Cannot sample: total priority is zero")]
    ZeroTotalPriority,

    /// Sampling was requested while the total priority is not finite.
    #[error("Cannot sample: total priority overflows")]
    TotalPriorityOverflow,

    /// A thread panicked while holding the lock.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}
