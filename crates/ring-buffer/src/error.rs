//! Ring Buffer Error Types

use thiserror::Error;

/// Errors returned by ring buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// The buffer is full and overwriting is disabled
    #[error("Ring buffer is full (capacity {capacity})")]
    Full { capacity: usize },

    /// The buffer holds no items
    #[error("Ring buffer is empty")]
    Empty,
}
