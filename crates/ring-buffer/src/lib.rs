//! Fixed-Capacity Ring Buffer
//!
//! Provides a FIFO ring buffer with a configurable overwrite-on-full policy,
//! and a shared handle for one producer and one consumer running on
//! different tasks.

mod buffer;
mod error;
mod shared;

pub use buffer::{RingBuffer, DEFAULT_CAPACITY};
pub use error::RingBufferError;
pub use shared::SharedRingBuffer;
