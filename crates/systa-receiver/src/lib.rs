//! SystaComfort II Receiver
//!
//! Owns the UDP socket the controller talks to. Every accepted datagram is
//! answered, decoded into a new status snapshot and handed to the raw record
//! buffers; everything else is dropped and counted.

mod config;
mod context;
mod counters;
mod error;
mod receiver;

pub use config::ReceiverConfig;
pub use context::{ReceiverContext, SnapshotCell};
pub use counters::{CounterSnapshot, ReceiverCounters};
pub use error::ReceiverError;
pub use receiver::{Receiver, ReceiverHandle};
