//! SystaComfort II Protocol
//!
//! This crate describes the datagrams a Paradigma SystaComfort II controller
//! sends to its cloud endpoint: how they are classified and split into raw
//! integer records, how the endpoint has to answer, and how records are
//! decoded into an accumulated status snapshot through a field index table.

mod capture;
mod decoder;
pub mod discovery;
mod error;
pub mod index;
pub mod labels;
mod reply;
mod snapshot;
mod wire;

pub use capture::{LogEntry, RawDatagram};
pub use decoder::{decode_field, StatusDecoder};
pub use discovery::{DeviceInfo, DeviceSearch, DiscoveryConfig};
pub use error::ProtocolError;
pub use index::{FieldIndexTable, FieldSpec, Scale};
pub use reply::{ReplyBuilder, ReplyConfig, SystaWebReply};
pub use snapshot::{DerivedState, FieldValue, StatusSnapshot};
pub use wire::{
    ByteOrder, DeviceHeader, MessageRule, MessageType, RawRecord, WireLayout, DEVICE_HEADER_LEN,
    MAX_DATAGRAM_LEN,
};

/// Port the controller sends its datagrams to
pub const DEFAULT_LISTEN_PORT: u16 = 22460;
