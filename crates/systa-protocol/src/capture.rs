//! Captured Traffic
//!
//! What the receiver hands to the data logger: the bytes of every datagram
//! as it arrived, and the records extracted from the accepted ones.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::RawRecord;

/// A datagram exactly as received, accepted or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDatagram {
    received_at: DateTime<Utc>,
    peer: SocketAddr,
    bytes: Vec<u8>,
}

impl RawDatagram {
    pub fn new(received_at: DateTime<Utc>, peer: SocketAddr, bytes: Vec<u8>) -> Self {
        Self {
            received_at,
            peer,
            bytes,
        }
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// One entry of the log buffer
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Record(RawRecord),
    Datagram(RawDatagram),
}

impl LogEntry {
    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Record(record) => record.received_at(),
            LogEntry::Datagram(datagram) => datagram.received_at(),
        }
    }
}

impl From<RawRecord> for LogEntry {
    fn from(record: RawRecord) -> Self {
        LogEntry::Record(record)
    }
}

impl From<RawDatagram> for LogEntry {
    fn from(datagram: RawDatagram) -> Self {
        LogEntry::Datagram(datagram)
    }
}
