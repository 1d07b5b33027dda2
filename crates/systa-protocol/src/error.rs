//! Protocol Error Types

use thiserror::Error;

use crate::MessageType;

/// Errors raised while parsing datagrams, building tables or discovering units
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Datagram too short to hold a required field
    #[error("Datagram of {len} bytes is too short, need at least {needed}")]
    TooShort { len: usize, needed: usize },

    /// Tag byte does not belong to any known message type
    #[error("Unknown message type tag 0x{tag:02X}")]
    UnknownMessageType { tag: u8 },

    /// Datagram length outside the accepted range of its type
    #[error("Invalid {message} datagram length {len}, expected {min}..={max}")]
    InvalidLength {
        message: MessageType,
        len: usize,
        min: usize,
        max: usize,
    },

    /// Wire layout configuration is inconsistent
    #[error("Invalid wire layout: {0}")]
    InvalidLayout(String),

    /// Field index table contains the same name twice
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// Field name collides with a key the snapshot adds itself
    #[error("Field name {0} is reserved")]
    ReservedField(String),

    /// Field index table contains a mask that can never match
    #[error("Field {0} has a zero bit mask")]
    ZeroMask(String),

    /// Field index table contains a division by zero
    #[error("Field {0} divides by zero")]
    ZeroDivisor(String),

    /// Reply rule configuration is inconsistent
    #[error("Invalid reply configuration: {0}")]
    InvalidReply(String),

    /// Socket error during discovery
    #[error("Discovery I/O error: {0}")]
    Io(String),

    /// Discovery reply could not be understood
    #[error("Malformed discovery reply: {0}")]
    MalformedReply(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Io(err.to_string())
    }
}
