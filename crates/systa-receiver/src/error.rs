//! Receiver Error Types

use std::net::SocketAddr;

use systa_protocol::ProtocolError;
use thiserror::Error;

/// Errors that prevent the receiver from starting
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Listening socket could not be bound
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    /// Wire layout or reply rule rejected
    #[error("Invalid receiver configuration: {0}")]
    Config(#[from] ProtocolError),

    /// Receive task ended abnormally
    #[error("Receiver task failed: {0}")]
    Task(String),
}
