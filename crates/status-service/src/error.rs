//! Service Error Types

use data_logger::LoggerError;
use systa_protocol::ProtocolError;
use systa_receiver::ReceiverError;
use thiserror::Error;

/// Errors returned by service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Receiver(#[from] ReceiverError),

    #[error(transparent)]
    Logger(#[from] LoggerError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
