//! Raw Record Logger
//!
//! Drains captured datagrams and raw records from a shared ring buffer into
//! two sets of rotating text files, one line per entry. Logging sessions can
//! be started and stopped at runtime.

mod config;
mod logger;
mod writer;

pub use config::{LoggerConfig, LoggingSettings};
pub use logger::{DataLogger, LogFileInfo, LoggerStatus};

use std::path::PathBuf;

use thiserror::Error;

/// Logger errors
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid logging settings: {0}")]
    InvalidSettings(String),
    #[error("Log destination {path} is not usable: {reason}")]
    Destination { path: PathBuf, reason: String },
    #[error("Operation not allowed while a logging session is active")]
    SessionActive,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Logging task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for LoggerError {
    fn from(err: std::io::Error) -> Self {
        LoggerError::Io(err.to_string())
    }
}
