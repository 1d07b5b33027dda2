//! Service Configuration

use data_logger::LoggerConfig;
use serde::{Deserialize, Serialize};
use systa_protocol::{DiscoveryConfig, FieldIndexTable};
use systa_receiver::ReceiverConfig;

/// Configuration of the receiver, logger and discovery parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub receiver: ReceiverConfig,
    pub logger: LoggerConfig,
    pub discovery: DiscoveryConfig,
    /// Replaces the built-in SystaComfort II field table
    pub field_table: Option<FieldIndexTable>,
    /// Start the receiver when the service is created
    pub autostart: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            receiver: ReceiverConfig::default(),
            logger: LoggerConfig::default(),
            discovery: DiscoveryConfig::default(),
            field_table: None,
            autostart: true,
        }
    }
}
