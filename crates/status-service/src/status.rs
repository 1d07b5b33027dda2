//! Service status and raw data views

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use systa_protocol::RawRecord;
use systa_receiver::CounterSnapshot;

/// Overall state of the receiver and the logger
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub running: bool,
    pub connected: bool,
    pub last_data_received_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    #[serde(rename = "paradigmaListenerIP")]
    pub listener_ip: String,
    #[serde(rename = "paradigmaListenerPort")]
    pub listener_port: u16,
    #[serde(rename = "paradigmaIP")]
    pub device_ip: Option<String>,
    #[serde(rename = "paradigmaPort")]
    pub device_port: Option<u16>,
    #[serde(rename = "paradigmaMac")]
    pub device_mac: Option<String>,
    #[serde(rename = "loggingData")]
    pub logging: bool,
    #[serde(rename = "logFileSize")]
    pub log_entries_per_file: usize,
    pub log_file_prefix: String,
    #[serde(rename = "logFileDelimiter")]
    pub log_delimiter: String,
    pub log_file_root_path: String,
    pub log_files_written: u64,
    pub log_entries_written: u64,
    pub log_raw_files_written: u64,
    pub log_raw_entries_written: u64,
    pub log_write_errors: u64,
    pub log_buffered_entries: usize,
}

/// Serializable copy of a raw record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataEntry {
    pub message_type: &'static str,
    pub timestamp: i64,
    pub timestamp_string: String,
    pub device_mac: String,
    pub device_counter: u16,
    pub values: Vec<i32>,
}

impl From<&RawRecord> for RawDataEntry {
    fn from(record: &RawRecord) -> Self {
        let at = record.received_at();
        Self {
            message_type: record.message().as_str(),
            timestamp: at.timestamp(),
            timestamp_string: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            device_mac: record.header().mac_string(),
            device_counter: record.header().counter,
            values: record.values().to_vec(),
        }
    }
}
