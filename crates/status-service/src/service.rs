//! Status Service
//!
//! Owns the receiver context, the receive loop handle and the data logger.
//! Reads go straight to the shared context; control operations are
//! serialized through async mutexes.

use std::sync::Arc;

use data_logger::{DataLogger, LogFileInfo, LoggerStatus, LoggingSettings};
use ring_buffer::SharedRingBuffer;
use systa_protocol::{DeviceInfo, DeviceSearch, FieldIndexTable, StatusSnapshot};
use systa_receiver::{Receiver, ReceiverContext, ReceiverHandle};
use tokio::sync::Mutex;
use tracing::info;

use crate::{RawDataEntry, ServiceConfig, ServiceError, ServiceStatus, WaterHeaterStatus};

pub struct StatusService {
    config: ServiceConfig,
    ctx: Arc<ReceiverContext>,
    receiver: Mutex<Option<ReceiverHandle>>,
    logger: Mutex<DataLogger>,
    discovery: DeviceSearch,
}

impl StatusService {
    /// Build the service without starting anything
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let table = Arc::new(
            config
                .field_table
                .clone()
                .unwrap_or_else(FieldIndexTable::systa_comfort),
        );
        let log_buffer = SharedRingBuffer::new(
            config.logger.buffer_capacity,
            config.logger.buffer_overwrite,
        );
        let ctx = ReceiverContext::new(&config.receiver, table, log_buffer.clone())?;
        let logger = DataLogger::new(log_buffer, config.logger.settings());
        let discovery = DeviceSearch::new(config.discovery.clone());

        Ok(Self {
            config,
            ctx: Arc::new(ctx),
            receiver: Mutex::new(None),
            logger: Mutex::new(logger),
            discovery,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shared receiver state, mostly useful for feeding datagrams in tests
    pub fn context(&self) -> &Arc<ReceiverContext> {
        &self.ctx
    }

    /// Latest decoded snapshot
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.ctx.snapshot()
    }

    /// Newest `count` raw records, oldest first
    pub fn raw_data(&self, count: usize) -> Vec<RawDataEntry> {
        self.ctx
            .recent(count)
            .iter()
            .map(RawDataEntry::from)
            .collect()
    }

    pub fn latest_raw(&self) -> Option<RawDataEntry> {
        self.ctx.latest_raw().as_ref().map(RawDataEntry::from)
    }

    pub fn water_heater(&self) -> Option<WaterHeaterStatus> {
        WaterHeaterStatus::from_snapshot(&self.ctx.snapshot())
    }

    /// Start the receive loop, returns false if it was already running
    pub async fn start(&self) -> Result<bool, ServiceError> {
        let mut receiver = self.receiver.lock().await;
        if let Some(handle) = receiver.as_ref() {
            if !handle.is_finished() {
                return Ok(false);
            }
        }
        let handle = Receiver::spawn(&self.config.receiver, Arc::clone(&self.ctx)).await?;
        *receiver = Some(handle);
        Ok(true)
    }

    /// Stop the receive loop, returns false if it was not running
    ///
    /// The lock is held until the socket is released, so a concurrent
    /// `start` cannot race the old socket for the address.
    pub async fn stop(&self) -> Result<bool, ServiceError> {
        let mut receiver = self.receiver.lock().await;
        let Some(handle) = receiver.take() else {
            return Ok(false);
        };
        let addr = handle.local_addr();
        handle.stop().await?;
        info!("Receiver on {} stopped", addr);
        Ok(true)
    }

    pub async fn is_running(&self) -> bool {
        self.receiver
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start a logging session; the previous one is closed first
    pub async fn enable_logging(&self, settings: LoggingSettings) -> Result<(), ServiceError> {
        let mut logger = self.logger.lock().await;
        logger.enable(settings).await?;
        self.ctx.set_log_capture(true);
        Ok(())
    }

    /// Stop the logging session, returns false if none was active
    pub async fn disable_logging(&self) -> Result<bool, ServiceError> {
        let mut logger = self.logger.lock().await;
        self.ctx.set_log_capture(false);
        Ok(logger.disable().await?)
    }

    /// Settings used when a request leaves them out
    pub fn default_logging_settings(&self) -> LoggingSettings {
        self.config.logger.settings()
    }

    pub async fn logger_status(&self) -> LoggerStatus {
        self.logger.lock().await.status()
    }

    pub async fn list_logs(&self) -> Result<Vec<LogFileInfo>, ServiceError> {
        Ok(self.logger.lock().await.list_files().await?)
    }

    /// Delete all log files, refused while logging
    pub async fn delete_logs(&self) -> Result<usize, ServiceError> {
        let deleted = self.logger.lock().await.delete_files().await?;
        info!("Deleted {} log files", deleted);
        Ok(deleted)
    }

    /// Look for a SystaComfort unit on the local network
    pub async fn find_device(&self) -> Result<Option<DeviceInfo>, ServiceError> {
        Ok(self.discovery.search().await?)
    }

    pub async fn service_status(&self) -> ServiceStatus {
        let (running, listen_addr) = {
            let receiver = self.receiver.lock().await;
            match receiver.as_ref() {
                Some(handle) if !handle.is_finished() => (true, handle.local_addr()),
                _ => (false, self.config.receiver.listen_addr),
            }
        };
        let logger = self.logger_status().await;
        let peer = self.ctx.peer();
        let snapshot = self.ctx.snapshot();

        ServiceStatus {
            running,
            connected: self.ctx.is_connected(),
            last_data_received_at: self.ctx.last_received(),
            counters: self.ctx.counters().snapshot(),
            listener_ip: listen_addr.ip().to_string(),
            listener_port: listen_addr.port(),
            device_ip: peer.map(|addr| addr.ip().to_string()),
            device_port: peer.map(|addr| addr.port()),
            device_mac: snapshot.device().map(|header| header.mac_string()),
            logging: logger.active,
            log_entries_per_file: logger.entries_per_file,
            log_file_prefix: logger.file_prefix,
            log_delimiter: logger.delimiter,
            log_file_root_path: logger.root_path.display().to_string(),
            log_files_written: logger.files_written,
            log_entries_written: logger.entries_written,
            log_raw_files_written: logger.raw_files_written,
            log_raw_entries_written: logger.raw_entries_written,
            log_write_errors: logger.write_errors,
            log_buffered_entries: logger.buffered_entries,
        }
    }

    /// Stop logging and the receive loop
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.disable_logging().await?;
        self.stop().await?;
        Ok(())
    }
}

impl std::fmt::Debug for StatusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusService")
            .field("listen_addr", &self.config.receiver.listen_addr)
            .field("ctx", &self.ctx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::net::SocketAddr;
    use std::path::Path;
    use systa_protocol::index::names;
    use systa_protocol::FieldSpec;

    fn datagram(tag: u8, counter: u16, values: &[i32]) -> Vec<u8> {
        let mut data = vec![0u8; 24];
        data[..6].copy_from_slice(&[0x44, 0x33, 0x22, 0x11, 0x66, 0x55]);
        data[6..8].copy_from_slice(&counter.to_le_bytes());
        data[16] = tag;
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    fn primary(counter: u16, hot_water_tenths: i32) -> Vec<u8> {
        let mut values = vec![0i32; 250];
        values[3] = hot_water_tenths;
        datagram(0x01, counter, &values)
    }

    fn peer() -> SocketAddr {
        "192.168.1.20:40000".parse().unwrap()
    }

    fn config(root: &Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.receiver.listen_addr = "127.0.0.1:0".parse().unwrap();
        config.logger.root_path = root.to_path_buf();
        config.autostart = false;
        config
    }

    fn settings(root: &Path, entries_per_file: usize) -> LoggingSettings {
        LoggingSettings {
            root_path: root.to_path_buf(),
            file_prefix: "test".to_string(),
            delimiter: ";".to_string(),
            entries_per_file,
        }
    }

    async fn wait_until_drained(service: &StatusService) {
        for _ in 0..200 {
            if service.context().log_buffer().is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = StatusService::new(config(dir.path())).unwrap();

        assert!(!service.is_running().await);
        assert!(service.start().await.unwrap());
        assert!(!service.start().await.unwrap());
        assert!(service.is_running().await);

        let status = service.service_status().await;
        assert!(status.running);
        assert_eq!(status.listener_ip, "127.0.0.1");
        assert_ne!(status.listener_port, 0);

        assert!(service.stop().await.unwrap());
        assert!(!service.stop().await.unwrap());
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_concurrent_stop_and_start_on_fixed_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let free = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        config.receiver.listen_addr = free.local_addr().unwrap();
        drop(free);
        let service = StatusService::new(config).unwrap();
        service.start().await.unwrap();

        for _ in 0..20 {
            let (stopped, started) = tokio::join!(service.stop(), service.start());
            stopped.unwrap();
            started.unwrap();
            service.start().await.unwrap();
            assert!(service.is_running().await);
        }
        assert!(service.stop().await.unwrap());
    }

    #[tokio::test]
    async fn test_status_and_raw_data() {
        let dir = tempfile::tempdir().unwrap();
        let service = StatusService::new(config(dir.path())).unwrap();
        assert!(service.status().is_empty());
        assert!(service.water_heater().is_none());
        assert!(service.latest_raw().is_none());

        let ctx = service.context();
        for (i, temp) in [480, 481, 482].into_iter().enumerate() {
            ctx.handle_datagram(&primary(i as u16, temp), peer(), Utc::now());
        }

        assert_eq!(service.status().number(names::HOT_WATER_TEMP), Some(48.2));
        assert_eq!(
            service.water_heater().unwrap().current_temperature,
            Some(48.2)
        );

        let raw = service.raw_data(2);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].values[3], 481);
        assert_eq!(raw[1].values[3], 482);
        assert_eq!(raw[1].message_type, "primary");
        assert_eq!(raw[1].device_mac, "11:22:33:44:55:66");
        assert_eq!(service.latest_raw().unwrap().device_counter, 2);

        let status = service.service_status().await;
        assert!(!status.running);
        assert!(status.connected);
        assert_eq!(status.counters.packets_received, 3);
        assert_eq!(status.device_ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(status.device_port, Some(40000));
        assert_eq!(status.device_mac.as_deref(), Some("11:22:33:44:55:66"));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["packetsReceived"], 3);
        assert_eq!(json["paradigmaPort"], 40000);
        assert_eq!(json["loggingData"], false);
        assert_eq!(json["logFileSize"], 60);
    }

    #[tokio::test]
    async fn test_logging_session() {
        let dir = tempfile::tempdir().unwrap();
        let service = StatusService::new(config(dir.path())).unwrap();
        let ctx = service.context();

        // Records before logging is enabled are not captured
        ctx.handle_datagram(&primary(0, 400), peer(), Utc::now());
        assert!(ctx.log_buffer().is_empty());

        service
            .enable_logging(settings(dir.path(), 2))
            .await
            .unwrap();
        assert!(ctx.log_capture());
        assert!(matches!(
            service.delete_logs().await,
            Err(ServiceError::Logger(data_logger::LoggerError::SessionActive))
        ));

        for i in 1..=5 {
            ctx.handle_datagram(&primary(i, 400 + i as i32), peer(), Utc::now());
        }
        // Dropped datagrams only show up in the raw files
        let mut unknown = primary(6, 0);
        unknown[16] = 0x09;
        ctx.handle_datagram(&unknown, peer(), Utc::now());
        wait_until_drained(&service).await;

        assert!(service.disable_logging().await.unwrap());
        assert!(!service.disable_logging().await.unwrap());
        assert!(!ctx.log_capture());

        let status = service.logger_status().await;
        assert!(!status.active);
        assert_eq!(status.entries_written, 5);
        assert_eq!(status.files_written, 3);
        assert_eq!(status.raw_entries_written, 6);
        assert_eq!(status.raw_files_written, 1);

        let json = serde_json::to_value(service.service_status().await).unwrap();
        assert_eq!(json["logRawEntriesWritten"], 6);

        let files = service.list_logs().await.unwrap();
        assert_eq!(files.len(), 4);
        assert_eq!(files.iter().filter(|f| f.name.starts_with("test-raw-")).count(), 1);
        assert_eq!(service.delete_logs().await.unwrap(), 4);
        assert!(service.list_logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_logging_settings_leave_capture_off() {
        let dir = tempfile::tempdir().unwrap();
        let service = StatusService::new(config(dir.path())).unwrap();

        let result = service.enable_logging(settings(dir.path(), 0)).await;
        assert!(result.is_err());
        assert!(!service.context().log_capture());
        assert!(!service.logger_status().await.active);
    }

    #[test]
    fn test_custom_field_table() {
        let mut config = ServiceConfig::default();
        config.field_table = Some(FieldIndexTable::new(vec![FieldSpec::raw("only", 0)]).unwrap());
        let service = StatusService::new(config).unwrap();
        assert_eq!(service.status().table().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_see_whole_snapshots() {
        let fields = (0..10)
            .map(|i| FieldSpec::raw(format!("f{}", i), i))
            .collect();
        let mut config = ServiceConfig::default();
        config.field_table = Some(FieldIndexTable::new(fields).unwrap());
        let service = Arc::new(StatusService::new(config).unwrap());

        let producer = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                for k in 1..=2_000i32 {
                    let packet = datagram(0x01, k as u16, &[k; 10]);
                    service
                        .context()
                        .handle_datagram(&packet, peer(), Utc::now());
                    if k % 100 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let mut last_seen = 0;
                    for _ in 0..2_000 {
                        let snapshot = service.status();
                        let values: Vec<i64> = (0..10)
                            .filter_map(|i| snapshot.integer(&format!("f{}", i)))
                            .collect();
                        if values.is_empty() {
                            continue;
                        }
                        assert_eq!(values.len(), 10);
                        assert!(values.iter().all(|v| *v == values[0]), "torn: {:?}", values);
                        assert!(values[0] >= last_seen);
                        last_seen = values[0];
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        producer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(service.status().integer("f9"), Some(2_000));
    }
}
