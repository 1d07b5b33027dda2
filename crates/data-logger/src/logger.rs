//! Logging Sessions

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ring_buffer::SharedRingBuffer;
use serde::Serialize;
use systa_protocol::LogEntry;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::writer::{LoggerStats, SessionWriter, DATAGRAM_FILE_FACTOR};
use crate::{LoggerError, LoggingSettings};

const PROBE_FILE: &str = ".systa-probe";
const LOG_SUFFIX: &str = ".txt";

/// Current state of the logger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerStatus {
    pub active: bool,
    pub root_path: PathBuf,
    pub file_prefix: String,
    pub delimiter: String,
    pub entries_per_file: usize,
    pub buffered_entries: usize,
    /// Record files and lines of the current session
    pub files_written: u64,
    pub entries_written: u64,
    /// Raw datagram files and lines of the current session
    pub raw_files_written: u64,
    pub raw_entries_written: u64,
    pub write_errors: u64,
    pub last_entry_at: Option<DateTime<Utc>>,
    pub session_stamp: Option<String>,
}

/// A log file found under the root path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

struct Session {
    stamp: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Drains captured datagrams and records into rotating files while a
/// session is active
pub struct DataLogger {
    buffer: SharedRingBuffer<LogEntry>,
    settings: LoggingSettings,
    stats: Arc<LoggerStats>,
    session: Option<Session>,
    last_stamp: Option<String>,
}

impl DataLogger {
    pub fn new(buffer: SharedRingBuffer<LogEntry>, settings: LoggingSettings) -> Self {
        Self {
            buffer,
            settings,
            stats: Arc::new(LoggerStats::default()),
            session: None,
            last_stamp: None,
        }
    }

    pub fn buffer(&self) -> &SharedRingBuffer<LogEntry> {
        &self.buffer
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Settings of the current or most recent session
    pub fn settings(&self) -> &LoggingSettings {
        &self.settings
    }

    /// Start a new session, closing the active one first
    ///
    /// Settings and destination are checked before anything changes, so a
    /// rejected call leaves the logger as it was.
    pub async fn enable(&mut self, settings: LoggingSettings) -> Result<(), LoggerError> {
        settings.validate()?;
        probe_destination(&settings.root_path).await?;

        if self.session.is_some() {
            self.disable().await?;
        }

        let stamp = self.next_stamp().await;
        self.stats.reset();
        let writer = SessionWriter::new(settings.clone(), stamp.clone(), Arc::clone(&self.stats));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(drain(self.buffer.clone(), writer, stop_rx));

        info!(
            "Logging to {} as {}-{}-*{} with {} entries per file ({} for raw datagrams)",
            settings.root_path.display(),
            settings.file_prefix,
            stamp,
            LOG_SUFFIX,
            settings.entries_per_file,
            settings.entries_per_file.saturating_mul(DATAGRAM_FILE_FACTOR)
        );
        self.settings = settings;
        self.last_stamp = Some(stamp.clone());
        self.session = Some(Session {
            stamp,
            stop: stop_tx,
            task,
        });
        Ok(())
    }

    /// Stop the active session and close its partial file
    ///
    /// Records still buffered stay in the buffer. Returns whether a session
    /// was active.
    pub async fn disable(&mut self) -> Result<bool, LoggerError> {
        let Some(session) = self.session.take() else {
            return Ok(false);
        };
        let _ = session.stop.send(true);
        session
            .task
            .await
            .map_err(|e| LoggerError::Task(e.to_string()))?;
        info!(
            "Logging session {} stopped after {} records in {} files and {} datagrams in {} files",
            session.stamp,
            self.stats.records.entries_written.load(Ordering::Relaxed),
            self.stats.records.files_written.load(Ordering::Relaxed),
            self.stats.datagrams.entries_written.load(Ordering::Relaxed),
            self.stats.datagrams.files_written.load(Ordering::Relaxed)
        );
        Ok(true)
    }

    pub fn status(&self) -> LoggerStatus {
        LoggerStatus {
            active: self.is_active(),
            root_path: self.settings.root_path.clone(),
            file_prefix: self.settings.file_prefix.clone(),
            delimiter: self.settings.delimiter.clone(),
            entries_per_file: self.settings.entries_per_file,
            buffered_entries: self.buffer.size(),
            files_written: self.stats.records.files_written.load(Ordering::Relaxed),
            entries_written: self.stats.records.entries_written.load(Ordering::Relaxed),
            raw_files_written: self.stats.datagrams.files_written.load(Ordering::Relaxed),
            raw_entries_written: self.stats.datagrams.entries_written.load(Ordering::Relaxed),
            write_errors: self.stats.write_errors.load(Ordering::Relaxed),
            last_entry_at: self.stats.last_entry(),
            session_stamp: self.session.as_ref().map(|s| s.stamp.clone()),
        }
    }

    /// Log files under the root path, sorted by name
    pub async fn list_files(&self) -> Result<Vec<LogFileInfo>, LoggerError> {
        let mut entries = match tokio::fs::read_dir(&self.settings.root_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(LOG_SUFFIX) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            files.push(LogFileInfo {
                name,
                path: entry.path(),
                size: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Delete all log files, refused while a session is active
    pub async fn delete_files(&self) -> Result<usize, LoggerError> {
        if self.is_active() {
            return Err(LoggerError::SessionActive);
        }
        let files = self.list_files().await?;
        let mut deleted = 0;
        for file in &files {
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete {}: {}", file.path.display(), e),
            }
        }
        info!("Deleted {} of {} log files", deleted, files.len());
        Ok(deleted)
    }

    /// Session stamp that differs from the previous one
    async fn next_stamp(&self) -> String {
        loop {
            let stamp = Utc::now().format("%Y%m%d-%H%M%S%3f").to_string();
            if self.last_stamp.as_deref() != Some(stamp.as_str()) {
                return stamp;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl std::fmt::Debug for DataLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLogger")
            .field("settings", &self.settings)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create the destination and prove it is writable
async fn probe_destination(root: &Path) -> Result<(), LoggerError> {
    let fail = |e: std::io::Error| LoggerError::Destination {
        path: root.to_path_buf(),
        reason: e.to_string(),
    };
    tokio::fs::create_dir_all(root).await.map_err(fail)?;
    let probe = root.join(PROBE_FILE);
    tokio::fs::write(&probe, b"probe").await.map_err(fail)?;
    tokio::fs::remove_file(&probe).await.map_err(fail)?;
    Ok(())
}

async fn drain(
    buffer: SharedRingBuffer<LogEntry>,
    mut writer: SessionWriter,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        while let Ok(entry) = buffer.remove() {
            writer.write(&entry).await;
            if *stop.borrow() {
                break;
            }
        }
        writer.flush().await;

        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = buffer.wait_for_data() => {}
        }
    }

    if let Err(e) = writer.close().await {
        warn!("Failed to close log file: {}", e);
    }
    debug!("Log drain task finished");
}
