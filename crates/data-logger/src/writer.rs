//! Rotating File Writer

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use systa_protocol::{LogEntry, RawDatagram, RawRecord};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error};

use crate::LoggingSettings;

/// Per file set counters
#[derive(Debug, Default)]
pub(crate) struct FileSetStats {
    pub files_written: AtomicU64,
    pub entries_written: AtomicU64,
}

impl FileSetStats {
    fn reset(&self) {
        self.files_written.store(0, Ordering::Relaxed);
        self.entries_written.store(0, Ordering::Relaxed);
    }
}

/// Counters shared between the writer task and status readers
#[derive(Debug, Default)]
pub(crate) struct LoggerStats {
    pub records: FileSetStats,
    pub datagrams: FileSetStats,
    pub write_errors: AtomicU64,
    pub last_entry: Mutex<Option<DateTime<Utc>>>,
}

impl LoggerStats {
    pub fn reset(&self) {
        self.records.reset();
        self.datagrams.reset();
        self.write_errors.store(0, Ordering::Relaxed);
        *self.last_entry_guard() = None;
    }

    pub fn last_entry(&self) -> Option<DateTime<Utc>> {
        *self.last_entry_guard()
    }

    fn last_entry_guard(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_entry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Raw datagram files hold this many times the entries of a record file
pub(crate) const DATAGRAM_FILE_FACTOR: usize = 3;

/// Infix that marks raw datagram files
pub(crate) const DATAGRAM_INFIX: &str = "raw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Records,
    Datagrams,
}

impl FileKind {
    fn label(self) -> &'static str {
        match self {
            FileKind::Records => "records",
            FileKind::Datagrams => "datagrams",
        }
    }
}

struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

/// Numbered files of one kind
struct FileSet {
    kind: FileKind,
    entries_per_file: usize,
    next_index: u64,
    current: Option<OpenFile>,
}

impl FileSet {
    fn new(kind: FileKind, entries_per_file: usize) -> Self {
        Self {
            kind,
            entries_per_file,
            next_index: 0,
            current: None,
        }
    }

    async fn close(&mut self) -> std::io::Result<()> {
        if let Some(mut file) = self.current.take() {
            file.writer.flush().await?;
            file.writer.shutdown().await?;
            debug!(
                "Closed {} log file {} after {} entries",
                self.kind.label(),
                file.path.display(),
                file.lines
            );
        }
        Ok(())
    }
}

/// Writes the entries of one session into two sets of numbered files
///
/// Records go to `<prefix>-<stamp>-<n>.txt`, raw datagrams to
/// `<prefix>-raw-<stamp>-<n>.txt`.
pub(crate) struct SessionWriter {
    settings: LoggingSettings,
    stamp: String,
    records: FileSet,
    datagrams: FileSet,
    stats: Arc<LoggerStats>,
}

/// One log line: timestamp, message type and all values
pub(crate) fn format_line(record: &RawRecord, delimiter: &str) -> String {
    let mut line = record
        .received_at()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    line.push_str(delimiter);
    line.push_str(&record.message().index().to_string());
    for value in record.values() {
        line.push_str(delimiter);
        line.push_str(&value.to_string());
    }
    line.push('\n');
    line
}

/// One raw line: timestamp, sender and every byte as an unsigned number
pub(crate) fn format_datagram_line(datagram: &RawDatagram, delimiter: &str) -> String {
    let mut line = datagram
        .received_at()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    line.push_str(delimiter);
    line.push_str(&datagram.peer().to_string());
    for byte in datagram.bytes() {
        line.push_str(delimiter);
        line.push_str(&byte.to_string());
    }
    line.push('\n');
    line
}

impl SessionWriter {
    pub fn new(settings: LoggingSettings, stamp: String, stats: Arc<LoggerStats>) -> Self {
        let records = FileSet::new(FileKind::Records, settings.entries_per_file);
        let datagrams = FileSet::new(
            FileKind::Datagrams,
            settings.entries_per_file.saturating_mul(DATAGRAM_FILE_FACTOR),
        );
        Self {
            settings,
            stamp,
            records,
            datagrams,
            stats,
        }
    }

    /// Append an entry, logging and counting any failure
    pub async fn write(&mut self, entry: &LogEntry) {
        let (kind, line) = match entry {
            LogEntry::Record(record) => (
                FileKind::Records,
                format_line(record, &self.settings.delimiter),
            ),
            LogEntry::Datagram(datagram) => (
                FileKind::Datagrams,
                format_datagram_line(datagram, &self.settings.delimiter),
            ),
        };

        if let Err(e) = self.try_write(kind, &line, entry.received_at()).await {
            self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("systa_log_write_errors_total").increment(1);
            error!("Failed to write {} log entry: {}", kind.label(), e);
            // The next entry of this kind starts a fresh file
            self.file_set(kind).current = None;
        }
    }

    fn file_set(&mut self, kind: FileKind) -> &mut FileSet {
        match kind {
            FileKind::Records => &mut self.records,
            FileKind::Datagrams => &mut self.datagrams,
        }
    }

    fn file_path(&self, kind: FileKind, index: u64) -> PathBuf {
        let name = match kind {
            FileKind::Records => format!(
                "{}-{}-{}.txt",
                self.settings.file_prefix, self.stamp, index
            ),
            FileKind::Datagrams => format!(
                "{}-{}-{}-{}.txt",
                self.settings.file_prefix, DATAGRAM_INFIX, self.stamp, index
            ),
        };
        self.settings.root_path.join(name)
    }

    async fn try_write(
        &mut self,
        kind: FileKind,
        line: &str,
        received_at: DateTime<Utc>,
    ) -> std::io::Result<()> {
        let stats = Arc::clone(&self.stats);
        let set_stats = match kind {
            FileKind::Records => &stats.records,
            FileKind::Datagrams => &stats.datagrams,
        };

        if self.file_set(kind).current.is_none() {
            let index = self.file_set(kind).next_index;
            let path = self.file_path(kind, index);
            let file = File::create(&path).await?;
            let set = self.file_set(kind);
            set.next_index += 1;
            set.current = Some(OpenFile {
                path: path.clone(),
                writer: BufWriter::new(file),
                lines: 0,
            });
            set_stats.files_written.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("systa_log_files_created_total", "kind" => kind.label())
                .increment(1);
            debug!("Opened log file {}", path.display());
        }

        let set = self.file_set(kind);
        let Some(file) = set.current.as_mut() else {
            return Ok(());
        };
        file.writer.write_all(line.as_bytes()).await?;
        file.lines += 1;
        let full = file.lines >= set.entries_per_file;

        set_stats.entries_written.fetch_add(1, Ordering::Relaxed);
        *stats.last_entry_guard() = Some(received_at);
        metrics::counter!("systa_log_entries_written_total", "kind" => kind.label())
            .increment(1);

        if full {
            set.close().await?;
        }
        Ok(())
    }

    /// Push buffered lines to disk
    pub async fn flush(&mut self) {
        for set in [&mut self.records, &mut self.datagrams] {
            if let Some(file) = set.current.as_mut() {
                if let Err(e) = file.writer.flush().await {
                    self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Failed to flush {}: {}", file.path.display(), e);
                    set.current = None;
                }
            }
        }
    }

    /// Flush and close the current files
    pub async fn close(&mut self) -> std::io::Result<()> {
        let records = self.records.close().await;
        self.datagrams.close().await?;
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use systa_protocol::{DeviceHeader, MessageType};

    #[test]
    fn test_format_line() {
        let at = DateTime::parse_from_rfc3339("2026-10-16T08:30:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = RawRecord::new(
            MessageType::Primary,
            DeviceHeader {
                mac: [0; 6],
                counter: 0,
            },
            at,
            vec![235, -12, 0],
        );

        assert_eq!(
            format_line(&record, ";"),
            "2026-10-16T08:30:00.250Z;0;235;-12;0\n"
        );
    }

    #[test]
    fn test_format_datagram_line() {
        let at = DateTime::parse_from_rfc3339("2026-10-16T08:30:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let datagram = RawDatagram::new(
            at,
            "192.168.1.20:40000".parse().unwrap(),
            vec![0x09, 0xff, 0x00, 0x80],
        );

        assert_eq!(
            format_datagram_line(&datagram, ","),
            "2026-10-16T08:30:00.250Z,192.168.1.20:40000,9,255,0,128\n"
        );
    }
}
