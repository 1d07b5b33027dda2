//! Receiver Context
//!
//! Everything the receive loop shares with readers: the published snapshot,
//! counters, the raw record buffers and what is known about the peer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ring_buffer::SharedRingBuffer;
use systa_protocol::{
    FieldIndexTable, LogEntry, ProtocolError, RawDatagram, RawRecord, ReplyBuilder, StatusDecoder,
    StatusSnapshot, SystaWebReply, WireLayout,
};
use tracing::{debug, warn};

use crate::{ReceiverConfig, ReceiverCounters, ReceiverError};

/// Holds the latest snapshot; readers get a cheap `Arc` clone
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<StatusSnapshot>>,
}

impl SnapshotCell {
    pub fn new(initial: StatusSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<StatusSnapshot> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Replace the current snapshot as a whole
    pub fn publish(&self, snapshot: StatusSnapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PeerState {
    addr: Option<SocketAddr>,
    last_received: Option<DateTime<Utc>>,
}

/// State shared between the receive loop and its readers
pub struct ReceiverContext {
    layout: WireLayout,
    decoder: StatusDecoder,
    reply: Arc<dyn ReplyBuilder>,
    snapshot: SnapshotCell,
    counters: ReceiverCounters,
    log_buffer: SharedRingBuffer<LogEntry>,
    recent: SharedRingBuffer<RawRecord>,
    log_capture: AtomicBool,
    peer: Mutex<PeerState>,
    connected_window: Duration,
}

impl ReceiverContext {
    pub fn new(
        config: &ReceiverConfig,
        table: Arc<FieldIndexTable>,
        log_buffer: SharedRingBuffer<LogEntry>,
    ) -> Result<Self, ReceiverError> {
        config.layout.validate()?;
        let reply = SystaWebReply::new(config.reply.clone())?;
        let decoder = StatusDecoder::new(table);

        Ok(Self {
            layout: config.layout.clone(),
            snapshot: SnapshotCell::new(decoder.empty_snapshot()),
            decoder,
            reply: Arc::new(reply),
            counters: ReceiverCounters::new(),
            log_buffer,
            recent: SharedRingBuffer::new(config.recent_capacity, true),
            log_capture: AtomicBool::new(false),
            peer: Mutex::new(PeerState::default()),
            connected_window: config.connected_window(),
        })
    }

    /// Use a different reply rule
    pub fn with_reply_builder(mut self, reply: Arc<dyn ReplyBuilder>) -> Self {
        self.reply = reply;
        self
    }

    /// Process one datagram and return the reply to send, if any
    pub fn handle_datagram(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        received_at: DateTime<Utc>,
    ) -> Option<Vec<u8>> {
        self.counters.record_datagram();
        self.capture_datagram(datagram, peer, received_at);

        let record = match RawRecord::parse(&self.layout, datagram, received_at) {
            Ok(record) => record,
            Err(e) => {
                match e {
                    ProtocolError::UnknownMessageType { .. } => self.counters.record_unknown_type(),
                    _ => self.counters.record_bad_length(),
                }
                warn!("Dropping datagram from {}: {}", peer, e);
                return None;
            }
        };

        self.counters.record_accepted(record.message());
        {
            let mut state = self.peer_state();
            state.addr = Some(peer);
            state.last_received = Some(received_at);
        }

        let previous = self.snapshot.load();
        self.snapshot
            .publish(self.decoder.decode(&previous, &record));
        debug!(
            "Decoded {} record with {} values from {}",
            record.message(),
            record.len(),
            peer
        );

        if self.log_capture() {
            self.capture(LogEntry::Record(record.clone()));
        }
        // Recent history always overwrites
        let _ = self.recent.add(record);

        self.reply.build_reply(datagram)
    }

    /// Count and capture a datagram that did not fit the receive buffer
    ///
    /// `datagram` holds the bytes that were read, which is more than
    /// `max_len` but may be less than what the device sent.
    pub fn reject_oversized(
        &self,
        datagram: &[u8],
        max_len: usize,
        peer: SocketAddr,
        received_at: DateTime<Utc>,
    ) {
        self.counters.record_datagram();
        self.capture_datagram(datagram, peer, received_at);
        self.counters.record_bad_length();
        warn!(
            "Dropping datagram from {}: longer than {} bytes",
            peer, max_len
        );
    }

    fn capture_datagram(&self, datagram: &[u8], peer: SocketAddr, received_at: DateTime<Utc>) {
        if self.log_capture() {
            self.capture(LogEntry::Datagram(RawDatagram::new(
                received_at,
                peer,
                datagram.to_vec(),
            )));
        }
    }

    fn capture(&self, entry: LogEntry) {
        match self.log_buffer.add(entry) {
            Ok(None) => {}
            Ok(Some(_)) => self.counters.record_buffer_eviction(),
            Err(e) => {
                self.counters.record_buffer_rejection();
                debug!("Log buffer rejected entry: {}", e);
            }
        }
    }

    fn peer_state(&self) -> std::sync::MutexGuard<'_, PeerState> {
        self.peer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.snapshot.load()
    }

    pub fn counters(&self) -> &ReceiverCounters {
        &self.counters
    }

    pub fn layout(&self) -> &WireLayout {
        &self.layout
    }

    /// Copy of the newest `count` raw records, oldest first
    pub fn recent(&self, count: usize) -> Vec<RawRecord> {
        self.recent.latest(count)
    }

    pub fn latest_raw(&self) -> Option<RawRecord> {
        self.recent.newest().ok()
    }

    pub fn log_buffer(&self) -> &SharedRingBuffer<LogEntry> {
        &self.log_buffer
    }

    /// Start or stop copying datagrams and accepted records into the log buffer
    pub fn set_log_capture(&self, enabled: bool) {
        self.log_capture.store(enabled, Ordering::Release);
    }

    pub fn log_capture(&self) -> bool {
        self.log_capture.load(Ordering::Acquire)
    }

    /// Address of the device that sent the last accepted datagram
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer_state().addr
    }

    pub fn last_received(&self) -> Option<DateTime<Utc>> {
        self.peer_state().last_received
    }

    /// Whether data arrived within the connected window
    pub fn is_connected(&self) -> bool {
        self.is_connected_at(Utc::now())
    }

    pub fn is_connected_at(&self, now: DateTime<Utc>) -> bool {
        match (self.last_received(), chrono::Duration::from_std(self.connected_window)) {
            (Some(last), Ok(window)) => now.signed_duration_since(last) <= window,
            _ => false,
        }
    }
}

impl std::fmt::Debug for ReceiverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverContext")
            .field("layout", &self.layout)
            .field("counters", &self.counters.snapshot())
            .field("log_capture", &self.log_capture())
            .finish()
    }
}
