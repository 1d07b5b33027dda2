//! Receive Loop Counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use systa_protocol::MessageType;

/// Monotonic counters updated by the receive loop
///
/// Every increment is mirrored to the global `metrics` recorder.
#[derive(Debug, Default)]
pub struct ReceiverCounters {
    received: AtomicU64,
    received_by_type: [AtomicU64; 3],
    dropped_unknown_type: AtomicU64,
    dropped_bad_length: AtomicU64,
    buffer_rejections: AtomicU64,
    buffer_evictions: AtomicU64,
    replies_sent: AtomicU64,
    reply_failures: AtomicU64,
    receive_errors: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub packets_received: u64,
    pub primary_received: u64,
    pub extended1_received: u64,
    pub extended2_received: u64,
    pub dropped_unknown_type: u64,
    pub dropped_bad_length: u64,
    pub buffer_rejections: u64,
    pub buffer_evictions: u64,
    pub replies_sent: u64,
    pub reply_failures: u64,
    pub receive_errors: u64,
}

impl ReceiverCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any datagram read from the socket, accepted or not
    pub fn record_datagram(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_datagrams_received_total").increment(1);
    }

    pub fn record_accepted(&self, message: MessageType) {
        self.received_by_type[message.index()].fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_records_accepted_total", "type" => message.as_str()).increment(1);
    }

    pub fn record_unknown_type(&self) {
        self.dropped_unknown_type.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_datagrams_dropped_total", "reason" => "unknown_type").increment(1);
    }

    pub fn record_bad_length(&self) {
        self.dropped_bad_length.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_datagrams_dropped_total", "reason" => "bad_length").increment(1);
    }

    pub fn record_buffer_rejection(&self) {
        self.buffer_rejections.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_buffer_rejections_total").increment(1);
    }

    pub fn record_buffer_eviction(&self) {
        self.buffer_evictions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_buffer_evictions_total").increment(1);
    }

    pub fn record_reply_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_replies_sent_total").increment(1);
    }

    pub fn record_reply_failure(&self) {
        self.reply_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_reply_failures_total").increment(1);
    }

    pub fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("systa_receive_errors_total").increment(1);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            packets_received: load(&self.received),
            primary_received: load(&self.received_by_type[MessageType::Primary.index()]),
            extended1_received: load(&self.received_by_type[MessageType::Extended1.index()]),
            extended2_received: load(&self.received_by_type[MessageType::Extended2.index()]),
            dropped_unknown_type: load(&self.dropped_unknown_type),
            dropped_bad_length: load(&self.dropped_bad_length),
            buffer_rejections: load(&self.buffer_rejections),
            buffer_evictions: load(&self.buffer_evictions),
            replies_sent: load(&self.replies_sent),
            reply_failures: load(&self.reply_failures),
            receive_errors: load(&self.receive_errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = ReceiverCounters::new();
        counters.record_datagram();
        counters.record_datagram();
        counters.record_accepted(MessageType::Primary);
        counters.record_unknown_type();
        counters.record_reply_failure();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.primary_received, 1);
        assert_eq!(snapshot.extended1_received, 0);
        assert_eq!(snapshot.dropped_unknown_type, 1);
        assert_eq!(snapshot.reply_failures, 1);
    }
}
