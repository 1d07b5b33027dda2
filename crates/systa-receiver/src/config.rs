//! Receiver Configuration

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use systa_protocol::{ReplyConfig, WireLayout, DEFAULT_LISTEN_PORT, MAX_DATAGRAM_LEN};

/// Configuration for the receive loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Address the controller sends its datagrams to
    pub listen_addr: SocketAddr,
    /// Longest datagram accepted, anything longer is dropped as a bad length
    pub max_datagram_len: usize,
    pub layout: WireLayout,
    pub reply: ReplyConfig,
    /// Seconds after the last datagram during which the device counts as connected
    pub connected_window_secs: u64,
    /// Raw records kept for the raw data view
    pub recent_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                DEFAULT_LISTEN_PORT,
            )),
            max_datagram_len: MAX_DATAGRAM_LEN,
            layout: WireLayout::default(),
            reply: ReplyConfig::default(),
            connected_window_secs: 120,
            recent_capacity: 64,
        }
    }
}

impl ReceiverConfig {
    pub fn connected_window(&self) -> Duration {
        Duration::from_secs(self.connected_window_secs)
    }
}
