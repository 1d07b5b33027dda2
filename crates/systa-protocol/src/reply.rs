//! Reply Construction
//!
//! The controller only keeps sending status data when every datagram is
//! answered with a reply it recognizes as coming from its cloud endpoint.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, DEVICE_HEADER_LEN};

/// Builds the reply for an accepted datagram
pub trait ReplyBuilder: Send + Sync {
    /// Returns `None` when no reply should be sent
    fn build_reply(&self, datagram: &[u8]) -> Option<Vec<u8>>;
}

/// Constants of the SystaWeb reply rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Total reply length
    pub length: usize,
    /// Position of the constant marker byte
    pub marker_offset: usize,
    pub marker: u8,
    /// Position of the two byte reply id
    pub id_offset: usize,
    /// Added to the little-endian u16 at datagram bytes 4..6
    pub id_addend: u16,
    /// Position of the two byte reply counter
    pub counter_offset: usize,
    /// Added to the device counter at datagram bytes 6..8
    pub counter_addend: u16,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            length: 20,
            marker_offset: 12,
            marker: 0x01,
            id_offset: 16,
            id_addend: 0x8E83,
            counter_offset: 18,
            counter_addend: 0x3FBF,
        }
    }
}

impl ReplyConfig {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.length < DEVICE_HEADER_LEN {
            return Err(ProtocolError::InvalidReply(format!(
                "length {} cannot hold the {} byte device header",
                self.length, DEVICE_HEADER_LEN
            )));
        }
        let fits = self.marker_offset < self.length
            && self.id_offset + 2 <= self.length
            && self.counter_offset + 2 <= self.length;
        if !fits {
            return Err(ProtocolError::InvalidReply(format!(
                "offsets exceed reply length {}",
                self.length
            )));
        }
        Ok(())
    }
}

/// Reply rule observed between SystaComfort II units and the vendor cloud
#[derive(Debug, Clone, Default)]
pub struct SystaWebReply {
    config: ReplyConfig,
}

impl SystaWebReply {
    pub fn new(config: ReplyConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReplyConfig {
        &self.config
    }
}

impl ReplyBuilder for SystaWebReply {
    fn build_reply(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        if datagram.len() < DEVICE_HEADER_LEN {
            return None;
        }
        let c = &self.config;
        let mut reply = vec![0u8; c.length];
        reply[..DEVICE_HEADER_LEN].copy_from_slice(&datagram[..DEVICE_HEADER_LEN]);
        reply[c.marker_offset] = c.marker;

        let id = u16::from_le_bytes([datagram[4], datagram[5]]).wrapping_add(c.id_addend);
        reply[c.id_offset..c.id_offset + 2].copy_from_slice(&id.to_le_bytes());

        let counter = u16::from_le_bytes([datagram[6], datagram[7]]).wrapping_add(c.counter_addend);
        reply[c.counter_offset..c.counter_offset + 2].copy_from_slice(&counter.to_le_bytes());

        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_layout() {
        let mut datagram = vec![0xAAu8; 40];
        datagram[..8].copy_from_slice(&[1, 2, 3, 4, 0x10, 0x20, 0x05, 0x00]);

        let reply = SystaWebReply::default().build_reply(&datagram).unwrap();

        assert_eq!(reply.len(), 20);
        assert_eq!(&reply[..8], &[1, 2, 3, 4, 0x10, 0x20, 0x05, 0x00]);
        assert_eq!(&reply[8..12], &[0, 0, 0, 0]);
        assert_eq!(reply[12], 0x01);
        assert_eq!(&reply[13..16], &[0, 0, 0]);
        // 0x2010 + 0x8E83 = 0xAE93
        assert_eq!(&reply[16..18], &[0x93, 0xAE]);
        // 0x0005 + 0x3FBF = 0x3FC4
        assert_eq!(&reply[18..20], &[0xC4, 0x3F]);
    }

    #[test]
    fn test_reply_counter_wraps() {
        let mut datagram = vec![0u8; 24];
        datagram[4..8].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

        let reply = SystaWebReply::default().build_reply(&datagram).unwrap();

        assert_eq!(u16::from_le_bytes([reply[16], reply[17]]), 0x8E82);
        assert_eq!(u16::from_le_bytes([reply[18], reply[19]]), 0x3FBE);
    }

    #[test]
    fn test_short_datagram_gets_no_reply() {
        assert!(SystaWebReply::default().build_reply(&[0u8; 5]).is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReplyConfig {
            length: 16,
            ..ReplyConfig::default()
        };
        assert!(SystaWebReply::new(config).is_err());
    }
}
