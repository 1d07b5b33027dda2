//! Datagram Layout and Raw Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Largest datagram the controller sends
pub const MAX_DATAGRAM_LEN: usize = 1024;

/// Number of bytes holding the device MAC address and packet counter
pub const DEVICE_HEADER_LEN: usize = 8;

/// Byte order of the integers carried after the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// SystaComfort II firmware
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn read_i32(&self, bytes: [u8; 4]) -> i32 {
        match self {
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
        }
    }
}

/// Message types sent by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Status block carrying the known field layout
    Primary,
    /// First supplementary block
    Extended1,
    /// Second supplementary block
    Extended2,
}

impl MessageType {
    pub const ALL: [MessageType; 3] = [
        MessageType::Primary,
        MessageType::Extended1,
        MessageType::Extended2,
    ];

    /// Stable index, used for per-type tables and log lines
    pub fn index(&self) -> usize {
        match self {
            MessageType::Primary => 0,
            MessageType::Extended1 => 1,
            MessageType::Extended2 => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Primary => "primary",
            MessageType::Extended1 => "extended1",
            MessageType::Extended2 => "extended2",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted tag byte and datagram length range for one message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRule {
    pub tag: u8,
    pub min_len: usize,
    pub max_len: usize,
}

/// Where things live inside a datagram
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireLayout {
    /// Offset of the message type tag byte
    pub type_offset: usize,
    /// Offset of the first integer
    pub header_len: usize,
    pub byte_order: ByteOrder,
    pub primary: MessageRule,
    pub extended1: MessageRule,
    pub extended2: MessageRule,
}

impl Default for WireLayout {
    fn default() -> Self {
        // Tag 0x01 carries the data; 0x00 opens and 0x02 closes a transmission
        Self {
            type_offset: 16,
            header_len: 24,
            byte_order: ByteOrder::LittleEndian,
            primary: MessageRule {
                tag: 0x01,
                min_len: 24,
                max_len: MAX_DATAGRAM_LEN,
            },
            extended1: MessageRule {
                tag: 0x00,
                min_len: 17,
                max_len: MAX_DATAGRAM_LEN,
            },
            extended2: MessageRule {
                tag: 0x02,
                min_len: 17,
                max_len: MAX_DATAGRAM_LEN,
            },
        }
    }
}

impl WireLayout {
    pub fn rule(&self, message: MessageType) -> &MessageRule {
        match message {
            MessageType::Primary => &self.primary,
            MessageType::Extended1 => &self.extended1,
            MessageType::Extended2 => &self.extended2,
        }
    }

    /// Check the layout for overlapping tags and impossible ranges
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let rules = MessageType::ALL.map(|m| (m, *self.rule(m)));
        for (i, (message, rule)) in rules.iter().enumerate() {
            if rule.min_len > rule.max_len || rule.min_len <= self.type_offset {
                return Err(ProtocolError::InvalidLayout(format!(
                    "{} accepts lengths {}..={} but the tag is at offset {}",
                    message, rule.min_len, rule.max_len, self.type_offset
                )));
            }
            if rules[i + 1..].iter().any(|(_, other)| other.tag == rule.tag) {
                return Err(ProtocolError::InvalidLayout(format!(
                    "tag 0x{:02X} is used by more than one message type",
                    rule.tag
                )));
            }
        }
        Ok(())
    }

    /// Identify the message type of a datagram and check its length
    pub fn classify(&self, datagram: &[u8]) -> Result<MessageType, ProtocolError> {
        let tag = *datagram
            .get(self.type_offset)
            .ok_or(ProtocolError::TooShort {
                len: datagram.len(),
                needed: self.type_offset + 1,
            })?;

        let message = MessageType::ALL
            .into_iter()
            .find(|m| self.rule(*m).tag == tag)
            .ok_or(ProtocolError::UnknownMessageType { tag })?;

        let rule = self.rule(message);
        if datagram.len() < rule.min_len || datagram.len() > rule.max_len {
            return Err(ProtocolError::InvalidLength {
                message,
                len: datagram.len(),
                min: rule.min_len,
                max: rule.max_len,
            });
        }
        Ok(message)
    }

    /// Decode the integers following the header
    ///
    /// Trailing bytes that do not form a whole integer are ignored.
    pub fn extract_values(&self, datagram: &[u8]) -> Vec<i32> {
        datagram
            .get(self.header_len..)
            .unwrap_or_default()
            .chunks_exact(4)
            .map(|chunk| self.byte_order.read_i32([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

/// Identity fields at the start of every datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHeader {
    /// MAC address of the controller board
    pub mac: [u8; 6],
    /// Packet counter, incremented by the device for every datagram
    pub counter: u16,
}

impl DeviceHeader {
    pub fn parse(datagram: &[u8]) -> Result<Self, ProtocolError> {
        if datagram.len() < DEVICE_HEADER_LEN {
            return Err(ProtocolError::TooShort {
                len: datagram.len(),
                needed: DEVICE_HEADER_LEN,
            });
        }
        let d = datagram;
        Ok(Self {
            mac: [d[3], d[2], d[1], d[0], d[5], d[4]],
            counter: u16::from_le_bytes([d[6], d[7]]),
        })
    }

    /// MAC address as colon separated lower-case hex
    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Integers extracted from one accepted datagram
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    message: MessageType,
    header: DeviceHeader,
    received_at: DateTime<Utc>,
    values: Vec<i32>,
}

impl RawRecord {
    pub fn new(
        message: MessageType,
        header: DeviceHeader,
        received_at: DateTime<Utc>,
        values: Vec<i32>,
    ) -> Self {
        Self {
            message,
            header,
            received_at,
            values,
        }
    }

    /// Classify a datagram and extract its record
    pub fn parse(
        layout: &WireLayout,
        datagram: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Self, ProtocolError> {
        let message = layout.classify(datagram)?;
        let header = DeviceHeader::parse(datagram)?;
        Ok(Self::new(
            message,
            header,
            received_at,
            layout.extract_values(datagram),
        ))
    }

    pub fn message(&self) -> MessageType {
        self.message
    }

    pub fn header(&self) -> &DeviceHeader {
        &self.header
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn get(&self, offset: usize) -> Option<i32> {
        self.values.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a datagram with the default layout
    pub(crate) fn datagram(tag: u8, counter: u16, values: &[i32]) -> Vec<u8> {
        let mut data = vec![0u8; 24];
        data[..6].copy_from_slice(&[0x44, 0x33, 0x22, 0x11, 0x66, 0x55]);
        data[6..8].copy_from_slice(&counter.to_le_bytes());
        data[8..16].copy_from_slice(&[0x09, 0x09, 0x0C, 0x00, 0x32, 0xDA, 0x00, 0x00]);
        data[16] = tag;
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_classify_default_tags() {
        let layout = WireLayout::default();
        assert_eq!(
            layout.classify(&datagram(0x01, 1, &[1, 2])).unwrap(),
            MessageType::Primary
        );
        assert_eq!(
            layout.classify(&datagram(0x00, 1, &[])).unwrap(),
            MessageType::Extended1
        );
        assert_eq!(
            layout.classify(&datagram(0x02, 1, &[])).unwrap(),
            MessageType::Extended2
        );
    }

    #[test]
    fn test_classify_rejects_unknown_tag() {
        let layout = WireLayout::default();
        let err = layout.classify(&datagram(0x07, 1, &[])).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType { tag: 0x07 }));
    }

    #[test]
    fn test_classify_rejects_bad_length() {
        let layout = WireLayout::default();
        assert!(matches!(
            layout.classify(&[0u8; 10]),
            Err(ProtocolError::TooShort { .. })
        ));

        let oversized = datagram(0x01, 1, &[0; 300]);
        assert!(matches!(
            layout.classify(&oversized),
            Err(ProtocolError::InvalidLength {
                message: MessageType::Primary,
                ..
            })
        ));
    }

    #[test]
    fn test_extract_little_endian_ignores_trailing_bytes() {
        let layout = WireLayout::default();
        let mut data = datagram(0x01, 1, &[235, -12, 0x0102_0304]);
        data.extend_from_slice(&[0xFF, 0xFF]);

        assert_eq!(layout.extract_values(&data), vec![235, -12, 0x0102_0304]);
    }

    #[test]
    fn test_extract_big_endian() {
        let layout = WireLayout {
            byte_order: ByteOrder::BigEndian,
            ..WireLayout::default()
        };
        let mut data = datagram(0x01, 1, &[]);
        data.extend_from_slice(&235i32.to_be_bytes());

        assert_eq!(layout.extract_values(&data), vec![235]);
    }

    #[test]
    fn test_device_header_mac_order() {
        let header = DeviceHeader::parse(&datagram(0x01, 0x1234, &[])).unwrap();
        assert_eq!(header.mac, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(header.mac_string(), "11:22:33:44:55:66");
        assert_eq!(header.counter, 0x1234);
    }

    #[test]
    fn test_validate_layout() {
        assert!(WireLayout::default().validate().is_ok());

        let mut layout = WireLayout::default();
        layout.extended2.tag = layout.primary.tag;
        assert!(matches!(
            layout.validate(),
            Err(ProtocolError::InvalidLayout(_))
        ));

        let mut layout = WireLayout::default();
        layout.primary.min_len = 2000;
        assert!(layout.validate().is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_arbitrary_datagrams_never_panic(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..1100)) {
            let layout = WireLayout::default();
            match RawRecord::parse(&layout, &data, Utc::now()) {
                Ok(record) => {
                    proptest::prop_assert!(data.len() <= MAX_DATAGRAM_LEN);
                    proptest::prop_assert_eq!(record.len(), data.len().saturating_sub(24) / 4);
                }
                Err(_) => {}
            }
        }
    }

    #[test]
    fn test_raw_record_parse() {
        let now = Utc::now();
        let record =
            RawRecord::parse(&WireLayout::default(), &datagram(0x01, 7, &[1, 2, 3]), now).unwrap();

        assert_eq!(record.message(), MessageType::Primary);
        assert_eq!(record.values(), &[1, 2, 3]);
        assert_eq!(record.get(2), Some(3));
        assert_eq!(record.get(3), None);
        assert_eq!(record.header().counter, 7);
        assert_eq!(record.received_at(), now);
    }
}
