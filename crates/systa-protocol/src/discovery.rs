//! Device Discovery
//!
//! Finds a SystaComfort unit on the local network through the broadcast
//! protocol used by the vendor's touch display app, then asks the unit for
//! the port and password of that app.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::{ProtocolError, MAX_DATAGRAM_LEN};

/// Port the units listen on for discovery broadcasts
pub const DISCOVERY_PORT: u16 = 8001;

const SEARCH_MESSAGE: &str = "0 1 A";

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub broadcast: Ipv4Addr,
    pub port: u16,
    /// Wait per request/reply exchange
    pub timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast: Ipv4Addr::BROADCAST,
            port: DISCOVERY_PORT,
            timeout_ms: 1000,
        }
    }
}

/// Information announced by a unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Reply string as received
    pub info_string: String,
    pub unit_ip: String,
    pub unit_name: String,
    pub unit_id: String,
    pub unit_app: u32,
    pub unit_platform: u32,
    pub unit_major: u32,
    pub unit_minor: u32,
    pub unit_version: String,
    pub unit_base_version: String,
    pub unit_mac: String,
    pub broadcast_ip: String,
    pub broadcast_port: u16,
    /// Port of the touch app protocol, if the unit has it enabled
    pub touch_port: Option<u16>,
    pub touch_password: Option<String>,
    pub touch_supported: bool,
}

fn hex_field(id: &str, range: std::ops::Range<usize>) -> Result<u32, ProtocolError> {
    let digits = id
        .get(range)
        .ok_or_else(|| ProtocolError::MalformedReply(format!("unit id {} too short", id)))?;
    u32::from_str_radix(digits, 16)
        .map_err(|_| ProtocolError::MalformedReply(format!("unit id {} is not hex", id)))
}

/// Parse the answer to the search broadcast
///
/// Expected form: `SC2 1 <ip> <mask> <gateway> <name> <id> 0 <version> <base> <mac>`
pub fn parse_search_reply(reply: &str) -> Result<DeviceInfo, ProtocolError> {
    let reply = reply.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    let tokens: Vec<&str> = reply.split(' ').collect();
    if tokens.len() != 11 {
        return Err(ProtocolError::MalformedReply(format!(
            "expected 11 tokens, got {}",
            tokens.len()
        )));
    }

    let mut info = DeviceInfo {
        info_string: reply.to_string(),
        unit_ip: tokens[2].to_string(),
        unit_name: tokens[5].trim_end_matches('\0').replace('\0', ""),
        unit_id: tokens[6].to_string(),
        unit_base_version: tokens[9].to_string(),
        unit_mac: tokens[10].to_string(),
        ..DeviceInfo::default()
    };

    let id = tokens[6];
    if id.len() == 10 {
        info.unit_app = hex_field(id, 0..2)?;
        info.unit_platform = hex_field(id, 2..4)?;
        // Major version bytes are sent low byte first
        info.unit_major = (hex_field(id, 6..8)? << 8) | hex_field(id, 4..6)?;
        info.unit_minor = hex_field(id, 8..10)?;
        info.unit_version = format!("{}.{}", f64::from(info.unit_major) / 100.0, info.unit_minor);
    }
    Ok(info)
}

/// Parse the answer to a port request, `None` if the unit has no port set
pub fn parse_port_reply(reply: &str) -> Result<Option<u16>, ProtocolError> {
    let cleaned: String = reply
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    if cleaned.to_lowercase().contains("unknown value") {
        return Ok(None);
    }
    cleaned
        .split_whitespace()
        .nth(2)
        .and_then(|port| port.parse().ok())
        .map(Some)
        .ok_or_else(|| ProtocolError::MalformedReply(format!("no port in {:?}", reply)))
}

/// Parse the answer to a password request
pub fn parse_password_reply(reply: &str) -> Result<String, ProtocolError> {
    reply
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .split(' ')
        .nth(2)
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::MalformedReply(format!("no password in {:?}", reply)))
}

pub fn port_request(mac: &str) -> String {
    format!("{} 6 A R DISP Port", mac)
}

pub fn password_request(mac: &str) -> String {
    format!("{} 6 R UDP Pass", mac)
}

/// Broadcast discovery client
pub struct DeviceSearch {
    config: DiscoveryConfig,
}

impl DeviceSearch {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Search the network, `None` if no unit answers
    pub async fn search(&self) -> Result<Option<DeviceInfo>, ProtocolError> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        let target = SocketAddr::V4(SocketAddrV4::new(self.config.broadcast, self.config.port));

        info!("Searching for SystaComfort units via {}", target);
        let reply = match self.exchange(&socket, target, SEARCH_MESSAGE).await? {
            Some(reply) => reply,
            None => {
                info!("No SystaComfort unit answered the search");
                return Ok(None);
            }
        };

        let mut info = parse_search_reply(&reply)?;
        info.broadcast_ip = self.config.broadcast.to_string();
        info.broadcast_port = self.config.port;
        info!("Found unit {} at {}", info.unit_name, info.unit_ip);

        let port_reply = self
            .exchange(&socket, target, &port_request(&info.unit_mac))
            .await?;
        info.touch_port = match port_reply {
            Some(reply) => parse_port_reply(&reply).unwrap_or_else(|e| {
                warn!("Ignoring port reply: {}", e);
                None
            }),
            None => None,
        };

        if info.touch_port.is_some() {
            if let Some(reply) = self
                .exchange(&socket, target, &password_request(&info.unit_mac))
                .await?
            {
                match parse_password_reply(&reply) {
                    Ok(password) => {
                        info.touch_password = Some(password);
                        info.touch_supported = true;
                    }
                    Err(e) => warn!("Ignoring password reply: {}", e),
                }
            }
        }

        Ok(Some(info))
    }

    async fn exchange(
        &self,
        socket: &UdpSocket,
        target: SocketAddr,
        message: &str,
    ) -> Result<Option<String>, ProtocolError> {
        debug!("Discovery request: {}", message);
        socket.send_to(message.as_bytes(), target).await?;

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, peer))) => {
                // Replies are ISO-8859-1, every byte maps to the same code point
                let reply: String = buf[..len].iter().map(|b| char::from(*b)).collect();
                debug!("Discovery reply from {}: {}", peer, reply.trim());
                Ok(Some(reply))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_REPLY: &str = "SC2 1 192.168.11.23 255.255.255.0 192.168.11.1 SystaComfort-II0\0 0809720001 0 V0.34 V1.00 2CBE9700BEE9";

    #[test]
    fn test_parse_search_reply() {
        let info = parse_search_reply(SEARCH_REPLY).unwrap();

        assert_eq!(info.unit_ip, "192.168.11.23");
        assert_eq!(info.unit_name, "SystaComfort-II0");
        assert_eq!(info.unit_id, "0809720001");
        assert_eq!(info.unit_app, 8);
        assert_eq!(info.unit_platform, 9);
        assert_eq!(info.unit_major, 114);
        assert_eq!(info.unit_minor, 1);
        assert_eq!(info.unit_version, "1.14.1");
        assert_eq!(info.unit_base_version, "V1.00");
        assert_eq!(info.unit_mac, "2CBE9700BEE9");
    }

    #[test]
    fn test_parse_search_reply_wrong_token_count() {
        assert!(parse_search_reply("SC2 1 192.168.11.23").is_err());
    }

    #[test]
    fn test_parse_port_reply() {
        assert_eq!(parse_port_reply("0 7 3477\0").unwrap(), Some(3477));
        assert_eq!(
            parse_port_reply("0 7 unknown value:Uremoteportalde").unwrap(),
            None
        );
        assert!(parse_port_reply("0 7").is_err());
    }

    #[test]
    fn test_parse_password_reply() {
        assert_eq!(parse_password_reply("0 8 1234\n").unwrap(), "1234");
        assert!(parse_password_reply("0").is_err());
    }

    #[test]
    fn test_request_messages() {
        assert_eq!(port_request("2CBE9700BEE9"), "2CBE9700BEE9 6 A R DISP Port");
        assert_eq!(password_request("2CBE9700BEE9"), "2CBE9700BEE9 6 R UDP Pass");
    }

    #[tokio::test]
    async fn test_search_against_local_responder() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = responder.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            for reply in [SEARCH_REPLY, "0 7 3477", "0 8 secret"] {
                let (_, peer) = responder.recv_from(&mut buf).await.unwrap();
                responder.send_to(reply.as_bytes(), peer).await.unwrap();
            }
        });

        let search = DeviceSearch::new(DiscoveryConfig {
            broadcast: Ipv4Addr::LOCALHOST,
            port,
            timeout_ms: 1000,
        });
        let info = search.search().await.unwrap().unwrap();

        assert_eq!(info.unit_name, "SystaComfort-II0");
        assert_eq!(info.touch_port, Some(3477));
        assert_eq!(info.touch_password.as_deref(), Some("secret"));
        assert!(info.touch_supported);
    }

    #[tokio::test]
    async fn test_search_without_answer() {
        // Bound but silent
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let search = DeviceSearch::new(DiscoveryConfig {
            broadcast: Ipv4Addr::LOCALHOST,
            port: silent.local_addr().unwrap().port(),
            timeout_ms: 50,
        });

        assert!(search.search().await.unwrap().is_none());
    }
}
