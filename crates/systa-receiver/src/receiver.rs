//! UDP Receive Loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{ReceiverConfig, ReceiverContext, ReceiverError};

/// Pause after a failed socket read before trying again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Starts receive loops
pub struct Receiver;

impl Receiver {
    /// Bind the listening socket and spawn the receive loop
    ///
    /// Binding happens before this returns, so an unusable address is
    /// reported to the caller instead of the background task.
    pub async fn spawn(
        config: &ReceiverConfig,
        ctx: Arc<ReceiverContext>,
    ) -> Result<ReceiverHandle, ReceiverError> {
        let socket = UdpSocket::bind(config.listen_addr)
            .await
            .map_err(|e| ReceiverError::Bind {
                addr: config.listen_addr,
                reason: e.to_string(),
            })?;
        let local_addr = socket.local_addr().map_err(|e| ReceiverError::Bind {
            addr: config.listen_addr,
            reason: e.to_string(),
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(
            socket,
            ctx,
            config.max_datagram_len.max(1),
            shutdown_rx,
        ));

        info!("Listening for SystaComfort datagrams on {}", local_addr);
        Ok(ReceiverHandle {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle to a running receive loop
#[derive(Debug)]
pub struct ReceiverHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReceiverHandle {
    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop and wait for it to release the socket
    pub async fn stop(self) -> Result<(), ReceiverError> {
        // Fails only if the loop already exited
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| ReceiverError::Task(e.to_string()))
    }
}

async fn run(
    socket: UdpSocket,
    ctx: Arc<ReceiverContext>,
    max_len: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    // One spare byte tells an oversized datagram from one that fits exactly
    let mut buf = vec![0u8; max_len + 1];

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    let received_at = Utc::now();
                    if len > max_len {
                        ctx.reject_oversized(&buf[..len], max_len, peer, received_at);
                        continue;
                    }
                    let Some(reply) = ctx.handle_datagram(&buf[..len], peer, received_at) else {
                        continue;
                    };
                    match socket.send_to(&reply, peer).await {
                        Ok(_) => {
                            ctx.counters().record_reply_sent();
                            debug!("Sent {} byte reply to {}", reply.len(), peer);
                        }
                        Err(e) => {
                            ctx.counters().record_reply_failure();
                            warn!("Failed to send reply to {}: {}", peer, e);
                        }
                    }
                }
                Err(e) => {
                    ctx.counters().record_receive_error();
                    error!("Receive error: {}", e);
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            }
        }
    }

    info!("Receive loop on {:?} stopped", socket.local_addr().ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{datagram, primary};
    use ring_buffer::SharedRingBuffer;
    use systa_protocol::index::names;
    use systa_protocol::FieldIndexTable;

    fn local_config() -> ReceiverConfig {
        ReceiverConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ..ReceiverConfig::default()
        }
    }

    fn context(config: &ReceiverConfig) -> Arc<ReceiverContext> {
        Arc::new(
            ReceiverContext::new(
                config,
                Arc::new(FieldIndexTable::systa_comfort()),
                SharedRingBuffer::new(16, true),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_receive_decode_and_reply() {
        let config = local_config();
        let ctx = context(&config);
        let handle = Receiver::spawn(&config, Arc::clone(&ctx)).await.unwrap();

        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        device
            .send_to(&primary(555), handle.local_addr())
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), device.recv_from(&mut buf))
            .await
            .expect("reply within timeout")
            .unwrap();
        assert_eq!(from, handle.local_addr());
        assert_eq!(len, 20);
        assert_eq!(&buf[..8], &primary(555)[..8]);

        assert_eq!(ctx.snapshot().number(names::HOT_WATER_TEMP), Some(55.5));
        assert_eq!(ctx.peer(), Some(device.local_addr().unwrap()));
        assert_eq!(ctx.counters().snapshot().replies_sent, 1);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_datagram_gets_no_reply() {
        let config = local_config();
        let ctx = context(&config);
        let handle = Receiver::spawn(&config, Arc::clone(&ctx)).await.unwrap();

        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        device
            .send_to(&datagram(0x42, 1, &[]), handle.local_addr())
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let reply =
            tokio::time::timeout(Duration::from_millis(200), device.recv_from(&mut buf)).await;
        assert!(reply.is_err());
        assert_eq!(ctx.counters().snapshot().dropped_unknown_type, 1);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_dropped() {
        let config = local_config();
        let ctx = context(&config);
        let handle = Receiver::spawn(&config, Arc::clone(&ctx)).await.unwrap();

        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let oversized = datagram(0x01, 1, &[7; 300]);
        assert_eq!(oversized.len(), 1224);
        device
            .send_to(&oversized, handle.local_addr())
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let reply =
            tokio::time::timeout(Duration::from_millis(200), device.recv_from(&mut buf)).await;
        assert!(reply.is_err());

        let counters = ctx.counters().snapshot();
        assert_eq!(counters.packets_received, 1);
        assert_eq!(counters.dropped_bad_length, 1);
        assert_eq!(counters.primary_received, 0);
        assert!(ctx.snapshot().is_empty());
        assert!(ctx.latest_raw().is_none());

        // A datagram of exactly the maximum length still fits
        let mut full = primary(600);
        full.resize(config.max_datagram_len, 0);
        device.send_to(&full, handle.local_addr()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), device.recv_from(&mut buf))
            .await
            .expect("reply within timeout")
            .unwrap();
        assert_eq!(ctx.counters().snapshot().primary_received, 1);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_returns_promptly_without_traffic() {
        let config = local_config();
        let handle = Receiver::spawn(&config, context(&config)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop does not wait for a datagram")
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let occupied = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ReceiverConfig {
            listen_addr: occupied.local_addr().unwrap(),
            ..ReceiverConfig::default()
        };

        let result = Receiver::spawn(&config, context(&config)).await;
        assert!(matches!(result, Err(ReceiverError::Bind { .. })));
    }
}
