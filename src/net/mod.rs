//! # Network Module
//!
//! UDP transport for control frames.
//!
//! Clients fire one datagram per frame at the server with no acknowledgement;
//! loss and reordering are tolerated because every frame carries the complete
//! state. The server batches whatever arrives within each window.

pub mod aggregator;

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, info};

use crate::error::Result;
use aggregator::AggregationWindow;

/// Receive buffer size. Longer datagrams are truncated and fail to decode.
pub const RECV_BUFFER_SIZE: usize = 64;

/// Sending side, bound to an ephemeral local port.
pub struct FrameSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl FrameSender {
    /// Bind an ephemeral socket that sends to `target`
    ///
    /// # Errors
    ///
    /// Returns `Io` if the local socket cannot be bound.
    pub async fn bind(target: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await?;
        info!("Sending frames from {} to {}", socket.local_addr()?, target);
        Ok(Self { socket, target })
    }

    /// Send one encoded frame
    ///
    /// # Errors
    ///
    /// Returns `Io` if the datagram cannot be sent.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        self.socket.send_to(frame, self.target).await?;
        Ok(())
    }

    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

/// Receiving side, bound to the listen address.
pub struct FrameReceiver {
    socket: UdpSocket,
    buf: [u8; RECV_BUFFER_SIZE],
}

impl FrameReceiver {
    /// Bind the listening socket
    ///
    /// # Errors
    ///
    /// Returns `Io` if the address cannot be bound (e.g. port in use).
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Listening for frames on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            buf: [0; RECV_BUFFER_SIZE],
        })
    }

    /// Address the socket is bound to
    ///
    /// # Errors
    ///
    /// Returns `Io` if the address cannot be queried.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Collects every datagram arriving within `window` from now.
    ///
    /// The window is measured from the call, so time spent by the caller
    /// between windows is not counted.
    ///
    /// # Errors
    ///
    /// Returns `Io` if receiving fails.
    pub async fn collect_window(&mut self, window: Duration) -> Result<AggregationWindow> {
        let deadline = Instant::now() + window;
        let mut collected = AggregationWindow::new();

        loop {
            match timeout_at(deadline, self.socket.recv_from(&mut self.buf)).await {
                Err(_) => return Ok(collected),
                Ok(Ok((len, sender))) => collected.push_datagram(&self.buf[..len], sender),
                Ok(Err(e)) => {
                    debug!("Receive failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encoder::encode_frame;
    use crate::wire::protocol::ControlState;

    async fn loopback_pair() -> (FrameSender, FrameReceiver) {
        let receiver = FrameReceiver::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let sender = FrameSender::bind(receiver.local_addr().unwrap())
            .await
            .unwrap();
        (sender, receiver)
    }

    #[tokio::test]
    async fn test_collect_window_averages_frames() {
        let (sender, mut receiver) = loopback_pair().await;

        sender.send(&encode_frame(&ControlState::new(0, 0, 0))).await.unwrap();
        sender.send(&encode_frame(&ControlState::new(65535, 0, 0))).await.unwrap();

        let window = receiver
            .collect_window(Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(window.frame_count(), 2);
        assert_eq!(window.sender_count(), 1);
        assert_eq!(window.reduce().unwrap().steer(), 32767);
    }

    #[tokio::test]
    async fn test_collect_window_counts_malformed_datagrams() {
        let (sender, mut receiver) = loopback_pair().await;

        sender.send(b"S8000T00").await.unwrap();
        sender.send(b"S8000T0000B0000").await.unwrap();

        let window = receiver
            .collect_window(Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(window.frame_count(), 1);
        assert_eq!(window.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_dropped() {
        let (sender, mut receiver) = loopback_pair().await;

        let oversized = "S8000".repeat(20);
        sender.send(oversized.as_bytes()).await.unwrap();

        let window = receiver
            .collect_window(Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(window.frame_count(), 0);
        assert_eq!(window.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_window_times_out() {
        let (_sender, mut receiver) = loopback_pair().await;

        let start = Instant::now();
        let window = receiver
            .collect_window(Duration::from_millis(20))
            .await
            .unwrap();

        assert!(window.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
