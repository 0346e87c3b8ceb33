//! UDP socket binding

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Transport, shut_down_error};
use crate::{LinkError, Result};

/// Unconnected UDP socket.
///
/// Datagrams go out with `send_to` to the controller endpoint and are
/// accepted from any source, so a controller that answers from a different
/// port still reaches the robot. An unconnected UDP socket has no half-close
/// of its own: shutdown cancels a token to wake a pending receive and drops
/// the socket. The port is released once the last in-flight send or receive
/// returns.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    local: SocketAddr,
    closed: CancellationToken,
}

impl UdpTransport {
    /// Bind a socket on `addr`. Fails with [`LinkError::TransportInit`].
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket =
            UdpSocket::bind(addr).await.map_err(|source| LinkError::transport_init(addr, source))?;
        let local = socket.local_addr().map_err(|source| LinkError::transport_init(addr, source))?;
        info!(%local, "UDP transport bound");

        Ok(Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            local,
            closed: CancellationToken::new(),
        })
    }

    /// Handle to the open socket, `None` after shutdown.
    fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        match self.socket() {
            Some(socket) if !self.closed.is_cancelled() => socket.send_to(datagram, target).await,
            _ => Err(shut_down_error()),
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let Some(socket) = self.socket() else {
            return Ok(None);
        };
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Ok(None),
            result = socket.recv_from(buf) => result.map(Some),
        }
    }

    fn shutdown(&self) {
        if !self.closed.is_cancelled() {
            debug!("Shutting down UDP transport");
            self.closed.cancel();
        }
        self.socket.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn is_shut_down(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Address the socket was bound to. Still reported after shutdown.
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn datagrams_cross_loopback() {
        let a = UdpTransport::bind(loopback()).await.unwrap();
        let b = UdpTransport::bind(loopback()).await.unwrap();

        a.send_to(&[0x03, 1, 2], b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), b.recv_from(&mut buf))
            .await
            .expect("datagram within timeout")
            .unwrap()
            .expect("transport open");
        assert_eq!(&buf[..len], &[0x03, 1, 2]);
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn shutdown_unblocks_pending_receive() {
        let transport = std::sync::Arc::new(UdpTransport::bind(loopback()).await.unwrap());

        let receiver = std::sync::Arc::clone(&transport);
        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            receiver.recv_from(&mut buf).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.shutdown();
        transport.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("receive returns after shutdown")
            .unwrap();
        assert!(matches!(result, Ok(None)));
        assert!(transport.is_shut_down());

        let err = transport.send_to(&[0], loopback()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn shutdown_frees_the_port_while_shared() {
        let transport = std::sync::Arc::new(UdpTransport::bind(loopback()).await.unwrap());
        let still_held = std::sync::Arc::clone(&transport);
        let local = transport.local_addr().unwrap();

        transport.shutdown();

        let rebound = UdpTransport::bind(local).await.unwrap();
        assert_eq!(rebound.local_addr().unwrap(), local);
        assert_eq!(still_held.local_addr().unwrap(), local);

        let mut buf = [0u8; 4];
        assert!(matches!(still_held.recv_from(&mut buf).await, Ok(None)));
    }

    #[tokio::test]
    async fn bind_failure_is_transport_init() {
        let first = UdpTransport::bind(loopback()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = UdpTransport::bind(taken).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, LinkError::TransportInit { addr, .. } if addr == taken));
    }
}
