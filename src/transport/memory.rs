//! In-memory transport for tests and in-process simulation
//!
//! [`MemoryTransport`] behaves like an unconnected UDP socket backed by
//! unbounded channels. The matching [`MemoryPeer`] plays the controller:
//! it injects inbound datagrams and observes what the robot sends.
//!
//! ```
//! use eyerobot_link::transport::memory::MemoryTransport;
//!
//! let controller = "10.0.0.1:5000".parse().unwrap();
//! let (transport, peer) = MemoryTransport::pair(controller);
//! peer.inject(vec![0x7F]);
//! ```

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::{Transport, shut_down_error};

/// One datagram plus the address on the other end.
pub type Datagram = (Vec<u8>, SocketAddr);

/// Robot-side end of an in-memory link.
#[derive(Debug)]
pub struct MemoryTransport {
    local: SocketAddr,
    inbound: Mutex<mpsc::UnboundedReceiver<Datagram>>,
    outbound: mpsc::UnboundedSender<Datagram>,
    closed: CancellationToken,
}

/// Controller-side end of an in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    addr: SocketAddr,
    to_robot: mpsc::UnboundedSender<Datagram>,
    from_robot: mpsc::UnboundedReceiver<Datagram>,
}

impl MemoryTransport {
    /// Create a transport and the peer that sits at `peer_addr`.
    pub fn pair(peer_addr: SocketAddr) -> (Self, MemoryPeer) {
        let (to_robot, inbound) = mpsc::unbounded_channel();
        let (outbound, from_robot) = mpsc::unbounded_channel();

        let transport = Self {
            local: SocketAddr::from(([127, 0, 0, 1], 0)),
            inbound: Mutex::new(inbound),
            outbound,
            closed: CancellationToken::new(),
        };
        let peer = MemoryPeer { addr: peer_addr, to_robot, from_robot };

        (transport, peer)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.closed.is_cancelled() {
            return Err(shut_down_error());
        }
        // A vanished peer is indistinguishable from packet loss
        let _ = self.outbound.send((datagram.to_vec(), target));
        Ok(datagram.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut inbound = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Ok(None),
            guard = self.inbound.lock() => guard,
        };

        let next = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Ok(None),
            next = inbound.recv() => next,
        };

        Ok(next.map(|(bytes, from)| {
            let len = bytes.len().min(buf.len());
            buf[..len].copy_from_slice(&bytes[..len]);
            (len, from)
        }))
    }

    fn shutdown(&self) {
        self.closed.cancel();
    }

    fn is_shut_down(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}

impl MemoryPeer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Deliver a datagram to the robot as if sent from this peer.
    ///
    /// Returns `false` once the robot side has been dropped.
    pub fn inject(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.inject_from(bytes, self.addr)
    }

    /// Deliver a datagram that appears to come from `from`.
    pub fn inject_from(&self, bytes: impl Into<Vec<u8>>, from: SocketAddr) -> bool {
        self.to_robot.send((bytes.into(), from)).is_ok()
    }

    /// Wait for the next datagram the robot sent.
    pub async fn next_sent(&mut self) -> Option<Datagram> {
        self.from_robot.recv().await
    }

    /// Take a sent datagram if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<Datagram> {
        self.from_robot.try_recv().ok()
    }
}
