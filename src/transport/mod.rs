//! Datagram transport abstraction.
//!
//! The connection never touches a socket directly. It talks to a
//! [`Transport`], which lets the receive loop run against a real UDP socket
//! ([`UdpTransport`]) or an in-process channel pair
//! ([`memory::MemoryTransport`]) without changing a line.
//!
//! # Shutdown
//!
//! [`Transport::shutdown`] is how `disconnect()` unblocks the receive task.
//! After it returns, every pending and future `recv_from` resolves to
//! `Ok(None)` and every `send_to` fails with
//! [`std::io::ErrorKind::NotConnected`]. A socket-backed transport also
//! gives up its port. Calling it more than once is a no-op.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

pub mod memory;
mod udp;

pub use udp::UdpTransport;

/// Unreliable, unordered datagram transport shared by the send path and the
/// receive task.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram. Returns once the datagram is handed to the
    /// transport; delivery is never confirmed.
    async fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Wait for the next datagram.
    ///
    /// Returns:
    /// - `Ok(Some((len, from)))` - `len` bytes written to `buf`; datagrams
    ///   longer than `buf` are cut to fit
    /// - `Ok(None)` - the transport has been shut down
    /// - `Err(e)` - receive failed; the transport is still usable
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    /// Close the transport in both directions. Idempotent.
    fn shutdown(&self);

    fn is_shut_down(&self) -> bool;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

pub(crate) fn shut_down_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport has been shut down")
}
