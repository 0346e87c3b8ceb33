//! Robot-side connection to the controller.
//!
//! A [`Connection`] moves through four states:
//!
//! ```text
//! Created ──connect()──▶ Connecting ──session sent──▶ Connected
//!    │                                                    │
//!    └──────────────────disconnect() / drop───────────────┴──▶ Disconnected
//! ```
//!
//! `connect()` spawns the receive task and announces the session. The
//! announcement is fire-and-forget: no acknowledgement exists in the
//! protocol, so a controller that never answers looks exactly like one that
//! has nothing to say yet.
//!
//! While connected, telemetry goes out through [`Connection::send_info`] (or
//! a cloned [`InfoSender`]) and commands come in on the receive task, which
//! filters them through the shared [`Sequencer`] and hands accepted ones to
//! the [`CommandHandler`].
//!
//! `disconnect()` shuts the transport down, which unblocks the receive task,
//! and waits for it to finish. Dropping the connection does the same without
//! waiting.

use futures::Stream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::handler::CommandHandler;
use crate::packet::{InfoPacket, SessionPacket};
use crate::sequencer::Sequencer;
use crate::transport::{Transport, UdpTransport};
use crate::types::{InfoSample, PacketNumber};
use crate::{LinkError, Result};

mod receiver;

pub use receiver::ReceiveStats;
use receiver::ReceiveLoop;

/// Extra time given to the receive task beyond one read timeout.
const JOIN_GRACE: Duration = Duration::from_millis(250);

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport allocated, nothing sent
    Created,
    /// Receive task running, session announcement in flight
    Connecting,
    /// Session announced; telemetry may be sent
    Connected,
    /// Terminal
    Disconnected,
}

/// Controller endpoint and the identity announced to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    remote: SocketAddr,
    announcement: SessionPacket,
}

impl Session {
    pub fn new(remote: SocketAddr, identifier: impl Into<String>) -> Result<Self> {
        Ok(Self { remote, announcement: SessionPacket::new(identifier)? })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn identifier(&self) -> &str {
        self.announcement.identifier()
    }
}

/// Connection to a single controller over a [`Transport`].
pub struct Connection<T: Transport = UdpTransport> {
    transport: Arc<T>,
    session: Session,
    sequencer: Arc<Sequencer>,
    handler: Arc<dyn CommandHandler>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    receiver: Option<JoinHandle<ReceiveStats>>,
    recv_buffer_size: usize,
    read_timeout: Duration,
}

impl Connection<UdpTransport> {
    /// Bind a UDP socket per `config` and create a connection in the
    /// `Created` state.
    ///
    /// # Errors
    ///
    /// - [`LinkError::Config`] if `config` fails validation
    /// - [`LinkError::TransportInit`] if the socket cannot be bound
    pub async fn bind(config: &ClientConfig, handler: impl CommandHandler) -> Result<Self> {
        config.validate()?;
        let transport = UdpTransport::bind(config.bind_addr).await?;
        Self::with_transport(transport, config, handler)
    }
}

impl<T: Transport> Connection<T> {
    /// Create a connection over an existing transport.
    pub fn with_transport(
        transport: T,
        config: &ClientConfig,
        handler: impl CommandHandler,
    ) -> Result<Self> {
        config.validate()?;
        let session = Session::new(config.remote_addr(), config.name.clone())?;
        let (state, _) = watch::channel(ConnectionState::Created);

        Ok(Self {
            transport: Arc::new(transport),
            session,
            sequencer: Arc::new(Sequencer::new()),
            handler: Arc::new(handler),
            state,
            cancel: CancellationToken::new(),
            receiver: None,
            recv_buffer_size: config.recv_buffer_size,
            read_timeout: config.read_timeout(),
        })
    }

    /// Start the receive task and announce the session.
    ///
    /// Calling this on a connection that is already connecting or connected
    /// does nothing.
    ///
    /// # Errors
    ///
    /// - [`LinkError::NotConnected`] if the connection was disconnected
    /// - [`LinkError::Transport`] if the session packet could not be handed
    ///   to the transport; the connection is disconnected in that case
    pub async fn connect(&mut self) -> Result<()> {
        match self.state() {
            ConnectionState::Created => {}
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!("connect() called on an active connection");
                return Ok(());
            }
            state @ ConnectionState::Disconnected => {
                return Err(LinkError::NotConnected { state });
            }
        }

        info!(
            remote = %self.session.remote(),
            name = self.session.identifier(),
            "Connecting to controller"
        );
        self.state.send_replace(ConnectionState::Connecting);

        let receive_loop = ReceiveLoop::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.sequencer),
            Arc::clone(&self.handler),
            self.cancel.child_token(),
            self.recv_buffer_size,
            self.read_timeout,
        );
        self.receiver = Some(receive_loop.spawn());

        let announcement = self.session.announcement.encode();
        if let Err(source) = self.transport.send_to(&announcement, self.session.remote()).await {
            error!("Failed to send session packet: {}", source);
            self.disconnect().await;
            return Err(LinkError::transport("session announcement", source));
        }

        self.state.send_replace(ConnectionState::Connected);
        info!(bytes = announcement.len(), "Session announced");
        Ok(())
    }

    /// Send one telemetry report stamped with the current packet number.
    ///
    /// # Errors
    ///
    /// - [`LinkError::NotConnected`] outside the `Connected` state
    /// - [`LinkError::Transport`] if the transport refuses the datagram
    pub async fn send_info(&self, sample: &InfoSample) -> Result<PacketNumber> {
        self.info_sender().send(sample).await
    }

    /// Send one telemetry report with a caller-chosen packet number.
    ///
    /// The number goes through the sequencer first, so it fails with
    /// [`LinkError::StalePacket`] if it is older than the tracked value.
    pub async fn send_info_numbered(&self, number: PacketNumber, sample: &InfoSample) -> Result<()> {
        self.info_sender().send_numbered(number, sample).await
    }

    /// Stop the receive task and close the transport.
    ///
    /// Returns the receive task's counters the first time it is called on a
    /// connection that was connected, and `None` otherwise. Never fails.
    pub async fn disconnect(&mut self) -> Option<ReceiveStats> {
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if previous == ConnectionState::Disconnected {
            debug!("disconnect() called on a disconnected connection");
            return None;
        }

        info!("Disconnecting from controller");
        self.cancel.cancel();
        self.transport.shutdown();

        let handle = self.receiver.take()?;
        let abort = handle.abort_handle();
        match tokio::time::timeout(self.read_timeout + JOIN_GRACE, handle).await {
            Ok(Ok(stats)) => {
                info!(
                    datagrams = stats.datagrams,
                    commands = stats.commands,
                    stale = stats.stale,
                    "Receive task stopped"
                );
                Some(stats)
            }
            Ok(Err(join_error)) => {
                error!("Receive task failed: {}", join_error);
                None
            }
            Err(_) => {
                // Only a handler that never returns can hold the task this long
                warn!("Receive task did not stop in time, aborting");
                abort.abort();
                None
            }
        }
    }

    /// Cloneable handle for sending telemetry from another task.
    pub fn info_sender(&self) -> InfoSender<T> {
        InfoSender {
            transport: Arc::clone(&self.transport),
            remote: self.session.remote(),
            sequencer: Arc::clone(&self.sequencer),
            state: self.state.subscribe(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current state followed by every later transition.
    pub fn state_changes(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.state.subscribe())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Highest packet number accepted or stamped so far.
    pub fn last_packet_number(&self) -> PacketNumber {
        self.sequencer.current()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr().map_err(|e| LinkError::transport("local_addr", e))
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session)
            .field("state", &self.state())
            .field("last_packet_number", &self.last_packet_number())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        debug!("Dropping connection");
        // Release the socket and stop the receive task on every exit path
        self.state.send_replace(ConnectionState::Disconnected);
        self.cancel.cancel();
        self.transport.shutdown();
    }
}

/// Telemetry send path, detached from the [`Connection`] that created it.
///
/// Sends fail with [`LinkError::NotConnected`] once the connection leaves the
/// `Connected` state, including after it is dropped.
pub struct InfoSender<T: Transport = UdpTransport> {
    transport: Arc<T>,
    remote: SocketAddr,
    sequencer: Arc<Sequencer>,
    state: watch::Receiver<ConnectionState>,
}

impl<T: Transport> Clone for InfoSender<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            remote: self.remote,
            sequencer: Arc::clone(&self.sequencer),
            state: self.state.clone(),
        }
    }
}

impl<T: Transport> InfoSender<T> {
    /// Send `sample` stamped with the tracked packet number, which is
    /// returned. The number is not advanced.
    pub async fn send(&self, sample: &InfoSample) -> Result<PacketNumber> {
        self.ensure_connected()?;
        let number = self.sequencer.current();
        self.transmit(InfoPacket::new(number, *sample)).await?;
        Ok(number)
    }

    /// Send `sample` stamped with `number` after passing it through the
    /// sequencer.
    pub async fn send_numbered(&self, number: PacketNumber, sample: &InfoSample) -> Result<()> {
        self.ensure_connected()?;
        self.sequencer.check(number)?;
        self.transmit(InfoPacket::new(number, *sample)).await
    }

    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    /// Wait until the connection leaves `Connected` (or is dropped).
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // An Err means the connection is gone, which also counts as closed
        let _ = state.wait_for(|s| *s == ConnectionState::Disconnected).await;
    }

    fn ensure_connected(&self) -> Result<()> {
        match *self.state.borrow() {
            ConnectionState::Connected => Ok(()),
            state => Err(LinkError::NotConnected { state }),
        }
    }

    async fn transmit(&self, packet: InfoPacket) -> Result<()> {
        let datagram = packet.encode()?;
        self.transport
            .send_to(&datagram, self.remote)
            .await
            .map_err(|e| LinkError::transport("send_info", e))?;
        tracing::trace!(number = packet.number, "Info packet sent");
        Ok(())
    }
}
