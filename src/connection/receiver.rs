//! Receive task: reads datagrams, filters commands, invokes the handler.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::handler::CommandHandler;
use crate::packet::Packet;
use crate::sequencer::Sequencer;
use crate::transport::Transport;
use crate::types::Command;
use crate::{LinkError, Result};

/// Counters kept by the receive task, returned from
/// [`Connection::disconnect`](super::Connection::disconnect).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Datagrams read from the transport
    pub datagrams: u64,
    /// Commands accepted and handed to the handler
    pub commands: u64,
    /// Commands dropped for carrying an old packet number
    pub stale: u64,
    /// Datagrams with an opcode the protocol does not define
    pub unknown: u64,
    /// Empty or truncated datagrams
    pub truncated: u64,
    /// Valid packets that only flow robot to controller
    pub unexpected: u64,
    /// Receive errors reported by the transport
    pub transport_errors: u64,
}

impl ReceiveStats {
    fn record_rejection(&mut self, err: &LinkError) {
        match err {
            LinkError::StalePacket { .. } => self.stale += 1,
            LinkError::UnknownOpcode { .. } => self.unknown += 1,
            LinkError::EmptyDatagram | LinkError::Truncated { .. } => self.truncated += 1,
            LinkError::UnexpectedPacket { .. } | LinkError::MalformedSession { .. } => {
                self.unexpected += 1
            }
            _ => {}
        }
    }
}

pub(super) struct ReceiveLoop<T> {
    transport: Arc<T>,
    sequencer: Arc<Sequencer>,
    handler: Arc<dyn CommandHandler>,
    cancel: CancellationToken,
    buffer_size: usize,
    read_timeout: Duration,
}

impl<T: Transport> ReceiveLoop<T> {
    pub(super) fn new(
        transport: Arc<T>,
        sequencer: Arc<Sequencer>,
        handler: Arc<dyn CommandHandler>,
        cancel: CancellationToken,
        buffer_size: usize,
        read_timeout: Duration,
    ) -> Self {
        Self { transport, sequencer, handler, cancel, buffer_size, read_timeout }
    }

    pub(super) fn spawn(self) -> JoinHandle<ReceiveStats> {
        tokio::spawn(self.run())
    }

    async fn run(self) -> ReceiveStats {
        info!("Receive task started");
        let mut buf = vec![0u8; self.buffer_size];
        let mut stats = ReceiveStats::default();
        let mut error_streak = 0u32;

        loop {
            if self.cancel.is_cancelled() || self.transport.is_shut_down() {
                debug!("Receive task cancelled");
                break;
            }

            // The timeout only bounds how long one wait can run; elapsing is not an error
            let received = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Receive task cancelled during read");
                    break;
                }
                received = tokio::time::timeout(self.read_timeout, self.transport.recv_from(&mut buf)) => received,
            };

            match received {
                Err(_elapsed) => continue,
                Ok(Ok(Some((len, from)))) => {
                    error_streak = 0;
                    stats.datagrams += 1;
                    trace!("Datagram {}: {} bytes from {}", stats.datagrams, len, from);
                    self.dispatch(&buf[..len], &mut stats);
                }
                Ok(Ok(None)) => {
                    debug!("Transport shut down");
                    break;
                }
                Ok(Err(e)) => {
                    stats.transport_errors += 1;
                    error_streak += 1;
                    error!("Receive error ({} in a row): {}", error_streak, e);

                    // Exponential backoff: 20ms, 40ms, 80ms, ... capped at 640ms
                    let backoff = Duration::from_millis(20 * (1 << error_streak.min(5)));
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(
            "Receive task ended ({} datagrams, {} commands)",
            stats.datagrams, stats.commands
        );
        stats
    }

    fn dispatch(&self, datagram: &[u8], stats: &mut ReceiveStats) {
        match accept_command(datagram, &self.sequencer) {
            Ok(command) => {
                stats.commands += 1;
                self.handler.on_command(command);
            }
            Err(err) => {
                stats.record_rejection(&err);
                match err {
                    LinkError::StalePacket { number, last } => {
                        debug!("Dropping stale command {} (last accepted {})", number, last);
                    }
                    other => warn!("Dropping datagram: {}", other),
                }
            }
        }
    }
}

/// Decode one inbound datagram and run its packet number through the
/// sequencer. Only command packets are accepted.
pub(super) fn accept_command(datagram: &[u8], sequencer: &Sequencer) -> Result<Command> {
    match Packet::decode(datagram)? {
        Packet::Command(packet) => {
            sequencer.check(packet.number)?;
            trace!("Command {} accepted: {}", packet.number, packet.command.motors);
            Ok(packet.command)
        }
        other => Err(LinkError::UnexpectedPacket { opcode: other.opcode().as_byte() }),
    }
}
